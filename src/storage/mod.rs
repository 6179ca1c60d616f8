//! Storage layer for content items
//!
//! Provides the store abstraction the pipeline runs against and an in-memory
//! reference implementation. Persistence engines plug in behind the
//! [`ContentStore`] trait; the pipeline only ever sees the trait.

pub mod memory;

use crate::error::Result;
use crate::pipeline::machine::TransitionError;
use crate::types::{AnnotationTicket, ContentId, ContentItem, LifecycleStatus};
use async_trait::async_trait;

pub use memory::MemoryStore;

/// How an annotation job's resolution landed
#[derive(Debug, Clone)]
pub enum AnnotationOutcome {
    /// The resolution was applied; the updated item is returned
    Applied(ContentItem),

    /// The resolution belonged to a superseded job and was dropped
    Discarded(TransitionError),
}

impl AnnotationOutcome {
    /// The updated item, if the resolution was applied
    pub fn applied(self) -> Option<ContentItem> {
        match self {
            AnnotationOutcome::Applied(item) => Some(item),
            AnnotationOutcome::Discarded(_) => None,
        }
    }
}

/// A user edit to persist
#[derive(Debug, Clone, Default)]
pub struct UserEdit {
    /// The edited content; sanitized by the store before writing
    pub content: String,

    /// Replacement structured payload; `None` leaves the stored one untouched
    pub structured_content: Option<serde_json::Value>,

    /// Optional lifecycle change applied in the same write
    pub lifecycle_status: Option<LifecycleStatus>,
}

/// Content store trait defining all required operations
///
/// Implementations must route every mutation of the highlighting fields
/// through the status machine inside a single write transaction, so the
/// edit-dominance and stale-job invariants hold under concurrent access.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Insert a new item, normalizing its content first
    async fn insert(&self, item: ContentItem) -> Result<ContentItem>;

    /// Retrieve an item by ID
    async fn get(&self, id: ContentId) -> Result<ContentItem>;

    /// List all items, newest first
    async fn list(&self) -> Result<Vec<ContentItem>>;

    /// Delete an item
    async fn remove(&self, id: ContentId) -> Result<()>;

    /// Persist a user edit: sanitize, write content, invalidate annotations
    ///
    /// The content write and the user_edited transition are atomic. Between
    /// concurrent editors the last write wins; highlight state is protected
    /// separately by the epoch check.
    async fn save_user_edit(&self, id: ContentId, edit: UserEdit) -> Result<ContentItem>;

    /// Replace content wholesale under the same ID (the refine path)
    ///
    /// The item drops back to `Draft` and its annotation state is invalidated
    /// exactly as for a direct user edit.
    async fn replace_content(
        &self,
        id: ContentId,
        content: String,
        structured: Option<serde_json::Value>,
    ) -> Result<ContentItem>;

    /// Enter `in_progress` for a new annotation job
    ///
    /// Returns the snapshot the job should annotate; the snapshot's
    /// `annotation_ticket()` is what the job presents when resolving.
    async fn begin_annotation(&self, id: ContentId) -> Result<ContentItem>;

    /// Resolve an annotation job with its markup
    async fn complete_annotation(
        &self,
        ticket: AnnotationTicket,
        markup: String,
    ) -> Result<AnnotationOutcome>;

    /// Resolve an annotation job with an error
    async fn fail_annotation(
        &self,
        ticket: AnnotationTicket,
        error: String,
    ) -> Result<AnnotationOutcome>;

    /// Move an item through its review lifecycle
    async fn set_lifecycle(&self, id: ContentId, status: LifecycleStatus) -> Result<ContentItem>;
}
