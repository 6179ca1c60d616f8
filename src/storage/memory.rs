//! In-memory content store
//!
//! The reference [`ContentStore`] implementation: a map behind an async
//! RwLock. Write operations hold the lock across the machine transition and
//! the field writes, which is what makes edits and job resolutions atomic.

use crate::error::{CalliopeError, Result};
use crate::normalize::{deep_parse, sanitize_to_canonical_text};
use crate::pipeline::machine::{self, HighlightEvent};
use crate::storage::{AnnotationOutcome, ContentStore, UserEdit};
use crate::types::{AnnotationTicket, ContentId, ContentItem, LifecycleStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// In-memory content store
#[derive(Clone)]
pub struct MemoryStore {
    items: Arc<RwLock<HashMap<ContentId, ContentItem>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            items: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of stored items
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Run a closure against an item under the write lock
    async fn update<F>(&self, id: ContentId, f: F) -> Result<ContentItem>
    where
        F: FnOnce(&mut ContentItem) + Send,
    {
        let mut items = self.items.write().await;
        let item = items
            .get_mut(&id)
            .ok_or_else(|| CalliopeError::ContentNotFound(id.to_string()))?;
        f(item);
        Ok(item.clone())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn insert(&self, mut item: ContentItem) -> Result<ContentItem> {
        item.raw_content = sanitize_to_canonical_text(&item.raw_content);
        item.structured_content = item.structured_content.map(deep_parse);

        let mut items = self.items.write().await;
        if items.contains_key(&item.id) {
            return Err(CalliopeError::AlreadyExists(item.id.to_string()));
        }
        debug!("Storing content item {}", item.id);
        items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn get(&self, id: ContentId) -> Result<ContentItem> {
        let items = self.items.read().await;
        items
            .get(&id)
            .cloned()
            .ok_or_else(|| CalliopeError::ContentNotFound(id.to_string()))
    }

    async fn list(&self) -> Result<Vec<ContentItem>> {
        let items = self.items.read().await;
        let mut all: Vec<ContentItem> = items.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn remove(&self, id: ContentId) -> Result<()> {
        let mut items = self.items.write().await;
        items
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| CalliopeError::ContentNotFound(id.to_string()))
    }

    async fn save_user_edit(&self, id: ContentId, edit: UserEdit) -> Result<ContentItem> {
        let clean = sanitize_to_canonical_text(&edit.content);
        let updated = self
            .update(id, move |item| {
                item.raw_content = clean;
                if let Some(structured) = edit.structured_content {
                    item.structured_content = Some(deep_parse(structured));
                }
                // UserEdited is accepted from every status
                let _ = machine::apply(item, HighlightEvent::UserEdited);
                if let Some(lifecycle) = edit.lifecycle_status {
                    item.lifecycle_status = lifecycle;
                }
            })
            .await?;

        debug!("Saved user edit for {}", id);
        Ok(updated)
    }

    async fn replace_content(
        &self,
        id: ContentId,
        content: String,
        structured: Option<serde_json::Value>,
    ) -> Result<ContentItem> {
        let clean = sanitize_to_canonical_text(&content);
        let updated = self
            .update(id, move |item| {
                item.raw_content = clean;
                item.structured_content = structured.map(deep_parse);
                item.lifecycle_status = LifecycleStatus::Draft;
                // Replacement invalidates annotations like a direct edit
                let _ = machine::apply(item, HighlightEvent::UserEdited);
            })
            .await?;

        debug!("Replaced content for {}", id);
        Ok(updated)
    }

    async fn begin_annotation(&self, id: ContentId) -> Result<ContentItem> {
        self.update(id, |item| {
            machine::begin_annotation(item);
        })
        .await
    }

    async fn complete_annotation(
        &self,
        ticket: AnnotationTicket,
        markup: String,
    ) -> Result<AnnotationOutcome> {
        let mut items = self.items.write().await;
        let item = items
            .get_mut(&ticket.content_id)
            .ok_or_else(|| CalliopeError::ContentNotFound(ticket.content_id.to_string()))?;

        match machine::apply(
            item,
            HighlightEvent::AnnotationCompleted {
                epoch: ticket.epoch,
                markup,
            },
        ) {
            Ok(()) => Ok(AnnotationOutcome::Applied(item.clone())),
            Err(reason) => {
                warn!(
                    "Discarding annotation result for {}: {}",
                    ticket.content_id, reason
                );
                Ok(AnnotationOutcome::Discarded(reason))
            }
        }
    }

    async fn fail_annotation(
        &self,
        ticket: AnnotationTicket,
        error: String,
    ) -> Result<AnnotationOutcome> {
        let mut items = self.items.write().await;
        let item = items
            .get_mut(&ticket.content_id)
            .ok_or_else(|| CalliopeError::ContentNotFound(ticket.content_id.to_string()))?;

        match machine::apply(
            item,
            HighlightEvent::AnnotationFailed {
                epoch: ticket.epoch,
                error,
            },
        ) {
            Ok(()) => Ok(AnnotationOutcome::Applied(item.clone())),
            Err(reason) => {
                warn!(
                    "Discarding annotation failure for {}: {}",
                    ticket.content_id, reason
                );
                Ok(AnnotationOutcome::Discarded(reason))
            }
        }
    }

    async fn set_lifecycle(&self, id: ContentId, status: LifecycleStatus) -> Result<ContentItem> {
        self.update(id, move |item| {
            item.lifecycle_status = status;
            item.touch();
        })
        .await
    }
}
