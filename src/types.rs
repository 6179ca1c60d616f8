//! Core data types for the Calliope pipeline
//!
//! This module defines the fundamental data structures used throughout calliope:
//! content items, their highlighting and lifecycle states, and the inputs that
//! drive generation and annotation. These types form the foundation of the
//! asynchronous generate-then-annotate pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for content items
///
/// Wraps a UUID to provide type safety and prevent mixing content IDs
/// with other UUID-based identifiers in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub Uuid);

impl ContentId {
    /// Create a new random content ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a content ID from a string
    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for ContentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Annotation status of a content item
///
/// The status field is the contract clients poll against. Three states are
/// terminal for polling purposes; every state can re-enter `InProgress` when
/// annotation is requested again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightStatus {
    /// No annotation pass has run yet
    Idle,

    /// An annotation job is in flight
    InProgress,

    /// Annotation finished and produced at least one recognized tag
    Completed,

    /// Annotation finished but produced no recognized tags
    CompletedNoHighlights,

    /// Annotation failed; see `highlighting_error`
    Failed,

    /// The user edited the content; annotations are invalidated
    UserEdited,
}

impl HighlightStatus {
    /// Whether this status ends a poll loop
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            HighlightStatus::Completed
                | HighlightStatus::CompletedNoHighlights
                | HighlightStatus::Failed
        )
    }

    /// Whether an annotation job is currently in flight
    pub fn is_in_progress(&self) -> bool {
        matches!(self, HighlightStatus::InProgress)
    }

    /// Wire-format name of this status
    pub fn as_str(&self) -> &'static str {
        match self {
            HighlightStatus::Idle => "idle",
            HighlightStatus::InProgress => "in_progress",
            HighlightStatus::Completed => "completed",
            HighlightStatus::CompletedNoHighlights => "completed_no_highlights",
            HighlightStatus::Failed => "failed",
            HighlightStatus::UserEdited => "user_edited",
        }
    }
}

impl std::fmt::Display for HighlightStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Review lifecycle of a content item, independent of annotation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    /// Freshly generated, not yet touched by a reviewer
    Draft,

    /// Under active review or editing
    InProgress,

    /// Signed off by the reviewer
    Approved,
}

impl std::fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LifecycleStatus::Draft => "draft",
            LifecycleStatus::InProgress => "in_progress",
            LifecycleStatus::Approved => "approved",
        };
        write!(f, "{}", s)
    }
}

/// A single piece of generated content and its annotation state
///
/// `raw_content` is always canonical plain text: markup stripped, entities
/// decoded. `highlighted_markup` is derived data and is present only when
/// `highlighting_status` is `Completed`. Both highlighting fields are mutated
/// exclusively through the status machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    /// Unique identifier
    pub id: ContentId,

    /// Canonical plain text content
    pub raw_content: String,

    /// Structured payload returned by the generation agent, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<serde_json::Value>,

    /// Tagged markup produced by the annotation pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlighted_markup: Option<String>,

    /// Current annotation status
    pub highlighting_status: HighlightStatus,

    /// Error message from the most recent failed annotation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlighting_error: Option<String>,

    /// Review lifecycle state
    pub lifecycle_status: LifecycleStatus,

    /// Incremented on every entry into `in_progress`; completions carrying a
    /// stale epoch are discarded
    #[serde(default)]
    pub annotation_epoch: u64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ContentItem {
    /// Create a fresh item from generated content
    pub fn new(raw_content: String, structured_content: Option<serde_json::Value>) -> Self {
        let now = Utc::now();
        Self {
            id: ContentId::new(),
            raw_content,
            structured_content,
            highlighted_markup: None,
            highlighting_status: HighlightStatus::Idle,
            highlighting_error: None,
            lifecycle_status: LifecycleStatus::Draft,
            annotation_epoch: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a mutation timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Ticket identifying the annotation job for the current epoch
    pub fn annotation_ticket(&self) -> AnnotationTicket {
        AnnotationTicket {
            content_id: self.id,
            epoch: self.annotation_epoch,
        }
    }
}

/// Ticket issued when an annotation job starts
///
/// The job must present its ticket when resolving; a ticket whose epoch no
/// longer matches the stored item identifies a superseded job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnotationTicket {
    /// Item the job runs against
    pub content_id: ContentId,

    /// Epoch the job was started under
    pub epoch: u64,
}

/// Named business entities that guide the annotation pass
///
/// Passed explicitly to the annotator rather than read from globals, so the
/// same pipeline serves callers with different vocabularies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnnotationContext {
    /// Persona names the content may address
    #[serde(default)]
    pub personas: Vec<String>,

    /// Audience segment names
    #[serde(default)]
    pub segments: Vec<String>,

    /// Desired outcomes the content may promise
    #[serde(default)]
    pub outcomes: Vec<String>,

    /// Known blockers the content may speak to
    #[serde(default)]
    pub blockers: Vec<String>,

    /// Referenceable resources (case studies, assets)
    #[serde(default)]
    pub resources: Vec<String>,
}

impl AnnotationContext {
    /// Whether no guidance entities were provided
    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
            && self.segments.is_empty()
            && self.outcomes.is_empty()
            && self.blockers.is_empty()
            && self.resources.is_empty()
    }
}

/// Business inputs for a generation request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationSpec {
    /// What the content should accomplish
    pub brief: String,

    /// Target audience description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,

    /// Additional generation instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Entities that guide the annotation pass for this content
    #[serde(default)]
    pub context: AnnotationContext,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_id_roundtrip() {
        let id = ContentId::new();
        let parsed = ContentId::from_string(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_content_id_rejects_garbage() {
        assert!(ContentId::from_string("not-a-uuid").is_err());
    }

    #[test]
    fn test_status_terminality() {
        assert!(HighlightStatus::Completed.is_terminal());
        assert!(HighlightStatus::CompletedNoHighlights.is_terminal());
        assert!(HighlightStatus::Failed.is_terminal());
        assert!(!HighlightStatus::Idle.is_terminal());
        assert!(!HighlightStatus::InProgress.is_terminal());
        assert!(!HighlightStatus::UserEdited.is_terminal());
    }

    #[test]
    fn test_status_serde_names() {
        let json = serde_json::to_string(&HighlightStatus::CompletedNoHighlights).unwrap();
        assert_eq!(json, "\"completed_no_highlights\"");

        let back: HighlightStatus = serde_json::from_str("\"user_edited\"").unwrap();
        assert_eq!(back, HighlightStatus::UserEdited);
    }

    #[test]
    fn test_new_item_defaults() {
        let item = ContentItem::new("Hello".to_string(), None);
        assert_eq!(item.highlighting_status, HighlightStatus::Idle);
        assert_eq!(item.lifecycle_status, LifecycleStatus::Draft);
        assert_eq!(item.annotation_epoch, 0);
        assert!(item.highlighted_markup.is_none());
        assert!(item.highlighting_error.is_none());
    }

    #[test]
    fn test_item_serde_omits_empty_fields() {
        let item = ContentItem::new("Hello".to_string(), None);
        let json = serde_json::to_value(&item).unwrap();
        assert!(json.get("highlighted_markup").is_none());
        assert!(json.get("highlighting_error").is_none());
        assert_eq!(json["highlighting_status"], "idle");
    }

    #[test]
    fn test_annotation_context_empty() {
        assert!(AnnotationContext::default().is_empty());

        let ctx = AnnotationContext {
            personas: vec!["VP of Sales".to_string()],
            ..Default::default()
        };
        assert!(!ctx.is_empty());
    }
}
