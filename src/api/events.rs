//! Event types and Server-Sent Events (SSE) support
//!
//! Events are advisory: clients learn that something changed, then read the
//! authoritative item state through the regular endpoints or the poller.

use crate::types::ContentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Event type discriminant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentEvent {
    /// A generation run produced a new content item
    GenerationCompleted {
        content_id: ContentId,
        timestamp: DateTime<Utc>,
    },
    /// A refinement run replaced an item's content
    ContentRefined {
        content_id: ContentId,
        timestamp: DateTime<Utc>,
    },
    /// An annotation job was accepted and is in flight
    AnnotationStarted {
        content_id: ContentId,
        epoch: u64,
        timestamp: DateTime<Utc>,
    },
    /// An annotation job finished and its markup was applied
    AnnotationCompleted {
        content_id: ContentId,
        has_highlights: bool,
        timestamp: DateTime<Utc>,
    },
    /// An annotation job failed
    AnnotationFailed {
        content_id: ContentId,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// An annotation result arrived too late and was dropped
    AnnotationDiscarded {
        content_id: ContentId,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    /// A user edit was persisted
    ContentSaved {
        content_id: ContentId,
        timestamp: DateTime<Utc>,
    },
    /// An item was approved
    ContentApproved {
        content_id: ContentId,
        timestamp: DateTime<Utc>,
    },
}

/// Event wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event ID (for deduplication)
    pub id: String,
    /// Event payload
    #[serde(flatten)]
    pub event: ContentEvent,
}

impl Event {
    /// Create new event
    pub fn new(event: ContentEvent) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event,
        }
    }

    /// Create generation completed event
    pub fn generation_completed(content_id: ContentId) -> Self {
        Self::new(ContentEvent::GenerationCompleted {
            content_id,
            timestamp: Utc::now(),
        })
    }

    /// Create content refined event
    pub fn content_refined(content_id: ContentId) -> Self {
        Self::new(ContentEvent::ContentRefined {
            content_id,
            timestamp: Utc::now(),
        })
    }

    /// Create annotation started event
    pub fn annotation_started(content_id: ContentId, epoch: u64) -> Self {
        Self::new(ContentEvent::AnnotationStarted {
            content_id,
            epoch,
            timestamp: Utc::now(),
        })
    }

    /// Create annotation completed event
    pub fn annotation_completed(content_id: ContentId, has_highlights: bool) -> Self {
        Self::new(ContentEvent::AnnotationCompleted {
            content_id,
            has_highlights,
            timestamp: Utc::now(),
        })
    }

    /// Create annotation failed event
    pub fn annotation_failed(content_id: ContentId, error: String) -> Self {
        Self::new(ContentEvent::AnnotationFailed {
            content_id,
            error,
            timestamp: Utc::now(),
        })
    }

    /// Create annotation discarded event
    pub fn annotation_discarded(content_id: ContentId, reason: String) -> Self {
        Self::new(ContentEvent::AnnotationDiscarded {
            content_id,
            reason,
            timestamp: Utc::now(),
        })
    }

    /// Create content saved event
    pub fn content_saved(content_id: ContentId) -> Self {
        Self::new(ContentEvent::ContentSaved {
            content_id,
            timestamp: Utc::now(),
        })
    }

    /// Create content approved event
    pub fn content_approved(content_id: ContentId) -> Self {
        Self::new(ContentEvent::ContentApproved {
            content_id,
            timestamp: Utc::now(),
        })
    }

    /// Convert to SSE data format
    pub fn to_sse(&self) -> String {
        format!(
            "id: {}\ndata: {}\n\n",
            self.id,
            serde_json::to_string(&self).unwrap_or_else(|_| "{}".to_string())
        )
    }
}

/// Event broadcaster using tokio broadcast channel
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<Event>,
}

impl EventBroadcaster {
    /// Create new broadcaster with channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Broadcast event to all subscribers
    pub fn broadcast(
        &self,
        event: Event,
    ) -> Result<usize, Box<broadcast::error::SendError<Event>>> {
        self.tx.send(event).map_err(Box::new)
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Get subscriber count
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(1000) // Default capacity: 1000 events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let id = ContentId::new();
        let event = Event::annotation_started(id, 3);
        match event.event {
            ContentEvent::AnnotationStarted {
                content_id, epoch, ..
            } => {
                assert_eq!(content_id, id);
                assert_eq!(epoch, 3);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_event_serializes_flat() {
        let event = Event::annotation_completed(ContentId::new(), true);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "annotation_completed");
        assert_eq!(json["has_highlights"], true);
        assert!(json["id"].is_string());
    }

    #[test]
    fn test_sse_format() {
        let event = Event::content_saved(ContentId::new());
        let sse = event.to_sse();
        assert!(sse.contains("id:"));
        assert!(sse.contains("data:"));
        assert!(sse.contains("content_saved"));
    }

    #[tokio::test]
    async fn test_broadcaster() {
        let broadcaster = EventBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();

        let event = Event::generation_completed(ContentId::new());
        broadcaster.broadcast(event.clone()).unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, event.id);
    }
}
