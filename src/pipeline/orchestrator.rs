//! Generation orchestrator
//!
//! Coordinates the agent, the store, the annotator and the event stream:
//! - `generate` drafts a new item and kicks off its annotation pass
//! - `refine` revises an item in place and re-annotates it
//! - `request_annotation` runs an epoch-stamped background job
//!
//! Annotation outcomes are applied by the store under its write lock, so a
//! job that loses a race with a user edit or a newer job is discarded there,
//! not here.

use crate::api::events::{Event, EventBroadcaster};
use crate::error::Result;
use crate::services::agent::{
    generation_prompt, refinement_prompt, CompletionBackend, GenerationPayload,
};
use crate::services::AnnotatorService;
use crate::storage::{AnnotationOutcome, ContentStore};
use crate::types::{AnnotationContext, ContentId, ContentItem, GenerationSpec, HighlightStatus};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Drives generation, refinement and annotation jobs
pub struct GenerationOrchestrator {
    store: Arc<dyn ContentStore>,
    backend: Arc<dyn CompletionBackend>,
    annotator: Arc<AnnotatorService>,
    events: EventBroadcaster,
}

impl GenerationOrchestrator {
    pub fn new(
        store: Arc<dyn ContentStore>,
        backend: Arc<dyn CompletionBackend>,
        annotator: Arc<AnnotatorService>,
        events: EventBroadcaster,
    ) -> Self {
        Self {
            store,
            backend,
            annotator,
            events,
        }
    }

    /// Generate a new content item and kick off its annotation pass
    ///
    /// A failed agent call propagates and leaves no item behind.
    pub async fn generate(&self, spec: GenerationSpec) -> Result<ContentItem> {
        debug!("Generating content");
        let prompt = generation_prompt(&spec);
        let response = self.backend.complete(&prompt).await?;
        let payload = GenerationPayload::from_response(&response);

        let item = ContentItem::new(payload.content, payload.structured);
        let stored = self.store.insert(item).await?;
        let _ = self.events.broadcast(Event::generation_completed(stored.id));
        info!("Generated content item {}", stored.id);

        self.request_annotation(stored.id, spec.context).await
    }

    /// Revise an existing item against feedback and re-annotate it
    ///
    /// A failed agent call propagates and leaves the stored item untouched.
    pub async fn refine(
        &self,
        id: ContentId,
        instruction: &str,
        context: AnnotationContext,
    ) -> Result<ContentItem> {
        let current = self.store.get(id).await?;
        let prompt = refinement_prompt(&current.raw_content, instruction);
        let response = self.backend.complete(&prompt).await?;
        let payload = GenerationPayload::from_response(&response);

        let updated = self
            .store
            .replace_content(id, payload.content, payload.structured)
            .await?;
        let _ = self.events.broadcast(Event::content_refined(id));
        info!("Refined content item {}", id);

        self.request_annotation(updated.id, context).await
    }

    /// Start an annotation job for an item
    ///
    /// Returns the item in its in-progress state. The job resolves in the
    /// background; callers watch it through the poller or the event stream.
    pub async fn request_annotation(
        &self,
        id: ContentId,
        context: AnnotationContext,
    ) -> Result<ContentItem> {
        let snapshot = self.store.begin_annotation(id).await?;
        let ticket = snapshot.annotation_ticket();
        let _ = self
            .events
            .broadcast(Event::annotation_started(id, ticket.epoch));
        debug!("Annotation epoch {} started for {}", ticket.epoch, id);

        let store = Arc::clone(&self.store);
        let annotator = Arc::clone(&self.annotator);
        let events = self.events.clone();
        let content = snapshot.raw_content.clone();

        tokio::spawn(async move {
            match annotator.annotate(&content, &context).await {
                Ok(markup) => match store.complete_annotation(ticket, markup).await {
                    Ok(AnnotationOutcome::Applied(item)) => {
                        let has_highlights =
                            item.highlighting_status == HighlightStatus::Completed;
                        let _ = events.broadcast(Event::annotation_completed(id, has_highlights));
                    }
                    Ok(AnnotationOutcome::Discarded(reason)) => {
                        let _ =
                            events.broadcast(Event::annotation_discarded(id, reason.to_string()));
                    }
                    Err(e) => warn!("Failed to record annotation for {}: {}", id, e),
                },
                Err(e) => {
                    warn!("Annotation for {} failed: {}", id, e);
                    match store.fail_annotation(ticket, e.to_string()).await {
                        Ok(AnnotationOutcome::Applied(_)) => {
                            let _ = events.broadcast(Event::annotation_failed(id, e.to_string()));
                        }
                        Ok(AnnotationOutcome::Discarded(reason)) => {
                            let _ = events
                                .broadcast(Event::annotation_discarded(id, reason.to_string()));
                        }
                        Err(err) => {
                            warn!("Failed to record annotation failure for {}: {}", id, err)
                        }
                    }
                }
            }
        });

        Ok(snapshot)
    }
}
