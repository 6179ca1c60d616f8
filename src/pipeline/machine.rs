//! The highlight status machine
//!
//! All mutations of `highlighting_status`, `highlighted_markup` and
//! `highlighting_error` happen here. Callers feed events in; every
//! (status, event) pair has exactly one defined outcome: the item is updated,
//! or the event is rejected with a typed reason. Nothing is silently ignored.
//!
//! Rejections are a normal part of operation: a job that was superseded by a
//! newer annotation request or by a user edit resolves against a stale epoch
//! and its result is discarded instead of overwriting fresher state.

use crate::highlight::has_annotations;
use crate::types::{AnnotationTicket, ContentItem, HighlightStatus};
use thiserror::Error;
use tracing::debug;

/// Events that drive highlight status transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HighlightEvent {
    /// An annotation pass was requested; accepted from every status
    AnnotationRequested,

    /// An annotation job resolved with markup
    AnnotationCompleted { epoch: u64, markup: String },

    /// An annotation job resolved with an error
    AnnotationFailed { epoch: u64, error: String },

    /// The user edited the content; accepted from every status
    UserEdited,
}

/// Why an event was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The resolving job was superseded by a newer annotation request
    #[error("stale annotation epoch {job_epoch}, current epoch is {current_epoch}")]
    StaleEpoch { job_epoch: u64, current_epoch: u64 },

    /// A job resolution arrived while no annotation was in flight
    #[error("no annotation in progress, status is {status}")]
    NotInProgress { status: HighlightStatus },
}

/// Apply an event to an item, mutating its highlighting fields
///
/// Side effects per event:
/// - `AnnotationRequested`: status to `InProgress`, epoch incremented, error
///   cleared. Existing markup is retained so the previous annotated view can
///   still be shown while the job runs.
/// - `AnnotationCompleted`: requires `InProgress` and a matching epoch. Markup
///   with at least one recognized tag lands in `Completed`; tagless markup
///   lands in `CompletedNoHighlights` with markup cleared.
/// - `AnnotationFailed`: requires `InProgress` and a matching epoch. Status to
///   `Failed`, markup cleared, error recorded.
/// - `UserEdited`: status to `UserEdited`, markup and error cleared
///   immediately and unconditionally.
pub fn apply(item: &mut ContentItem, event: HighlightEvent) -> Result<(), TransitionError> {
    match event {
        HighlightEvent::AnnotationRequested => {
            item.annotation_epoch += 1;
            item.highlighting_status = HighlightStatus::InProgress;
            item.highlighting_error = None;
            item.touch();
            debug!(
                "Annotation requested for {} (epoch {})",
                item.id, item.annotation_epoch
            );
            Ok(())
        }
        HighlightEvent::AnnotationCompleted { epoch, markup } => {
            check_in_flight(item, epoch)?;

            if has_annotations(&markup) {
                item.highlighting_status = HighlightStatus::Completed;
                item.highlighted_markup = Some(markup);
            } else {
                item.highlighting_status = HighlightStatus::CompletedNoHighlights;
                item.highlighted_markup = None;
            }
            item.highlighting_error = None;
            item.touch();
            debug!(
                "Annotation resolved for {} as {}",
                item.id, item.highlighting_status
            );
            Ok(())
        }
        HighlightEvent::AnnotationFailed { epoch, error } => {
            check_in_flight(item, epoch)?;

            item.highlighting_status = HighlightStatus::Failed;
            item.highlighted_markup = None;
            item.highlighting_error = Some(error);
            item.touch();
            debug!("Annotation failed for {}", item.id);
            Ok(())
        }
        HighlightEvent::UserEdited => {
            item.highlighting_status = HighlightStatus::UserEdited;
            item.highlighted_markup = None;
            item.highlighting_error = None;
            item.touch();
            debug!("User edit invalidated annotations for {}", item.id);
            Ok(())
        }
    }
}

/// Request annotation and issue the ticket for the new epoch
pub fn begin_annotation(item: &mut ContentItem) -> AnnotationTicket {
    // Requested is accepted from every status
    let _ = apply(item, HighlightEvent::AnnotationRequested);
    item.annotation_ticket()
}

fn check_in_flight(item: &ContentItem, epoch: u64) -> Result<(), TransitionError> {
    if !item.highlighting_status.is_in_progress() {
        return Err(TransitionError::NotInProgress {
            status: item.highlighting_status,
        });
    }
    if epoch != item.annotation_epoch {
        return Err(TransitionError::StaleEpoch {
            job_epoch: epoch,
            current_epoch: item.annotation_epoch,
        });
    }
    Ok(())
}
