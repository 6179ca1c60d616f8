//! Reconciliation poller
//!
//! Convergence loop for asynchronous annotation jobs. The job itself runs
//! elsewhere; this poller reads item state on a fixed cadence until the
//! highlight status turns terminal, the attempt budget runs out, or a caller
//! cancels the wait.
//!
//! # Design
//!
//! - Reads through a [`StatusSource`], so the same loop works against a local
//!   store or a remote API
//! - Transport errors are retried; only an all-error run fails the poll
//! - A timed out or cancelled run still resolves with the last observed item
//! - Optional progress reporting over a watch channel, capped below 100 until
//!   a terminal status is seen

use crate::error::{CalliopeError, Result};
use crate::storage::ContentStore;
use crate::types::{ContentId, ContentItem};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::time::{interval, Duration};
use tracing::{debug, warn};

/// Where the poller reads item state from
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Fetch the current state of a content item
    async fn fetch(&self, id: ContentId) -> Result<ContentItem>;
}

/// Status source backed directly by a content store
pub struct StoreStatusSource {
    store: Arc<dyn ContentStore>,
}

impl StoreStatusSource {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StatusSource for StoreStatusSource {
    async fn fetch(&self, id: ContentId) -> Result<ContentItem> {
        self.store.get(id).await
    }
}

/// Poll cadence and patience
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSettings {
    /// Milliseconds between status reads
    pub interval_ms: u64,

    /// Attempt budget before the poll times out
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            max_attempts: 60,
        }
    }
}

impl PollSettings {
    fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Why a poll run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStop {
    /// A terminal highlight status was observed
    Terminal,

    /// The attempt budget ran out; the item carries the last observed state
    TimedOut,

    /// A caller cancelled the wait; the item carries the last observed state
    Cancelled,
}

/// Outcome of a poll run
#[derive(Debug, Clone)]
pub struct PollResolution {
    /// The item as last observed
    pub item: ContentItem,

    /// Status reads performed
    pub attempts: u32,

    /// Why the loop stopped
    pub stop: PollStop,
}

/// Estimated progress percentage for an in-flight job
///
/// Starts at 50 once polling begins and climbs with each attempt, capped at
/// 90 so that 100 is only ever reported for a terminal status.
pub fn progress_estimate(attempts: u32) -> u8 {
    std::cmp::min(90, 50 + attempts.saturating_mul(2)) as u8
}

/// Polls a status source until an annotation job resolves
pub struct ReconciliationPoller {
    source: Arc<dyn StatusSource>,
    settings: PollSettings,
}

impl ReconciliationPoller {
    pub fn new(source: Arc<dyn StatusSource>, settings: PollSettings) -> Self {
        Self { source, settings }
    }

    /// Poll until the item resolves, with no progress reporting
    pub async fn await_resolution(&self, id: ContentId) -> Result<PollResolution> {
        self.run(id, None, None).await
    }

    /// Poll with optional progress reporting and cancellation
    pub async fn await_resolution_with(
        &self,
        id: ContentId,
        progress: Option<watch::Sender<u8>>,
        cancel: Option<broadcast::Receiver<()>>,
    ) -> Result<PollResolution> {
        self.run(id, progress, cancel).await
    }

    async fn run(
        &self,
        id: ContentId,
        progress: Option<watch::Sender<u8>>,
        mut cancel: Option<broadcast::Receiver<()>>,
    ) -> Result<PollResolution> {
        let mut timer = interval(self.settings.interval());
        let mut attempts: u32 = 0;
        let mut last_observed: Option<ContentItem> = None;
        let mut last_error: Option<CalliopeError> = None;

        debug!(
            "Polling {} every {}ms (up to {} attempts)",
            id, self.settings.interval_ms, self.settings.max_attempts
        );

        while attempts < self.settings.max_attempts {
            tokio::select! {
                _ = timer.tick() => {}
                _ = cancel_signal(cancel.as_mut()) => {
                    return resolve_cancelled(id, attempts, last_observed);
                }
            }

            attempts += 1;
            match self.source.fetch(id).await {
                Ok(item) => {
                    if item.highlighting_status.is_terminal() {
                        send_progress(&progress, 100);
                        debug!(
                            "Polling {} resolved as {} after {} attempt(s)",
                            id, item.highlighting_status, attempts
                        );
                        return Ok(PollResolution {
                            item,
                            attempts,
                            stop: PollStop::Terminal,
                        });
                    }
                    send_progress(&progress, progress_estimate(attempts));
                    last_observed = Some(item);
                }
                Err(e) => {
                    warn!("Poll attempt {} for {} failed: {}", attempts, id, e);
                    last_error = Some(e);
                }
            }
        }

        match last_observed {
            Some(item) => {
                warn!(
                    "Polling {} exhausted after {} attempts; resolving with last observed status {}",
                    id, attempts, item.highlighting_status
                );
                Ok(PollResolution {
                    item,
                    attempts,
                    stop: PollStop::TimedOut,
                })
            }
            None => Err(last_error.unwrap_or_else(|| {
                CalliopeError::PollInterrupted(format!(
                    "no status observed for {} after {} attempts",
                    id, attempts
                ))
            })),
        }
    }
}

fn resolve_cancelled(
    id: ContentId,
    attempts: u32,
    last_observed: Option<ContentItem>,
) -> Result<PollResolution> {
    match last_observed {
        Some(item) => {
            debug!("Polling {} cancelled after {} attempt(s)", id, attempts);
            Ok(PollResolution {
                item,
                attempts,
                stop: PollStop::Cancelled,
            })
        }
        None => Err(CalliopeError::PollInterrupted(format!(
            "polling for {} cancelled before any status was observed",
            id
        ))),
    }
}

fn send_progress(progress: &Option<watch::Sender<u8>>, value: u8) {
    if let Some(tx) = progress {
        let _ = tx.send(value);
    }
}

/// Resolves when a cancel message arrives; pends forever without one
async fn cancel_signal(cancel: Option<&mut broadcast::Receiver<()>>) {
    match cancel {
        Some(rx) => loop {
            match rx.recv().await {
                // Lagged still means a cancel was sent
                Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => return,
                Err(broadcast::error::RecvError::Closed) => {
                    std::future::pending::<()>().await;
                }
            }
        },
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::types::HighlightStatus;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedSource {
        script: Mutex<VecDeque<Result<ContentItem>>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<ContentItem>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into_iter().collect()),
            })
        }
    }

    #[async_trait]
    impl StatusSource for ScriptedSource {
        async fn fetch(&self, _id: ContentId) -> Result<ContentItem> {
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(CalliopeError::Other("script exhausted".to_string())))
        }
    }

    fn item_with_status(status: HighlightStatus) -> ContentItem {
        let mut item = ContentItem::new("body".to_string(), None);
        item.highlighting_status = status;
        item
    }

    fn fast(max_attempts: u32) -> PollSettings {
        PollSettings {
            interval_ms: 1,
            max_attempts,
        }
    }

    #[tokio::test]
    async fn test_terminal_status_stops_polling() {
        let source = ScriptedSource::new(vec![
            Ok(item_with_status(HighlightStatus::InProgress)),
            Ok(item_with_status(HighlightStatus::InProgress)),
            Ok(item_with_status(HighlightStatus::Completed)),
        ]);
        let poller = ReconciliationPoller::new(source, fast(10));

        let resolution = poller.await_resolution(ContentId::new()).await.unwrap();
        assert_eq!(resolution.stop, PollStop::Terminal);
        assert_eq!(resolution.attempts, 3);
        assert_eq!(
            resolution.item.highlighting_status,
            HighlightStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_no_highlights_and_failed_are_terminal() {
        for terminal in [
            HighlightStatus::CompletedNoHighlights,
            HighlightStatus::Failed,
        ] {
            let source = ScriptedSource::new(vec![Ok(item_with_status(terminal))]);
            let poller = ReconciliationPoller::new(source, fast(5));

            let resolution = poller.await_resolution(ContentId::new()).await.unwrap();
            assert_eq!(resolution.stop, PollStop::Terminal);
            assert_eq!(resolution.attempts, 1);
        }
    }

    #[tokio::test]
    async fn test_timeout_resolves_with_last_observed() {
        let source = ScriptedSource::new(vec![
            Ok(item_with_status(HighlightStatus::InProgress)),
            Ok(item_with_status(HighlightStatus::InProgress)),
            Ok(item_with_status(HighlightStatus::InProgress)),
        ]);
        let poller = ReconciliationPoller::new(source, fast(3));

        let resolution = poller.await_resolution(ContentId::new()).await.unwrap();
        assert_eq!(resolution.stop, PollStop::TimedOut);
        assert_eq!(resolution.attempts, 3);
        assert_eq!(
            resolution.item.highlighting_status,
            HighlightStatus::InProgress
        );
    }

    #[tokio::test]
    async fn test_transport_errors_are_retried() {
        let source = ScriptedSource::new(vec![
            Err(CalliopeError::Other("connection reset".to_string())),
            Ok(item_with_status(HighlightStatus::InProgress)),
            Ok(item_with_status(HighlightStatus::Completed)),
        ]);
        let poller = ReconciliationPoller::new(source, fast(10));

        let resolution = poller.await_resolution(ContentId::new()).await.unwrap();
        assert_eq!(resolution.stop, PollStop::Terminal);
        assert_eq!(resolution.attempts, 3);
    }

    #[tokio::test]
    async fn test_all_errors_fails_the_poll() {
        let source = ScriptedSource::new(vec![
            Err(CalliopeError::Other("down".to_string())),
            Err(CalliopeError::Other("still down".to_string())),
        ]);
        let poller = ReconciliationPoller::new(source, fast(2));

        let err = poller.await_resolution(ContentId::new()).await.unwrap_err();
        assert!(err.to_string().contains("still down"));
    }

    #[tokio::test]
    async fn test_cancellation_resolves_with_last_observed() {
        let source = ScriptedSource::new(vec![Ok(item_with_status(HighlightStatus::InProgress))]);
        let settings = PollSettings {
            interval_ms: 200,
            max_attempts: 60,
        };
        let poller = ReconciliationPoller::new(source, settings);
        let (cancel_tx, cancel_rx) = broadcast::channel(1);

        let id = ContentId::new();
        let handle =
            tokio::spawn(
                async move { poller.await_resolution_with(id, None, Some(cancel_rx)).await },
            );

        // First read happens immediately; cancel lands well before the second
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel_tx.send(()).unwrap();

        let resolution = handle.await.unwrap().unwrap();
        assert_eq!(resolution.stop, PollStop::Cancelled);
        assert_eq!(resolution.attempts, 1);
        assert_eq!(
            resolution.item.highlighting_status,
            HighlightStatus::InProgress
        );
    }

    #[tokio::test]
    async fn test_cancellation_before_any_observation_is_an_error() {
        let source = ScriptedSource::new(vec![Err(CalliopeError::Other("down".to_string()))]);
        let settings = PollSettings {
            interval_ms: 200,
            max_attempts: 60,
        };
        let poller = ReconciliationPoller::new(source, settings);
        let (cancel_tx, cancel_rx) = broadcast::channel(1);

        let id = ContentId::new();
        let handle =
            tokio::spawn(
                async move { poller.await_resolution_with(id, None, Some(cancel_rx)).await },
            );

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel_tx.send(()).unwrap();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, CalliopeError::PollInterrupted(_)));
    }

    #[tokio::test]
    async fn test_progress_reaches_100_on_terminal() {
        let source = ScriptedSource::new(vec![
            Ok(item_with_status(HighlightStatus::InProgress)),
            Ok(item_with_status(HighlightStatus::Completed)),
        ]);
        let poller = ReconciliationPoller::new(source, fast(10));
        let (tx, rx) = watch::channel(0u8);

        poller
            .await_resolution_with(ContentId::new(), Some(tx), None)
            .await
            .unwrap();

        assert_eq!(*rx.borrow(), 100);
    }

    #[tokio::test]
    async fn test_store_status_source_reads_the_store() {
        let store = Arc::new(MemoryStore::new());
        let stored = store
            .insert(item_with_status(HighlightStatus::Completed))
            .await
            .unwrap();

        let source = Arc::new(StoreStatusSource::new(store));
        let poller = ReconciliationPoller::new(source, fast(5));

        let resolution = poller.await_resolution(stored.id).await.unwrap();
        assert_eq!(resolution.stop, PollStop::Terminal);
        assert_eq!(resolution.attempts, 1);
    }

    #[test]
    fn test_progress_estimate_formula() {
        assert_eq!(progress_estimate(0), 50);
        assert_eq!(progress_estimate(1), 52);
        assert_eq!(progress_estimate(10), 70);
        assert_eq!(progress_estimate(20), 90);
        assert_eq!(progress_estimate(60), 90);
    }
}
