//! Edit auto-save
//!
//! Editors push edits as they happen; the saver writes the newest pending
//! edit once the editor has been quiet for the debounce window. Switching to
//! a different item flushes the previous one immediately, and closing the
//! handle flushes whatever is still pending.

use crate::error::{CalliopeError, Result};
use crate::storage::{ContentStore, UserEdit};
use crate::types::ContentId;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tracing::{debug, error};

/// A queued edit for one content item
#[derive(Debug, Clone)]
pub struct PendingEdit {
    pub content_id: ContentId,
    pub edit: UserEdit,
}

/// Handle for pushing edits to a running auto-saver
///
/// Dropping every handle stops the saver after it flushes the pending edit.
#[derive(Clone)]
pub struct AutoSaveHandle {
    tx: mpsc::Sender<PendingEdit>,
}

impl AutoSaveHandle {
    /// Queue an edit; newer edits for the same item supersede it
    pub async fn push(&self, content_id: ContentId, edit: UserEdit) -> Result<()> {
        self.tx
            .send(PendingEdit { content_id, edit })
            .await
            .map_err(|_| {
                CalliopeError::InvalidOperation("auto-saver is not running".to_string())
            })
    }
}

/// Debounced writer of user edits
pub struct AutoSaver {
    store: Arc<dyn ContentStore>,
    debounce: Duration,
}

impl AutoSaver {
    pub fn new(store: Arc<dyn ContentStore>, debounce_ms: u64) -> Self {
        Self {
            store,
            debounce: Duration::from_millis(debounce_ms),
        }
    }

    /// Spawn the saver loop
    pub fn spawn(self) -> (AutoSaveHandle, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(64);
        let task = tokio::spawn(self.run(rx));
        (AutoSaveHandle { tx }, task)
    }

    async fn run(self, mut rx: mpsc::Receiver<PendingEdit>) {
        let mut pending: Option<PendingEdit> = None;

        loop {
            match pending.take() {
                Some(current) => {
                    tokio::select! {
                        incoming = rx.recv() => match incoming {
                            Some(next) => {
                                // A new edit restarts the quiet period; an edit
                                // for a different item flushes the old one now
                                if next.content_id != current.content_id {
                                    self.save(current).await;
                                }
                                pending = Some(next);
                            }
                            None => {
                                self.save(current).await;
                                break;
                            }
                        },
                        _ = sleep(self.debounce) => {
                            self.save(current).await;
                        }
                    }
                }
                None => match rx.recv().await {
                    Some(next) => pending = Some(next),
                    None => break,
                },
            }
        }
        debug!("Auto-saver stopped");
    }

    async fn save(&self, pending: PendingEdit) {
        match self
            .store
            .save_user_edit(pending.content_id, pending.edit)
            .await
        {
            Ok(_) => debug!("Auto-saved {}", pending.content_id),
            Err(e) => error!("Auto-save for {} failed: {}", pending.content_id, e),
        }
    }
}
