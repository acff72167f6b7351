//! Progress reporting from the commit worker to its callers

use crate::models::types::{ProgressUpdate, TaskStatus};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

/// Receives status updates for scheduled commits.
///
/// Called from the worker task; implementations must hand updates off
/// without blocking it.
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Forwards updates into an unbounded channel read by the caller.
#[derive(Clone)]
pub struct ChannelProgressSink {
    tx: mpsc::UnboundedSender<ProgressUpdate>,
}

impl ChannelProgressSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgressSink {
    fn report(&self, update: ProgressUpdate) {
        if self.tx.send(update).is_err() {
            warn!("Progress receiver dropped, update discarded");
        }
    }
}

/// Fans updates out to any number of subscribers.
pub struct BroadcastProgressSink {
    tx: broadcast::Sender<ProgressUpdate>,
}

impl BroadcastProgressSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastProgressSink {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl ProgressSink for BroadcastProgressSink {
    fn report(&self, update: ProgressUpdate) {
        // No subscribers is fine
        let _ = self.tx.send(update);
    }
}

/// Writes every update to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn report(&self, update: ProgressUpdate) {
        let detail = update.detail.as_deref().unwrap_or("");
        match update.status {
            TaskStatus::Failed => error!(
                task_id = %update.task_id,
                element_id = %update.element_id,
                status = %update.status,
                "Commit failed: {}",
                detail
            ),
            TaskStatus::Cancelled => warn!(
                task_id = %update.task_id,
                element_id = %update.element_id,
                status = %update.status,
                "Commit cancelled"
            ),
            _ => info!(
                task_id = %update.task_id,
                element_id = %update.element_id,
                status = %update.status,
                detail,
                "Commit progress"
            ),
        }
    }
}
