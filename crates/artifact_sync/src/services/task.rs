use crate::models::error::CommitError;
use crate::models::types::{ProgressUpdate, TaskStatus};
use crate::services::progress::ProgressSink;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Cooperative cancellation shared by a `TaskHandle` and the worker.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a running commit needs to report progress and observe cancellation.
#[derive(Clone)]
pub struct TaskContext {
    pub task_id: Uuid,
    pub element_id: String,
    progress: Arc<dyn ProgressSink>,
    cancel: CancelFlag,
}

impl TaskContext {
    pub fn new(
        task_id: Uuid,
        element_id: impl Into<String>,
        progress: Arc<dyn ProgressSink>,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            task_id,
            element_id: element_id.into(),
            progress,
            cancel,
        }
    }

    /// A context for running the pipeline outside a scheduler.
    pub fn detached(element_id: impl Into<String>, progress: Arc<dyn ProgressSink>) -> Self {
        Self::new(Uuid::new_v4(), element_id, progress, CancelFlag::new())
    }

    pub fn report(&self, status: TaskStatus, detail: Option<String>) {
        let mut update = ProgressUpdate::new(self.task_id, &self.element_id, status);
        update.detail = detail;
        self.progress.report(update);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Step boundary: stop here if cancellation was requested.
    pub fn check_cancelled(&self) -> Result<(), CommitError> {
        if self.is_cancelled() {
            Err(CommitError::Cancelled)
        } else {
            Ok(())
        }
    }
}
