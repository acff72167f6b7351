use crate::config::{BackpressurePolicy, SchedulerConfig};
use crate::models::error::{CommitError, ScheduleError};
use crate::models::types::{CommitRequest, TaskStatus};
use crate::services::pipeline::UploadPipeline;
use crate::services::progress::ProgressSink;
use crate::services::task::{CancelFlag, TaskContext};
use crate::utils::metrics::Metrics;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

type TaskOutcome = Result<(), CommitError>;

struct QueuedCommit {
    request: CommitRequest,
    ctx: TaskContext,
    done: oneshot::Sender<TaskOutcome>,
}

#[derive(Clone)]
enum QueueSender {
    Bounded(mpsc::Sender<QueuedCommit>),
    Unbounded(mpsc::UnboundedSender<QueuedCommit>),
}

enum QueueReceiver {
    Bounded(mpsc::Receiver<QueuedCommit>),
    Unbounded(mpsc::UnboundedReceiver<QueuedCommit>),
}

impl QueueReceiver {
    async fn recv(&mut self) -> Option<QueuedCommit> {
        match self {
            QueueReceiver::Bounded(rx) => rx.recv().await,
            QueueReceiver::Unbounded(rx) => rx.recv().await,
        }
    }
}

/// A submitted commit, from the caller's side.
pub struct TaskHandle {
    task_id: Uuid,
    cancel: CancelFlag,
    outcome: oneshot::Receiver<TaskOutcome>,
}

impl TaskHandle {
    pub fn task_id(&self) -> Uuid {
        self.task_id
    }

    /// Requests cancellation. Takes effect at the next step boundary; an
    /// in-flight network call is allowed to finish.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// A flag that cancels this task, usable after `wait` took the handle.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Waits for the terminal state. Cancellation shows up as
    /// `Err(CommitError::Cancelled)`.
    pub async fn wait(self) -> TaskOutcome {
        match self.outcome.await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(task_id = %self.task_id, "Commit worker went away before reporting");
                Err(CommitError::Cancelled)
            }
        }
    }
}

/// Runs commits one at a time, in submission order.
///
/// A single worker drains the queue, so two commits against the same
/// element never overlap. Failures end the task, never the worker.
pub struct CommitScheduler {
    sender: RwLock<Option<QueueSender>>,
    policy: BackpressurePolicy,
    queued: Arc<AtomicUsize>,
    worker: Mutex<Option<JoinHandle<()>>>,
    metrics: Option<&'static Metrics>,
}

impl CommitScheduler {
    /// Spawns the worker; must be called inside a tokio runtime.
    pub fn new(pipeline: Arc<UploadPipeline>, config: &SchedulerConfig) -> Self {
        Self::start(pipeline, config, None)
    }

    pub fn with_metrics(
        pipeline: Arc<UploadPipeline>,
        config: &SchedulerConfig,
        metrics: &'static Metrics,
    ) -> Self {
        Self::start(pipeline, config, Some(metrics))
    }

    fn start(
        pipeline: Arc<UploadPipeline>,
        config: &SchedulerConfig,
        metrics: Option<&'static Metrics>,
    ) -> Self {
        let (sender, receiver) = match config.backpressure {
            BackpressurePolicy::Unbounded => {
                let (tx, rx) = mpsc::unbounded_channel();
                (QueueSender::Unbounded(tx), QueueReceiver::Unbounded(rx))
            }
            BackpressurePolicy::Block | BackpressurePolicy::Reject => {
                let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
                (QueueSender::Bounded(tx), QueueReceiver::Bounded(rx))
            }
        };

        let queued = Arc::new(AtomicUsize::new(0));
        let worker = tokio::spawn(run_worker(
            receiver,
            pipeline,
            Arc::clone(&queued),
            metrics,
        ));

        info!(
            policy = ?config.backpressure,
            capacity = config.queue_capacity,
            "Commit scheduler started"
        );

        Self {
            sender: RwLock::new(Some(sender)),
            policy: config.backpressure,
            queued,
            worker: Mutex::new(Some(worker)),
            metrics,
        }
    }

    /// Queues a commit. `Queued` is reported before the worker can see it.
    pub async fn submit_commit(
        &self,
        request: CommitRequest,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<TaskHandle, ScheduleError> {
        let sender = self
            .sender
            .read()
            .await
            .clone()
            .ok_or(ScheduleError::SchedulerClosed)?;

        let task_id = Uuid::new_v4();
        let cancel = CancelFlag::new();
        let ctx = TaskContext::new(
            task_id,
            request.owning_element_id.clone(),
            progress,
            cancel.clone(),
        );
        let (done, outcome) = oneshot::channel();
        let item = QueuedCommit {
            request,
            ctx: ctx.clone(),
            done,
        };

        match sender {
            QueueSender::Bounded(tx) => {
                let permit = match self.policy {
                    BackpressurePolicy::Reject => tx.try_reserve().map_err(|e| match e {
                        TrySendError::Full(_) => ScheduleError::QueueFull(self.queued_tasks()),
                        TrySendError::Closed(_) => ScheduleError::SchedulerClosed,
                    })?,
                    _ => tx
                        .reserve()
                        .await
                        .map_err(|_| ScheduleError::SchedulerClosed)?,
                };
                self.mark_queued(&ctx);
                permit.send(item);
            }
            QueueSender::Unbounded(tx) => {
                self.mark_queued(&ctx);
                if tx.send(item).is_err() {
                    self.unmark_queued();
                    ctx.report(
                        TaskStatus::Failed,
                        Some("commit worker is not running".to_string()),
                    );
                    return Err(ScheduleError::SchedulerClosed);
                }
            }
        }

        Ok(TaskHandle {
            task_id,
            cancel,
            outcome,
        })
    }

    /// Commits accepted but not yet picked up by the worker.
    pub fn queued_tasks(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// Stops accepting commits, lets the worker finish what is queued, and
    /// waits for it.
    pub async fn shutdown(&self) {
        self.sender.write().await.take();

        if let Some(worker) = self.worker.lock().await.take() {
            if let Err(e) = worker.await {
                error!(error = %e, "Commit worker terminated abnormally");
            }
        }
        info!("Commit scheduler stopped");
    }

    fn mark_queued(&self, ctx: &TaskContext) {
        self.queued.fetch_add(1, Ordering::SeqCst);
        if let Some(metrics) = self.metrics {
            metrics.record_enqueued();
        }
        info!(task_id = %ctx.task_id, element_id = %ctx.element_id, "Commit queued");
        ctx.report(TaskStatus::Queued, None);
    }

    fn unmark_queued(&self) {
        self.queued.fetch_sub(1, Ordering::SeqCst);
        if let Some(metrics) = self.metrics {
            metrics.record_dequeued();
        }
    }
}

async fn run_worker(
    mut receiver: QueueReceiver,
    pipeline: Arc<UploadPipeline>,
    queued: Arc<AtomicUsize>,
    metrics: Option<&'static Metrics>,
) {
    while let Some(QueuedCommit { request, ctx, done }) = receiver.recv().await {
        queued.fetch_sub(1, Ordering::SeqCst);
        if let Some(metrics) = metrics {
            metrics.record_dequeued();
        }

        let started = Instant::now();
        let outcome = if ctx.is_cancelled() {
            Err(CommitError::Cancelled)
        } else {
            ctx.report(TaskStatus::Running, None);
            run_isolated(Arc::clone(&pipeline), request, ctx.clone()).await
        };

        let status = report_outcome(&ctx, &outcome);
        if let Some(metrics) = metrics {
            metrics.record_commit_complete(status.as_str(), started.elapsed().as_secs_f64());
            if let Err(e) = &outcome {
                if !matches!(e, CommitError::Cancelled) {
                    metrics.record_error(e.metric_label());
                }
            }
        }

        // Caller may have dropped its handle
        let _ = done.send(outcome);
    }

    info!("Commit worker drained its queue");
}

/// Runs one commit in its own task so a panicking collaborator fails that
/// commit instead of the worker. Awaited at once, so commits stay serial.
async fn run_isolated(
    pipeline: Arc<UploadPipeline>,
    request: CommitRequest,
    ctx: TaskContext,
) -> TaskOutcome {
    let task_id = ctx.task_id;
    let handle = tokio::spawn(async move { pipeline.commit(request, &ctx).await });

    match handle.await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(task_id = %task_id, error = %e, "Commit task panicked");
            Err(CommitError::Aborted(e.to_string()))
        }
    }
}

fn report_outcome(ctx: &TaskContext, outcome: &TaskOutcome) -> TaskStatus {
    match outcome {
        Ok(()) => {
            info!(task_id = %ctx.task_id, element_id = %ctx.element_id, "Commit succeeded");
            ctx.report(TaskStatus::Succeeded, None);
            TaskStatus::Succeeded
        }
        Err(CommitError::Cancelled) => {
            warn!(task_id = %ctx.task_id, element_id = %ctx.element_id, "Commit cancelled");
            ctx.report(TaskStatus::Cancelled, None);
            TaskStatus::Cancelled
        }
        Err(e) => {
            error!(
                task_id = %ctx.task_id,
                element_id = %ctx.element_id,
                error = %e,
                retry = ?e.retry_scope(),
                "Commit failed"
            );
            ctx.report(TaskStatus::Failed, Some(e.to_string()));
            TaskStatus::Failed
        }
    }
}
