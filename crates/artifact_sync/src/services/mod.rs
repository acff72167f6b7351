//! Commit pipeline, scheduling and progress reporting

pub mod pipeline;
pub mod progress;
pub mod reconcile;
pub mod scheduler;
pub mod task;

pub use pipeline::UploadPipeline;
pub use progress::{BroadcastProgressSink, ChannelProgressSink, ProgressSink, TracingProgressSink};
pub use reconcile::build_update;
pub use scheduler::{CommitScheduler, TaskHandle};
pub use task::{CancelFlag, TaskContext};
