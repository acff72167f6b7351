//! Artifact Sync Library
//!
//! Pushes locally produced artifacts (diagram exports and the like) to a
//! model-management server and links them to their owning element. Commits
//! run through a single-worker scheduler with progress reporting and
//! cooperative cancellation.

pub mod app;
pub mod config;
pub mod models;
pub mod services;
pub mod transport;
pub mod utils;

pub use app::App;
pub use config::Config;
pub use models::artifact::{Artifact, ArtifactContent};
pub use models::error::{CommitError, InvalidArtifactError, ScheduleError, TransportError};
pub use models::types::{CommitRequest, ProgressUpdate, RetryScope, TaskStatus, UpdatePayload};
pub use services::{CommitScheduler, ProgressSink, TaskHandle, UploadPipeline};
