use crate::models::types::{EndpointKind, RetryScope};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InvalidArtifactError {
    #[error("Artifact id must not be empty")]
    EmptyId,

    #[error("Artifact {0} has an empty checksum")]
    EmptyChecksum(String),

    #[error("Artifact {id} content is unreadable: {source}")]
    Unreadable {
        id: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("No active server binding for {0} endpoint")]
    NotBound(EndpointKind),

    #[error("Invalid {kind} endpoint URL: {reason}")]
    InvalidUrl { kind: EndpointKind, reason: String },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    HttpError(u16),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Content changed since checksum {expected} was taken (now {actual})")]
    ContentChanged { expected: String, actual: String },
}

impl TransportError {
    /// Whether a transport-level retry may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::HttpError(status) => *status == 429 || *status >= 500,
            TransportError::NetworkError(_) => true,
            TransportError::IoError(_)
            | TransportError::SerializationError(_)
            | TransportError::ContentChanged { .. } => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum CommitError {
    #[error("Invalid commit request: {0}")]
    InvalidRequest(String),

    #[error("Endpoint unavailable: {0}")]
    EndpointUnavailable(#[from] EndpointError),

    #[error("Failed to upload artifact {artifact_id}: {cause}")]
    ArtifactUploadFailed {
        artifact_id: String,
        #[source]
        cause: TransportError,
    },

    #[error("Failed to update element metadata: {cause}")]
    MetadataUpdateFailed {
        #[source]
        cause: TransportError,
    },

    #[error("Commit aborted: {0}")]
    Aborted(String),

    #[error("Commit cancelled")]
    Cancelled,
}

impl CommitError {
    pub fn retry_scope(&self) -> RetryScope {
        match self {
            CommitError::EndpointUnavailable(_)
            | CommitError::ArtifactUploadFailed { .. }
            | CommitError::Aborted(_) => RetryScope::FullCommit,
            CommitError::MetadataUpdateFailed { .. } => RetryScope::MetadataOnly,
            CommitError::InvalidRequest(_) | CommitError::Cancelled => RetryScope::None,
        }
    }

    pub fn metric_label(&self) -> &'static str {
        match self {
            CommitError::InvalidRequest(_) => "invalid_request",
            CommitError::EndpointUnavailable(_) => "endpoint_unavailable",
            CommitError::ArtifactUploadFailed { .. } => "artifact_upload",
            CommitError::MetadataUpdateFailed { .. } => "metadata_update",
            CommitError::Aborted(_) => "aborted",
            CommitError::Cancelled => "cancelled",
        }
    }

    /// The artifact whose upload failed, if this is an upload failure.
    pub fn artifact_id(&self) -> Option<&str> {
        match self {
            CommitError::ArtifactUploadFailed { artifact_id, .. } => Some(artifact_id),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("Commit queue is full ({0} tasks waiting)")]
    QueueFull(usize),

    #[error("Scheduler is shut down")]
    SchedulerClosed,
}
