use crate::models::artifact::Artifact;
use crate::models::error::CommitError;
use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The two server endpoints a commit talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndpointKind {
    Content,
    Metadata,
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointKind::Content => write!(f, "content"),
            EndpointKind::Metadata => write!(f, "metadata"),
        }
    }
}

/// One commit: upload `artifacts`, then link them to the owning element.
#[derive(Debug, Clone)]
pub struct CommitRequest {
    pub owning_element_id: String,
    pub initial_artifact_ids: IndexSet<String>,
    pub artifacts: IndexSet<Artifact>,
}

impl CommitRequest {
    pub fn new(owning_element_id: impl Into<String>) -> Result<Self, CommitError> {
        let owning_element_id = owning_element_id.into();
        if owning_element_id.trim().is_empty() {
            return Err(CommitError::InvalidRequest(
                "owning element id must not be empty".to_string(),
            ));
        }

        Ok(Self {
            owning_element_id,
            initial_artifact_ids: IndexSet::new(),
            artifacts: IndexSet::new(),
        })
    }

    pub fn with_initial_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.initial_artifact_ids
            .extend(ids.into_iter().map(Into::into));
        self
    }

    /// Adds an artifact; an id already in the set keeps its first artifact.
    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.insert(artifact);
        self
    }

    pub fn with_artifacts(mut self, artifacts: impl IntoIterator<Item = Artifact>) -> Self {
        for artifact in artifacts {
            self.artifacts.insert(artifact);
        }
        self
    }
}

/// Reconciled artifact linkage for one element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePayload {
    pub id: String,
    #[serde(rename = "_artifactIds")]
    pub artifact_ids: Vec<String>,
}

/// Body of a metadata update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementBatch {
    pub elements: Vec<UpdatePayload>,
    pub source: String,
}

impl ElementBatch {
    pub fn single(payload: UpdatePayload, source: impl Into<String>) -> Self {
        Self {
            elements: vec![payload],
            source: source.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub task_id: Uuid,
    pub element_id: String,
    pub status: TaskStatus,
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ProgressUpdate {
    pub fn new(task_id: Uuid, element_id: &str, status: TaskStatus) -> Self {
        Self {
            task_id,
            element_id: element_id.to_string(),
            status,
            detail: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// How much of a failed commit a caller has to resend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryScope {
    /// Resubmit uploads and metadata.
    FullCommit,
    /// Content already landed; resend the metadata update only.
    MetadataOnly,
    /// Nothing to retry without changing the input.
    None,
}
