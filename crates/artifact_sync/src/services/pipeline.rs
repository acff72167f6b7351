//! Content uploads followed by one reconciled metadata update

use crate::models::artifact::{Artifact, ArtifactContent};
use crate::models::error::{CommitError, TransportError};
use crate::models::types::{CommitRequest, ElementBatch, EndpointKind, TaskStatus, UpdatePayload};
use crate::services::reconcile::build_update;
use crate::services::task::TaskContext;
use crate::transport::{BinaryPart, EndpointResolver, PayloadSerializer, Transport};
use crate::utils::metrics::Metrics;
use indexmap::IndexMap;
use reqwest::Url;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub const ID_FIELD: &str = "id";
pub const CHECKSUM_FIELD: &str = "checksum";
pub const SOURCE_FIELD: &str = "source";
pub const FILE_FIELD: &str = "file";

pub struct UploadPipeline {
    resolver: Arc<dyn EndpointResolver>,
    transport: Arc<dyn Transport>,
    serializer: Arc<dyn PayloadSerializer>,
    source_tag: String,
    metrics: Option<&'static Metrics>,
}

impl UploadPipeline {
    pub fn new(
        resolver: Arc<dyn EndpointResolver>,
        transport: Arc<dyn Transport>,
        serializer: Arc<dyn PayloadSerializer>,
        source_tag: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            transport,
            serializer,
            source_tag: source_tag.into(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: &'static Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Runs one commit.
    ///
    /// Steps run strictly in order and the first failure abandons the rest:
    /// resolve both endpoints, upload every artifact, then send the
    /// reconciled element update. Content already uploaded is not rolled back
    /// when a later step fails. Cancellation is honoured between steps only.
    #[instrument(skip_all, fields(task_id = %ctx.task_id, element_id = %request.owning_element_id))]
    pub async fn commit(&self, request: CommitRequest, ctx: &TaskContext) -> Result<(), CommitError> {
        ctx.check_cancelled()?;

        let content_uri = self.resolver.resolve(EndpointKind::Content)?;
        let metadata_uri = self.resolver.resolve(EndpointKind::Metadata)?;

        let total = request.artifacts.len();
        for (index, artifact) in request.artifacts.iter().enumerate() {
            ctx.check_cancelled()?;

            if let Err(cause) = self.upload_artifact(&content_uri, artifact).await {
                warn!(artifact_id = %artifact.id(), error = %cause, "Artifact upload failed");
                return Err(CommitError::ArtifactUploadFailed {
                    artifact_id: artifact.id().to_string(),
                    cause,
                });
            }

            if let Some(metrics) = self.metrics {
                metrics.record_upload();
            }
            ctx.report(
                TaskStatus::Running,
                Some(format!(
                    "Uploaded artifact {} ({}/{})",
                    artifact.id(),
                    index + 1,
                    total
                )),
            );
        }

        ctx.check_cancelled()?;

        let payload = build_update(
            &request.owning_element_id,
            &request.initial_artifact_ids,
            &request.artifacts,
        );
        self.send_update(&metadata_uri, &payload).await?;

        info!(
            uploaded = total,
            linked = payload.artifact_ids.len(),
            "Artifacts committed"
        );
        Ok(())
    }

    /// Resends an element update on its own.
    ///
    /// Used to recover from `MetadataUpdateFailed`: content is already on
    /// the server, only the linkage is missing.
    pub async fn update_metadata(&self, payload: &UpdatePayload) -> Result<(), CommitError> {
        let metadata_uri = self.resolver.resolve(EndpointKind::Metadata)?;
        self.send_update(&metadata_uri, payload).await
    }

    async fn upload_artifact(&self, uri: &Url, artifact: &Artifact) -> Result<(), TransportError> {
        let mut fields = IndexMap::new();
        fields.insert(ID_FIELD.to_string(), artifact.id().to_string());
        fields.insert(CHECKSUM_FIELD.to_string(), artifact.checksum().to_string());
        fields.insert(SOURCE_FIELD.to_string(), self.source_tag.clone());

        let data = artifact.read_content().await?;
        let binary = BinaryPart {
            name: FILE_FIELD.to_string(),
            content: ArtifactContent::Bytes(data.into()),
            content_type: artifact.content_type().to_string(),
            file_name: artifact.file_name(),
        };

        self.transport.send_multipart(uri, &fields, binary).await?;
        info!(artifact_id = %artifact.id(), checksum = %artifact.checksum(), "Artifact uploaded");
        Ok(())
    }

    async fn send_update(&self, uri: &Url, payload: &UpdatePayload) -> Result<(), CommitError> {
        let batch = ElementBatch::single(payload.clone(), self.source_tag.clone());

        let result = match self.serializer.serialize(&batch) {
            Ok(handle) => self.transport.send_json(uri, &handle).await.map(|_| ()),
            Err(e) => Err(e),
        };

        result.map_err(|cause| {
            warn!(element_id = %payload.id, error = %cause, "Metadata update failed");
            CommitError::MetadataUpdateFailed { cause }
        })
    }
}
