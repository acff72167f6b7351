//! Application initialization and setup

use crate::config::Config;
use crate::models::error::TransportError;
use crate::services::pipeline::UploadPipeline;
use crate::services::scheduler::CommitScheduler;
use crate::transport::{
    HttpTransport, JsonSerializer, PayloadSerializer, ProjectEndpointResolver, TempFileSerializer,
};
use crate::utils::metrics;
use std::sync::Arc;
use tracing::info;

/// Application components
pub struct App {
    pub pipeline: Arc<UploadPipeline>,
    pub scheduler: Arc<CommitScheduler>,
}

impl App {
    /// Wires configuration into a running scheduler. Needs a tokio runtime.
    pub async fn initialize(config: &Config) -> Result<Self, TransportError> {
        let auth_token = match &config.server.service_token_path {
            Some(path) => Some(tokio::fs::read_to_string(path).await?.trim().to_string()),
            None => None,
        };

        let resolver = Arc::new(ProjectEndpointResolver::new(&config.server));
        let transport = Arc::new(HttpTransport::new(
            &config.server,
            auth_token,
            config.upload.max_retries,
        )?);
        let serializer: Arc<dyn PayloadSerializer> = match &config.upload.staging_dir {
            Some(dir) => Arc::new(TempFileSerializer::new(Some(dir.clone()))),
            None => Arc::new(JsonSerializer),
        };

        let mut pipeline =
            UploadPipeline::new(resolver, transport, serializer, config.upload.source_tag.clone());
        if config.metrics.enabled {
            pipeline = pipeline.with_metrics(metrics::get_metrics());
        }
        let pipeline = Arc::new(pipeline);

        let scheduler = if config.metrics.enabled {
            CommitScheduler::with_metrics(
                Arc::clone(&pipeline),
                &config.scheduler,
                metrics::get_metrics(),
            )
        } else {
            CommitScheduler::new(Arc::clone(&pipeline), &config.scheduler)
        };

        info!(base_url = %config.server.base_url, "Artifact sync initialized");

        Ok(App {
            pipeline,
            scheduler: Arc::new(scheduler),
        })
    }
}
