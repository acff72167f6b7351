//! Recording mocks of the pipeline collaborators.

#![allow(dead_code)]

use artifact_sync::config::ServerConfig;
use artifact_sync::models::error::TransportError;
use artifact_sync::models::types::{ProgressUpdate, TaskStatus};
use artifact_sync::services::ProgressSink;
use artifact_sync::transport::{
    BinaryPart, JsonSerializer, PayloadHandle, PayloadSerializer, ProjectEndpointResolver,
    Transport, TransportResponse,
};
use artifact_sync::{Artifact, UploadPipeline};
use indexmap::IndexMap;
use reqwest::Url;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use uuid::Uuid;

pub const BASE_URL: &str = "https://mms.example.org";

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Multipart {
        uri: String,
        fields: IndexMap<String, String>,
        part_name: String,
        file_name: String,
        content_type: String,
        data: Vec<u8>,
    },
    Json {
        uri: String,
        body: serde_json::Value,
    },
}

impl Call {
    pub fn uploaded_id(&self) -> Option<&str> {
        match self {
            Call::Multipart { fields, .. } => fields.get("id").map(String::as_str),
            Call::Json { .. } => None,
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Call::Json { .. })
    }
}

/// Transport that records every call and fails on demand.
pub struct MockTransport {
    calls: Mutex<Vec<Call>>,
    failing_uploads: HashSet<String>,
    panicking_uploads: HashSet<String>,
    metadata_failures: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
    started: Option<mpsc::UnboundedSender<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing_uploads: HashSet::new(),
            panicking_uploads: HashSet::new(),
            metadata_failures: AtomicUsize::new(0),
            gate: None,
            started: None,
        }
    }

    /// Every upload announces its artifact id on the returned receiver, then
    /// waits for a permit on the returned semaphore.
    pub fn gated(self) -> (Self, Arc<Semaphore>, mpsc::UnboundedReceiver<String>) {
        let gate = Arc::new(Semaphore::new(0));
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                gate: Some(Arc::clone(&gate)),
                started: Some(tx),
                ..self
            },
            gate,
            rx,
        )
    }

    pub fn failing_upload(mut self, artifact_id: &str) -> Self {
        self.failing_uploads.insert(artifact_id.to_string());
        self
    }

    /// Uploads of `artifact_id` panic inside the transport.
    pub fn panicking_upload(mut self, artifact_id: &str) -> Self {
        self.panicking_uploads.insert(artifact_id.to_string());
        self
    }

    pub fn failing_metadata(self, times: usize) -> Self {
        self.metadata_failures.store(times, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn json_calls(&self) -> Vec<serde_json::Value> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Json { body, .. } => Some(body),
                Call::Multipart { .. } => None,
            })
            .collect()
    }

    pub fn uploaded_ids(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|call| call.uploaded_id().map(str::to_string))
            .collect()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn send_multipart(
        &self,
        uri: &Url,
        fields: &IndexMap<String, String>,
        binary: BinaryPart,
    ) -> Result<TransportResponse, TransportError> {
        let id = fields.get("id").cloned().unwrap_or_default();

        if let Some(started) = &self.started {
            let _ = started.send(id.clone());
        }
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        if self.panicking_uploads.contains(&id) {
            panic!("transport blew up uploading {id}");
        }

        let data = binary.content.read().await?;
        self.calls.lock().unwrap().push(Call::Multipart {
            uri: uri.to_string(),
            fields: fields.clone(),
            part_name: binary.name,
            file_name: binary.file_name,
            content_type: binary.content_type,
            data,
        });

        if self.failing_uploads.contains(&id) {
            return Err(TransportError::HttpError(500));
        }
        Ok(TransportResponse {
            status: 200,
            body: String::new(),
        })
    }

    async fn send_json(
        &self,
        uri: &Url,
        payload: &PayloadHandle,
    ) -> Result<TransportResponse, TransportError> {
        let body = serde_json::from_slice(&payload.bytes().await?)?;
        self.calls.lock().unwrap().push(Call::Json {
            uri: uri.to_string(),
            body,
        });

        let remaining = self.metadata_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.metadata_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(TransportError::HttpError(503));
        }
        Ok(TransportResponse {
            status: 200,
            body: String::new(),
        })
    }
}

/// Keeps every update in arrival order.
#[derive(Default)]
pub struct RecordingSink {
    updates: Mutex<Vec<ProgressUpdate>>,
}

impl RecordingSink {
    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates.lock().unwrap().clone()
    }

    /// Status transitions of one task, ignoring per-artifact details.
    pub fn statuses(&self, task_id: Uuid) -> Vec<TaskStatus> {
        let mut statuses: Vec<TaskStatus> = Vec::new();
        for update in self.updates() {
            if update.task_id == task_id && statuses.last() != Some(&update.status) {
                statuses.push(update.status);
            }
        }
        statuses
    }

    /// Position of the first `status` update for `task_id`.
    pub fn position(&self, task_id: Uuid, status: TaskStatus) -> Option<usize> {
        self.updates()
            .iter()
            .position(|u| u.task_id == task_id && u.status == status)
    }
}

impl ProgressSink for RecordingSink {
    fn report(&self, update: ProgressUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}

pub fn server_config(project_id: Option<&str>) -> ServerConfig {
    ServerConfig {
        base_url: BASE_URL.to_string(),
        project_id: project_id.map(str::to_string),
        ref_id: "master".to_string(),
        service_token_path: None,
        api_timeout: Duration::from_secs(5),
    }
}

pub fn pipeline_with(transport: Arc<MockTransport>) -> UploadPipeline {
    pipeline_with_serializer(transport, Arc::new(JsonSerializer))
}

pub fn pipeline_with_serializer(
    transport: Arc<MockTransport>,
    serializer: Arc<dyn PayloadSerializer>,
) -> UploadPipeline {
    UploadPipeline::new(
        Arc::new(ProjectEndpointResolver::new(&server_config(Some("PROJ")))),
        transport,
        serializer,
        "magicdraw",
    )
}

pub fn artifact(id: &str) -> Artifact {
    Artifact::from_bytes(id, format!("<svg id=\"{id}\"/>").into_bytes(), "image/svg+xml")
        .expect("valid artifact")
}

pub fn content_uri() -> String {
    format!("{BASE_URL}/projects/PROJ/refs/master/artifacts")
}

pub fn metadata_uri() -> String {
    format!("{BASE_URL}/projects/PROJ/refs/master/elements")
}
