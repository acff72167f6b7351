use crate::config::ServerConfig;
use crate::models::artifact::ArtifactContent;
use crate::models::error::TransportError;
use crate::transport::serializer::PayloadHandle;
use indexmap::IndexMap;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Url};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

const INITIAL_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF_MS: u64 = 30_000;

/// Exponential delay before retry `attempt` (0-based), capped at 30s.
fn backoff_delay(attempt: u32) -> Duration {
    let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(INITIAL_BACKOFF_MS.saturating_mul(factor).min(MAX_BACKOFF_MS))
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// The binary part of a multipart upload.
#[derive(Debug, Clone)]
pub struct BinaryPart {
    pub name: String,
    pub content: ArtifactContent,
    pub content_type: String,
    pub file_name: String,
}

#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send_multipart(
        &self,
        uri: &Url,
        fields: &IndexMap<String, String>,
        binary: BinaryPart,
    ) -> Result<TransportResponse, TransportError>;

    async fn send_json(
        &self,
        uri: &Url,
        payload: &PayloadHandle,
    ) -> Result<TransportResponse, TransportError>;
}

pub struct HttpTransport {
    http_client: Client,
    auth_token: Option<String>,
    max_retries: u32,
}

impl HttpTransport {
    pub fn new(
        config: &ServerConfig,
        auth_token: Option<String>,
        max_retries: u32,
    ) -> Result<Self, TransportError> {
        let http_client = Client::builder().timeout(config.api_timeout).build()?;

        Ok(Self {
            http_client,
            auth_token,
            max_retries,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn execute(&self, request: RequestBuilder) -> Result<TransportResponse, TransportError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(TransportError::NetworkError)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::HttpError(status.as_u16()));
        }

        let body = response.text().await?;
        Ok(TransportResponse {
            status: status.as_u16(),
            body,
        })
    }

    async fn send_with_retry<F, Fut>(
        &self,
        uri: &Url,
        send: F,
    ) -> Result<TransportResponse, TransportError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<TransportResponse, TransportError>>,
    {
        let mut attempt = 0;
        loop {
            match send().await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let backoff = backoff_delay(attempt);
                    warn!(
                        uri = %uri,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis(),
                        error = %e,
                        "Retrying request after backoff"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn multipart_form(
    fields: &IndexMap<String, String>,
    binary: &BinaryPart,
    data: &[u8],
) -> Result<Form, TransportError> {
    let mut form = Form::new();
    for (name, value) in fields {
        form = form.text(name.clone(), value.clone());
    }

    let part = Part::bytes(data.to_vec())
        .file_name(binary.file_name.clone())
        .mime_str(&binary.content_type)?;

    Ok(form.part(binary.name.clone(), part))
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn send_multipart(
        &self,
        uri: &Url,
        fields: &IndexMap<String, String>,
        binary: BinaryPart,
    ) -> Result<TransportResponse, TransportError> {
        // Read once, reuse across transport retries
        let data = binary.content.read().await?;
        debug!(uri = %uri, file = %binary.file_name, size = data.len(), "Sending multipart upload");

        let binary = &binary;
        let data = &data;
        self.send_with_retry(uri, || async move {
            let form = multipart_form(fields, binary, data)?;
            self.execute(self.http_client.post(uri.clone()).multipart(form))
                .await
        })
        .await
    }

    async fn send_json(
        &self,
        uri: &Url,
        payload: &PayloadHandle,
    ) -> Result<TransportResponse, TransportError> {
        let body = payload.bytes().await?;
        debug!(uri = %uri, size = body.len(), "Sending JSON payload");

        let body = &body;
        self.send_with_retry(uri, || async move {
            let request = self
                .http_client
                .post(uri.clone())
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone());
            self.execute(request).await
        })
        .await
    }
}
