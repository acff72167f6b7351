//! Resolution of the content and metadata endpoints

use crate::config::ServerConfig;
use crate::models::error::EndpointError;
use crate::models::types::EndpointKind;
use reqwest::Url;

pub trait EndpointResolver: Send + Sync {
    fn resolve(&self, kind: EndpointKind) -> Result<Url, EndpointError>;
}

/// Builds endpoints from the configured server and project binding:
/// `{base}/projects/{project}/refs/{ref}/artifacts` and `.../elements`.
pub struct ProjectEndpointResolver {
    base_url: String,
    project_id: Option<String>,
    ref_id: String,
}

impl ProjectEndpointResolver {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            project_id: config.project_id.clone(),
            ref_id: config.ref_id.clone(),
        }
    }

    fn collection(kind: EndpointKind) -> &'static str {
        match kind {
            EndpointKind::Content => "artifacts",
            EndpointKind::Metadata => "elements",
        }
    }
}

impl EndpointResolver for ProjectEndpointResolver {
    fn resolve(&self, kind: EndpointKind) -> Result<Url, EndpointError> {
        let project_id = self
            .project_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or(EndpointError::NotBound(kind))?;

        let mut url = Url::parse(&self.base_url).map_err(|e| EndpointError::InvalidUrl {
            kind,
            reason: e.to_string(),
        })?;

        url.path_segments_mut()
            .map_err(|_| EndpointError::InvalidUrl {
                kind,
                reason: format!("{} cannot be a base URL", self.base_url),
            })?
            .pop_if_empty()
            .extend([
                "projects",
                project_id,
                "refs",
                self.ref_id.as_str(),
                Self::collection(kind),
            ]);

        Ok(url)
    }
}
