//! Staging of metadata update payloads

use crate::models::error::TransportError;
use crate::models::types::ElementBatch;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// A serialized metadata payload ready for `Transport::send_json`.
#[derive(Debug)]
pub enum PayloadHandle {
    Memory(Vec<u8>),
    /// Staged on disk; the file is removed when the handle drops.
    File(NamedTempFile),
}

impl PayloadHandle {
    pub async fn bytes(&self) -> Result<Vec<u8>, TransportError> {
        match self {
            PayloadHandle::Memory(data) => Ok(data.clone()),
            PayloadHandle::File(file) => Ok(tokio::fs::read(file.path()).await?),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            PayloadHandle::Memory(_) => None,
            PayloadHandle::File(file) => Some(file.path()),
        }
    }
}

pub trait PayloadSerializer: Send + Sync {
    fn serialize(&self, batch: &ElementBatch) -> Result<PayloadHandle, TransportError>;
}

/// Keeps the JSON body in memory.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl PayloadSerializer for JsonSerializer {
    fn serialize(&self, batch: &ElementBatch) -> Result<PayloadHandle, TransportError> {
        Ok(PayloadHandle::Memory(serde_json::to_vec(batch)?))
    }
}

/// Writes the JSON body to a temporary file before it is sent.
#[derive(Debug, Clone)]
pub struct TempFileSerializer {
    dir: Option<PathBuf>,
}

impl TempFileSerializer {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }
}

impl PayloadSerializer for TempFileSerializer {
    fn serialize(&self, batch: &ElementBatch) -> Result<PayloadHandle, TransportError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("element-batch-").suffix(".json");

        let mut file = match &self.dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                builder.tempfile_in(dir)?
            }
            None => builder.tempfile()?,
        };

        serde_json::to_writer(&mut file, batch)?;
        file.flush()?;

        debug!(path = %file.path().display(), "Staged metadata payload");
        Ok(PayloadHandle::File(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::types::UpdatePayload;

    fn batch() -> ElementBatch {
        ElementBatch::single(
            UpdatePayload {
                id: "elem".to_string(),
                artifact_ids: vec!["a1".to_string()],
            },
            "magicdraw",
        )
    }

    #[tokio::test]
    async fn test_json_serializer_round_trips_batch() {
        let handle = JsonSerializer.serialize(&batch()).unwrap();
        assert!(handle.path().is_none());

        let decoded: ElementBatch = serde_json::from_slice(&handle.bytes().await.unwrap()).unwrap();
        assert_eq!(decoded, batch());
    }

    #[tokio::test]
    async fn test_temp_file_serializer_stages_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let serializer = TempFileSerializer::new(Some(dir.path().join("staging")));

        let handle = serializer.serialize(&batch()).unwrap();
        let path = handle.path().unwrap().to_path_buf();
        assert!(path.starts_with(dir.path().join("staging")));
        assert!(path.exists());

        let decoded: ElementBatch = serde_json::from_slice(&handle.bytes().await.unwrap()).unwrap();
        assert_eq!(decoded, batch());

        drop(handle);
        assert!(!path.exists());
    }
}
