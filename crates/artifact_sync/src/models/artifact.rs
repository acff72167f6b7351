//! Content-addressed artifact values

use crate::models::error::{InvalidArtifactError, TransportError};
use sha2::{Digest, Sha256};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncReadExt;

pub const SVG_CONTENT_TYPE: &str = "image/svg+xml";

const READ_CHUNK: usize = 8192;

/// Where an artifact's payload lives.
#[derive(Debug, Clone)]
pub enum ArtifactContent {
    Bytes(Arc<[u8]>),
    File(PathBuf),
}

impl ArtifactContent {
    /// Reads the whole payload. Called once per upload attempt.
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        match self {
            ArtifactContent::Bytes(data) => Ok(data.to_vec()),
            ArtifactContent::File(path) => fs::read(path).await,
        }
    }

    async fn check_readable(&self) -> std::io::Result<()> {
        if let ArtifactContent::File(path) = self {
            let file = fs::File::open(path).await?;
            let metadata = file.metadata().await?;
            if !metadata.is_file() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("{} is not a regular file", path.display()),
                ));
            }
        }
        Ok(())
    }
}

/// One binary payload attached to a model element.
///
/// Immutable once built. A changed payload needs a new `Artifact` (and so a
/// new checksum). Equality and hashing look at `id` only.
#[derive(Debug, Clone)]
pub struct Artifact {
    id: String,
    checksum: String,
    content: ArtifactContent,
    content_type: String,
}

impl Artifact {
    pub async fn new(
        id: impl Into<String>,
        checksum: impl Into<String>,
        content: ArtifactContent,
        content_type: impl Into<String>,
    ) -> Result<Self, InvalidArtifactError> {
        let id = id.into();
        let checksum = checksum.into();

        if id.trim().is_empty() {
            return Err(InvalidArtifactError::EmptyId);
        }
        if checksum.trim().is_empty() {
            return Err(InvalidArtifactError::EmptyChecksum(id));
        }

        content
            .check_readable()
            .await
            .map_err(|source| InvalidArtifactError::Unreadable {
                id: id.clone(),
                source,
            })?;

        Ok(Self {
            id,
            checksum,
            content,
            content_type: content_type.into(),
        })
    }

    /// Builds an in-memory artifact, computing its SHA-256 checksum.
    pub fn from_bytes(
        id: impl Into<String>,
        data: impl Into<Vec<u8>>,
        content_type: impl Into<String>,
    ) -> Result<Self, InvalidArtifactError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(InvalidArtifactError::EmptyId);
        }

        let data: Vec<u8> = data.into();
        let checksum = hex::encode(Sha256::digest(&data));

        Ok(Self {
            id,
            checksum,
            content: ArtifactContent::Bytes(data.into()),
            content_type: content_type.into(),
        })
    }

    /// Builds a file-backed artifact, streaming the file once to checksum it.
    pub async fn from_file(
        id: impl Into<String>,
        path: impl AsRef<Path>,
        content_type: impl Into<String>,
    ) -> Result<Self, InvalidArtifactError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(InvalidArtifactError::EmptyId);
        }

        let path = path.as_ref().to_path_buf();
        let checksum = file_checksum(&path)
            .await
            .map_err(|source| InvalidArtifactError::Unreadable {
                id: id.clone(),
                source,
            })?;

        Ok(Self {
            id,
            checksum,
            content: ArtifactContent::File(path),
            content_type: content_type.into(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn content(&self) -> &ArtifactContent {
        &self.content
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Filename sent with the binary part of the upload.
    pub fn file_name(&self) -> String {
        format!("{}.tmp", self.id)
    }

    /// Reads the payload for one upload attempt.
    ///
    /// File-backed content is hashed again and must still match `checksum`,
    /// so a file rewritten after construction is refused rather than sent
    /// under the old checksum.
    pub async fn read_content(&self) -> Result<Vec<u8>, TransportError> {
        let data = self.content.read().await?;

        if let ArtifactContent::File(_) = &self.content {
            let actual = hex::encode(Sha256::digest(&data));
            if !actual.eq_ignore_ascii_case(&self.checksum) {
                return Err(TransportError::ContentChanged {
                    expected: self.checksum.clone(),
                    actual,
                });
            }
        }

        Ok(data)
    }
}

impl PartialEq for Artifact {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Artifact {}

impl Hash for Artifact {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

async fn file_checksum(path: &Path) -> std::io::Result<String> {
    let mut file = fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_CHUNK];
    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
