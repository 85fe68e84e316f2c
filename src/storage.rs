//! Evidence file storage collaborator.
//!
//! Evidence files (identity scans, contracts) are uploaded long before an
//! archive is requested and live in an external store referenced by path.
//! The assembler only ever needs a byte-fetch; a missing or stalled file
//! is downgraded to a stand-in archive entry, never a request failure.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Upper bound on one evidence fetch; a stalled fetch degrades to the
/// stand-in entry instead of stalling the whole archive.
pub const EVIDENCE_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("evidence file not found: {0}")]
    NotFound(String),
    #[error("failed to read evidence file: {0}")]
    Io(#[source] std::io::Error),
    #[error("evidence store returned an error: {0}")]
    Upstream(String),
    #[error("evidence fetch timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait EvidenceStorage: Send + Sync {
    /// Fetch a previously uploaded file as raw bytes by stored path.
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, StorageError>;
}

/// Fetch with the bounded-timeout policy applied.
pub async fn fetch_with_timeout(
    storage: &dyn EvidenceStorage,
    path: &str,
    limit: Duration,
) -> Result<Vec<u8>, StorageError> {
    match tokio::time::timeout(limit, storage.fetch(path)).await {
        Ok(result) => result,
        Err(_) => Err(StorageError::Timeout(limit)),
    }
}

/// Local filesystem store, used for development and tests.
pub struct FsEvidenceStorage {
    root: PathBuf,
}

impl FsEvidenceStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl EvidenceStorage for FsEvidenceStorage {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let full_path = self.root.join(path);
        match tokio::fs::read(&full_path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

/// Remote object store reached over HTTP.
pub struct HttpEvidenceStorage {
    base_url: String,
    client: reqwest::Client,
}

impl HttpEvidenceStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EvidenceStorage for HttpEvidenceStorage {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| StorageError::Upstream(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(path.to_string()));
        }
        if !response.status().is_success() {
            return Err(StorageError::Upstream(format!(
                "unexpected status {} for {}",
                response.status(),
                path
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StorageError::Upstream(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
