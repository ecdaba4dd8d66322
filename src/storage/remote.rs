//! Remote storage backend
//!
//! Implements StorageBackend over HTTP(S) for remote descriptors, profiles
//! and data files. Remote locations are read-only.

use super::{StorageBackend, StorageError, is_remote_path};
use async_trait::async_trait;
use tracing::info;

/// Read-only HTTP storage backend
pub struct RemoteStorageBackend {
    client: reqwest::Client,
}

impl Default for RemoteStorageBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteStorageBackend {
    /// Create a new remote storage backend
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn check_url(url: &str) -> Result<(), StorageError> {
        if !is_remote_path(url) {
            return Err(StorageError::BackendError(format!(
                "Not an HTTP(S) URL: {}",
                url
            )));
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl StorageBackend for RemoteStorageBackend {
    async fn read_file(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        Self::check_url(url)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StorageError::NetworkError(format!("Failed to fetch {}: {}", url, e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::FileNotFound(url.to_string()));
        }
        if !response.status().is_success() {
            return Err(StorageError::NetworkError(format!(
                "Request for {} failed: {}",
                url,
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StorageError::NetworkError(format!("Failed to read {}: {}", url, e)))?;

        info!("Fetched {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }

    async fn write_file(&self, url: &str, _content: &[u8]) -> Result<(), StorageError> {
        Err(StorageError::PermissionDenied(format!(
            "Remote location {} is read-only",
            url
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_non_http_locations() {
        let backend = RemoteStorageBackend::new();
        let result = backend.read_file("data/data.csv").await;
        assert!(matches!(result, Err(StorageError::BackendError(_))));
    }

    #[tokio::test]
    async fn test_write_is_denied() {
        let backend = RemoteStorageBackend::new();
        let result = backend
            .write_file("https://example.com/data.csv", b"id\n")
            .await;
        assert!(matches!(result, Err(StorageError::PermissionDenied(_))));
    }
}
