//! Storage backend abstraction
//!
//! Defines the StorageBackend trait and implementations for the places
//! descriptors and data files live:
//! - FileSystemStorageBackend: local files below a base directory
//! - RemoteStorageBackend: HTTP(S) locations (read-only)

use async_trait::async_trait;

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    FileNotFound(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Storage backend error: {0}")]
    BackendError(String),
}

/// Trait for storage backends
///
/// Abstracts the file operations needed to load and save descriptors and
/// data files across storage systems (file system, HTTP).
#[async_trait(?Send)]
pub trait StorageBackend: Send + Sync {
    /// Read a file from storage
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Write a file to storage
    async fn write_file(&self, path: &str, content: &[u8]) -> Result<(), StorageError>;
}

pub mod filesystem;

#[cfg(feature = "remote")]
pub mod remote;

/// Returns true if `path` is an HTTP(S) URL
pub fn is_remote_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Read bytes from a local path or remote URL, picking the backend by scheme.
///
/// `base_path` is the directory (or URL prefix) relative paths are resolved
/// against. Local relative paths must be safe (see
/// [`filesystem::FileSystemStorageBackend::resolve_path`]).
pub async fn read_location(base_path: Option<&str>, path: &str) -> Result<Vec<u8>, StorageError> {
    let location = join_location(base_path, path);
    if is_remote_path(&location) {
        #[cfg(feature = "remote")]
        {
            return remote::RemoteStorageBackend::new().read_file(&location).await;
        }
        #[cfg(not(feature = "remote"))]
        {
            return Err(StorageError::BackendError(format!(
                "Remote location {} requires the `remote` feature",
                location
            )));
        }
    }

    match base_path {
        Some(base) if !is_remote_path(path) => {
            filesystem::FileSystemStorageBackend::new(base)
                .read_file(path)
                .await
        }
        _ => filesystem::FileSystemStorageBackend::unrestricted()
            .read_file(&location)
            .await,
    }
}

/// Write bytes to a caller-chosen location. Remote locations are read-only.
pub async fn write_location(path: &str, content: &[u8]) -> Result<(), StorageError> {
    if is_remote_path(path) {
        #[cfg(feature = "remote")]
        {
            return remote::RemoteStorageBackend::new().write_file(path, content).await;
        }
        #[cfg(not(feature = "remote"))]
        {
            return Err(StorageError::PermissionDenied(format!(
                "Remote location {} is read-only",
                path
            )));
        }
    }
    filesystem::FileSystemStorageBackend::unrestricted()
        .write_file(path, content)
        .await
}

/// Join a relative path onto a base directory or URL prefix.
///
/// Absolute URLs are returned untouched; without a base the path is used as is.
pub fn join_location(base_path: Option<&str>, path: &str) -> String {
    if is_remote_path(path) {
        return path.to_string();
    }
    match base_path {
        Some(base) if is_remote_path(base) => {
            format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
        }
        Some(base) => std::path::Path::new(base)
            .join(path)
            .to_string_lossy()
            .into_owned(),
        None => path.to_string(),
    }
}
