//! File system storage backend
//!
//! Implements StorageBackend for local files.
//!
//! ## Security
//!
//! Resource paths inside a descriptor are untrusted input. When the backend
//! is rooted at a base directory, absolute paths and paths containing ".."
//! are rejected, and resolved paths are verified to remain within the base.

use super::{StorageBackend, StorageError};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// File system storage backend
pub struct FileSystemStorageBackend {
    base_path: Option<PathBuf>,
}

impl FileSystemStorageBackend {
    /// Create a file system backend restricted to `base_path`
    ///
    /// # Example
    ///
    /// ```rust
    /// use data_package_sdk::storage::filesystem::FileSystemStorageBackend;
    ///
    /// let backend = FileSystemStorageBackend::new("/workspace/package");
    /// ```
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: Some(base_path.as_ref().to_path_buf()),
        }
    }

    /// Create a backend that accepts any path, relative to the working directory.
    ///
    /// Used for paths handed over directly by the caller rather than read
    /// from a descriptor.
    pub fn unrestricted() -> Self {
        Self { base_path: None }
    }

    /// Returns true if a descriptor path is safe to read below a base directory
    pub fn is_safe_path(path: &str) -> bool {
        let candidate = Path::new(path);
        !candidate.is_absolute()
            && !path.starts_with('/')
            && !path.starts_with('\\')
            && candidate.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    }

    /// Resolve a path relative to the base path with security checks.
    ///
    /// # Security
    ///
    /// - Rejects absolute paths and ".." components
    /// - Verifies an existing resolved path stays within base_path
    pub fn resolve_path(&self, path: &str) -> Result<PathBuf, StorageError> {
        let Some(base_path) = &self.base_path else {
            return Ok(PathBuf::from(path));
        };

        if !Self::is_safe_path(path) {
            return Err(StorageError::PermissionDenied(format!(
                "Local path \"{}\" is not safe",
                path
            )));
        }

        let full = base_path.join(path);

        if full.exists() {
            let canonical = full
                .canonicalize()
                .map_err(|e| StorageError::IoError(format!("Failed to resolve path: {}", e)))?;

            let base_canonical = base_path
                .canonicalize()
                .unwrap_or_else(|_| base_path.clone());

            if !canonical.starts_with(&base_canonical) {
                return Err(StorageError::PermissionDenied(
                    "Path escapes base directory".to_string(),
                ));
            }

            return Ok(canonical);
        }

        // Non-existing paths are returned as joined; writes create them below base
        Ok(full)
    }
}

#[async_trait(?Send)]
impl StorageBackend for FileSystemStorageBackend {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let full_path = self.resolve_path(path)?;
        debug!("Reading {}", full_path.display());

        fs::read(&full_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::FileNotFound(path.to_string())
            } else {
                StorageError::IoError(format!("Failed to read file {}: {}", path, e))
            }
        })
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<(), StorageError> {
        let full_path = self.resolve_path(path)?;

        if let Some(parent) = full_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::IoError(format!("Failed to create directory for {}: {}", path, e))
            })?;
        }

        fs::write(&full_path, content)
            .await
            .map_err(|e| StorageError::IoError(format!("Failed to write file {}: {}", path, e)))
    }
}
