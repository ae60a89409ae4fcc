//! Read-only boundary to the artifact store.
//!
//! Uploading, listing, and deleting artifacts belong to the storage service; the analysis core
//! only ever fetches bytes for a key whose ownership has already been checked.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

use crate::extraction::ArtifactRef;

/// Errors surfaced by artifact stores.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No artifact exists under the key.
    #[error("artifact not found: {0}")]
    NotFound(String),
    /// The store failed while reading the artifact.
    #[error("failed to read artifact {key}: {source}")]
    Io {
        /// Key being read.
        key: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Source of artifact bytes.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Fetch the full contents of an artifact.
    async fn get_bytes(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, StorageError>;
}

/// Artifact store backed by a local directory, keys mapping to relative paths.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    /// Serve artifacts from beneath `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a key to a path, refusing keys that would escape the root.
    fn resolve(&self, key: &str) -> Option<PathBuf> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        (safe && !key.is_empty()).then(|| self.root.join(relative))
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn get_bytes(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, StorageError> {
        let path = self
            .resolve(&artifact.key)
            .ok_or_else(|| StorageError::NotFound(artifact.key.clone()))?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                tracing::debug!(key = %artifact.key, bytes = bytes.len(), "Loaded artifact");
                Ok(bytes)
            }
            Err(error) if error.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(artifact.key.clone()))
            }
            Err(source) => Err(StorageError::Io {
                key: artifact.key.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_bytes_under_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("user-1")).unwrap();
        std::fs::write(dir.path().join("user-1/notes.txt"), b"hello").unwrap();

        let store = LocalArtifactStore::new(dir.path());
        let bytes = store
            .get_bytes(&ArtifactRef::from_key("user-1/notes.txt"))
            .await
            .expect("bytes");
        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn missing_artifact_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalArtifactStore::new(dir.path());
        let error = store
            .get_bytes(&ArtifactRef::from_key("user-1/absent.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(error, StorageError::NotFound(key) if key == "user-1/absent.pdf"));
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalArtifactStore::new(dir.path().join("root"));
        for key in ["../secret.txt", "/etc/passwd", "user/../../x.txt"] {
            let error = store
                .get_bytes(&ArtifactRef::from_key(key))
                .await
                .unwrap_err();
            assert!(matches!(error, StorageError::NotFound(_)), "{key}");
        }
    }
}
