//! Filesystem blob store
//!
//! Uploaded files are written to a single directory. Each file name starts
//! with a SHA-256 prefix of its content, which `read` verifies.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{BlobError, BlobRef, BlobStore};
use crate::validation::input::sanitize_file_name;

/// Length of the content hash prefix in stored file names
const HASH_PREFIX_LEN: usize = 16;

/// Compute SHA256 hash of content
pub fn compute_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    format!("{:x}", result)
}

/// Blob store writing to a local directory
#[derive(Debug, Clone)]
pub struct FileSystemBlobStore {
    root: PathBuf,
}

impl FileSystemBlobStore {
    /// Create a store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a blob reference, refusing anything that is not a plain file name
    fn path_for(&self, blob: &str) -> Result<PathBuf, BlobError> {
        if blob.is_empty() || blob.contains(['/', '\\']) || blob.starts_with('.') {
            return Err(BlobError::NotFound(blob.to_string()));
        }
        Ok(self.root.join(blob))
    }
}

#[async_trait]
impl BlobStore for FileSystemBlobStore {
    async fn store(&self, name_hint: &str, bytes: &[u8]) -> Result<BlobRef, BlobError> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            BlobError::IoError(format!(
                "Failed to create {}: {}",
                self.root.display(),
                e
            ))
        })?;

        let hash = compute_hash(bytes);
        let blob = format!(
            "{}-{}-{}",
            &hash[..HASH_PREFIX_LEN],
            Uuid::new_v4().simple(),
            sanitize_file_name(name_hint)
        );
        let path = self.root.join(&blob);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| BlobError::IoError(format!("Failed to write {}: {}", path.display(), e)))?;

        debug!(blob = %blob, bytes = bytes.len(), "Stored blob");
        Ok(blob)
    }

    async fn read(&self, blob: &str) -> Result<Vec<u8>, BlobError> {
        let path = self.path_for(blob)?;
        let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => BlobError::NotFound(blob.to_string()),
            _ => BlobError::IoError(format!("Failed to read {}: {}", path.display(), e)),
        })?;

        let hash = compute_hash(&bytes);
        if !blob.starts_with(&hash[..HASH_PREFIX_LEN]) {
            warn!(blob = %blob, "Blob content does not match its hash");
            return Err(BlobError::IoError(format!(
                "Checksum mismatch for {}",
                blob
            )));
        }
        Ok(bytes)
    }

    async fn delete(&self, blob: &str) -> Result<(), BlobError> {
        let path = self.path_for(blob)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BlobError::IoError(format!(
                "Failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_store_read_delete() {
        let dir = TempDir::new().unwrap();
        let store = FileSystemBlobStore::new(dir.path().join("uploads"));

        let blob = store.store("my trees.csv", b"name,lat,lon\n").await.unwrap();
        assert!(blob.starts_with(&compute_hash(b"name,lat,lon\n")[..HASH_PREFIX_LEN]));
        assert!(blob.ends_with("my_trees.csv"));
        assert_eq!(store.read(&blob).await.unwrap(), b"name,lat,lon\n");

        store.delete(&blob).await.unwrap();
        assert_eq!(
            store.read(&blob).await,
            Err(BlobError::NotFound(blob.clone()))
        );
        store.delete(&blob).await.unwrap();
    }

    #[tokio::test]
    async fn test_identical_uploads_do_not_share_files() {
        let dir = TempDir::new().unwrap();
        let store = FileSystemBlobStore::new(dir.path());

        let first = store.store("a.csv", b"x").await.unwrap();
        let second = store.store("a.csv", b"x").await.unwrap();
        assert_ne!(first, second);

        store.delete(&first).await.unwrap();
        assert!(store.read(&second).await.is_ok());
    }

    #[tokio::test]
    async fn test_rejects_path_traversal_and_tampering() {
        let dir = TempDir::new().unwrap();
        let store = FileSystemBlobStore::new(dir.path());
        assert!(store.read("../etc/passwd").await.is_err());

        let blob = store.store("a.csv", b"original").await.unwrap();
        std::fs::write(dir.path().join(&blob), b"changed").unwrap();
        assert!(matches!(
            store.read(&blob).await,
            Err(BlobError::IoError(_))
        ));
    }
}
