//! `StorageBackend` (§6): local-filesystem implementation. Object-store
//! backends are an out-of-scope external collaborator (§1) — a deployment
//! that needs one swaps this implementation in behind the same trait.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{CoreError, Result};

#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn put(&self, relative_path: &str, bytes: &[u8]) -> Result<()>;
    async fn get(&self, relative_path: &str) -> Result<Vec<u8>>;
    async fn delete(&self, relative_path: &str) -> Result<()>;
}

/// Stores bytes under `storage_root/attachments/{memory_id}/{attachment_id}/{filename}`.
pub struct LocalStorageBackend {
    root: PathBuf,
}

impl LocalStorageBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, relative_path: &str) -> Result<PathBuf> {
        let joined = self.root.join(relative_path);
        let normalized: PathBuf = joined.components().collect();
        if !normalized.starts_with(&self.root) {
            return Err(CoreError::Invalid("attachment path escapes storage root".into()));
        }
        Ok(normalized)
    }
}

#[async_trait]
impl StorageBackend for LocalStorageBackend {
    async fn put(&self, relative_path: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(relative_path)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(&path).await?;
        file.write_all(bytes).await?;
        Ok(())
    }

    async fn get(&self, relative_path: &str) -> Result<Vec<u8>> {
        let path = self.resolve(relative_path)?;
        Ok(tokio::fs::read(&path).await?)
    }

    async fn delete(&self, relative_path: &str) -> Result<()> {
        let path = self.resolve(relative_path)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

pub fn attachment_relative_path(memory_id: &str, attachment_id: &str, filename: &str) -> String {
    format!("attachments/{memory_id}/{attachment_id}/{filename}")
}

/// Sanitizes a user-supplied filename to a single path segment, matching the
/// spec's `attachments/{memory_id}/{attachment_id}/{filename}` layout.
pub fn sanitize_filename(filename: &str) -> String {
    let base = Path::new(filename)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("attachment");
    if base.is_empty() {
        "attachment".to_string()
    } else {
        base.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalStorageBackend::new(dir.path());
        let rel = attachment_relative_path("m1", "a1", "report.pdf");

        backend.put(&rel, b"hello").await.unwrap();
        let bytes = backend.get(&rel).await.unwrap();

        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalStorageBackend::new(dir.path());
        let rel = attachment_relative_path("m1", "a1", "x.txt");

        assert!(backend.delete(&rel).await.is_ok());
        backend.put(&rel, b"x").await.unwrap();
        assert!(backend.delete(&rel).await.is_ok());
        assert!(backend.get(&rel).await.is_err());
    }

    #[test]
    fn sanitize_filename_strips_path_components() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
    }
}
