//! Content store adapters.
//!
//! Payloads are addressed by the SHA-256 of their bytes, so writing the same
//! payload twice is a no-op and concurrent writers cannot conflict.

use anyhow::{Context, Result, anyhow, bail};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use testlog_ids::BlobRef;
use testlog_ports::ContentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentBackend {
    FileSystem,
    InMemory,
}

impl fmt::Display for ContentBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentBackend::FileSystem => write!(f, "filesystem"),
            ContentBackend::InMemory => write!(f, "memory"),
        }
    }
}

/// In-memory content store, for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryContentStore {
    blobs: RwLock<HashMap<BlobRef, Vec<u8>>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backend(&self) -> ContentBackend {
        ContentBackend::InMemory
    }

    pub fn len(&self) -> usize {
        self.blobs.read().map(|blobs| blobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ContentStore for InMemoryContentStore {
    fn put(&self, payload: &[u8]) -> Result<BlobRef> {
        let blob = BlobRef::for_content(payload);
        let mut blobs = self
            .blobs
            .write()
            .map_err(|_| anyhow!("content store lock poisoned"))?;
        blobs
            .entry(blob.clone())
            .or_insert_with(|| payload.to_vec());
        Ok(blob)
    }

    fn get(&self, blob: &BlobRef) -> Result<Vec<u8>> {
        let blobs = self
            .blobs
            .read()
            .map_err(|_| anyhow!("content store lock poisoned"))?;
        blobs
            .get(blob)
            .cloned()
            .ok_or_else(|| anyhow!("blob {blob} not found"))
    }
}

/// Filesystem content store: `<root>/<first two hex chars>/<hash>`.
#[derive(Debug, Clone)]
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("create content store {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn backend(&self) -> ContentBackend {
        ContentBackend::FileSystem
    }

    pub fn path_for(&self, blob: &BlobRef) -> PathBuf {
        self.root.join(blob.shard()).join(blob.as_str())
    }
}

impl ContentStore for FsContentStore {
    fn put(&self, payload: &[u8]) -> Result<BlobRef> {
        let blob = BlobRef::for_content(payload);
        let path = self.path_for(&blob);
        if path.exists() {
            tracing::trace!(%blob, "blob already stored");
            return Ok(blob);
        }

        let dir = self.root.join(blob.shard());
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create shard {}", dir.display()))?;

        // Write-then-rename so readers never see a partial blob.
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .with_context(|| format!("create temp file in {}", dir.display()))?;
        tmp.write_all(payload)
            .with_context(|| format!("write blob {blob}"))?;
        tmp.persist(&path)
            .with_context(|| format!("persist blob {}", path.display()))?;

        tracing::debug!(%blob, bytes = payload.len(), "stored blob");
        Ok(blob)
    }

    fn get(&self, blob: &BlobRef) -> Result<Vec<u8>> {
        let path = self.path_for(blob);
        let data =
            std::fs::read(&path).with_context(|| format!("read blob {}", path.display()))?;

        let actual = BlobRef::for_content(&data);
        if &actual != blob {
            bail!("blob integrity check failed: expected {blob}, got {actual}");
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_display() {
        assert_eq!(ContentBackend::FileSystem.to_string(), "filesystem");
        assert_eq!(InMemoryContentStore::new().backend().to_string(), "memory");
    }

    #[test]
    fn in_memory_put_get() {
        let store = InMemoryContentStore::new();
        let blob = store.put(b"hello").unwrap();
        assert_eq!(blob, BlobRef::for_content(b"hello"));
        assert_eq!(store.get(&blob).unwrap(), b"hello");
    }

    #[test]
    fn in_memory_put_is_idempotent() {
        let store = InMemoryContentStore::new();
        let a = store.put(b"same").unwrap();
        let b = store.put(b"same").unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn in_memory_missing_blob_is_error() {
        let store = InMemoryContentStore::new();
        let err = store.get(&BlobRef::new("deadbeef")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
