//! Object store abstraction
//!
//! The pipeline exchanges artifacts (transcripts, staged job input, job
//! output, consolidated analyses) through a key-value blob store with
//! prefix listing. The filesystem-backed implementation maps keys to paths
//! under a root folder; keys use `/` separators and must stay inside the
//! root.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Object store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Store IO error: {0}")]
    Io(String),
}

/// Key-value blob store with prefix listing
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object's bytes.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Write an object, overwriting any existing object at the key
    /// (idempotent upsert).
    async fn put(&self, key: &str, body: &[u8]) -> Result<(), StoreError>;

    /// Whether an object exists at the key.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// All object keys under the prefix, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// Filesystem-backed object store
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Create a store rooted at `root`, creating the folder if missing.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(Self { root })
    }

    /// Resolve a key to a path under the root, rejecting traversal.
    fn resolve(&self, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey("empty key".to_string()));
        }
        let relative = Path::new(key);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(StoreError::Io(e.to_string())),
        }
    }

    async fn put(&self, key: &str, body: &[u8]) -> Result<(), StoreError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Io(e.to_string()))?;
        }
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.resolve(key)?;
        Ok(tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        // Validate traversal rules on the prefix the same way as on keys
        self.resolve(prefix)?;

        let root = self.root.clone();
        let mut keys = Vec::new();
        for entry in walkdir::WalkDir::new(&root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = match entry.path().strip_prefix(&root) {
                Ok(rel) => rel,
                Err(_) => continue,
            };
            let key = relative.to_string_lossy().replace('\\', "/");
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, FsObjectStore) {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let (_dir, store) = store();
        store
            .put("transcripts/tour-42.json", b"{\"x\":1}")
            .await
            .unwrap();
        let bytes = store.get("transcripts/tour-42.json").await.unwrap();
        assert_eq!(bytes, b"{\"x\":1}");
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (_dir, store) = store();
        match store.get("nope.json").await {
            Err(StoreError::NotFound(key)) => assert_eq!(key, "nope.json"),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let (_dir, store) = store();
        store.put("analysis/a.json", b"first").await.unwrap();
        store.put("analysis/a.json", b"second").await.unwrap();
        assert_eq!(store.get("analysis/a.json").await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_list_by_prefix_sorted() {
        let (_dir, store) = store();
        store.put("out/k/b.out", b"1").await.unwrap();
        store.put("out/k/a.out", b"2").await.unwrap();
        store.put("out/s/c.out", b"3").await.unwrap();

        let keys = store.list("out/k/").await.unwrap();
        assert_eq!(keys, vec!["out/k/a.out", "out/k/b.out"]);
    }

    #[tokio::test]
    async fn test_exists() {
        let (_dir, store) = store();
        assert!(!store.exists("x").await.unwrap());
        store.put("x", b"1").await.unwrap();
        assert!(store.exists("x").await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_parent_traversal() {
        let (_dir, store) = store();
        assert!(matches!(
            store.get("../outside").await,
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(
            store.put("a/../../b", b"x").await,
            Err(StoreError::InvalidKey(_))
        ));
    }
}
