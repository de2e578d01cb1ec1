//! [`StorageBackend`] implementations.
//!
//! [`MemoryStorage`] keeps everything in a map and is what tests and embedders without a disk use. [`FileStorage`]
//! maps every key to a `<key>.json` file under a root directory, which is how the command line front end keeps its
//! state between runs.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io;
use std::io::ErrorKind;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use tracing::instrument;

use crate::error::Result;
use crate::error::StoreError;
use crate::traits::StorageBackend;

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: String) -> Result<()> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// The directory is created on the first write.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

#[async_trait]
impl StorageBackend for FileStorage {
    #[instrument(level = "trace", skip(self), fields(root = %self.root.display()))]
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    #[instrument(level = "trace", skip(self, value), fields(root = %self.root.display(), size = value.len()))]
    async fn set_item(&self, key: &str, value: String) -> Result<()> {
        let path = self.path_for(key)?;
        let root = self.root.clone();
        let prefix = format!(".{key}-");

        tokio::task::spawn_blocking(move || -> Result<()> {
            std::fs::create_dir_all(&root)?;
            // One temp file per write: concurrent writers never share it, readers see old or new content only.
            let mut tmp = tempfile::Builder::new()
                .prefix(&prefix)
                .suffix(".tmp")
                .tempfile_in(&root)?;
            tmp.write_all(value.as_bytes())?;
            tmp.persist(&path).map_err(|err| err.error)?;
            Ok(())
        })
        .await
        .map_err(io::Error::other)?
    }

    #[instrument(level = "trace", skip(self), fields(root = %self.root.display()))]
    async fn remove_item(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn leftover_temp_files(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .count()
    }

    #[tokio::test]
    async fn memory_roundtrip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get_item("cart").await.unwrap(), None);

        storage.set_item("cart", "[]".into()).await.unwrap();
        assert_eq!(storage.get_item("cart").await.unwrap().as_deref(), Some("[]"));
        assert_eq!(storage.len(), 1);

        storage.remove_item("cart").await.unwrap();
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn file_storage_creates_root_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("state"));

        assert_eq!(storage.get_item("wishlist").await.unwrap(), None);
        storage.set_item("wishlist", "[1]".into()).await.unwrap();
        storage.set_item("wishlist", "[2]".into()).await.unwrap();

        assert_eq!(storage.get_item("wishlist").await.unwrap().as_deref(), Some("[2]"));
        assert!(dir.path().join("state/wishlist.json").exists());
        assert_eq!(leftover_temp_files(&dir.path().join("state")), 0);

        storage.remove_item("wishlist").await.unwrap();
        storage.remove_item("wishlist").await.unwrap();
        assert_eq!(storage.get_item("wishlist").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_storage_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());

        for key in ["../cart", "a/b", "", "cart.json"] {
            assert!(
                matches!(storage.set_item(key, "[]".into()).await, Err(StoreError::InvalidKey(_))),
                "key {key:?} must be rejected"
            );
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writes_to_one_key() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(FileStorage::new(dir.path()));

        let mut writers = tokio::task::JoinSet::new();
        for i in 0..64 {
            let storage = storage.clone();
            writers.spawn(async move { storage.set_item("cart", format!("[{i}]")).await });
        }
        while let Some(outcome) = writers.join_next().await {
            outcome.unwrap().expect("concurrent write failed");
        }

        let stored = storage.get_item("cart").await.unwrap().unwrap();
        let value: Vec<u32> = serde_json::from_str(&stored).expect("stored value is torn");
        assert_eq!(value.len(), 1);
        assert!(value[0] < 64);
        assert_eq!(leftover_temp_files(dir.path()), 0);
    }
}
