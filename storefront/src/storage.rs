//! File-storage collaborator
//!
//! The repository core only ever *deletes* backing files, and only after the
//! owning transaction has committed. [`LocalFileStorage`] is the on-disk
//! implementation; anything else (object stores, CDNs) implements
//! [`FileStorage`].

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::path::{Component, Path, PathBuf};

use crate::config::StorageConfig;
use crate::error::{Error, Result};

/// Destination of a stored file relative to the storage root
///
/// ```rust
/// use storefront::storage::destination;
///
/// assert_eq!(destination("images/products/", "a.png"), "images/products/a.png");
/// ```
pub fn destination(prefix: &str, filename: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), filename)
}

/// Backend that removes stored files
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Delete every destination; a destination that no longer exists counts
    /// as deleted
    ///
    /// All destinations are attempted even if some fail; the first failure
    /// is returned.
    async fn delete_files(&self, destinations: &[String]) -> Result<()>;
}

/// Files under a local root directory, deleted with bounded concurrency
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
    workers: usize,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>, workers: usize) -> Self {
        Self {
            root: root.into(),
            workers: workers.max(1),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.root.clone(), config.delete_workers)
    }

    /// Root directory destinations are resolved against
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, destination: &str) -> Result<PathBuf> {
        let relative = Path::new(destination);
        let inside_root = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
        if destination.is_empty() || !inside_root {
            return Err(Error::InvalidDestination(destination.to_string()));
        }
        Ok(self.root.join(relative))
    }

    async fn delete_one(&self, destination: String) -> Result<()> {
        let path = self.resolve(&destination)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(%destination, "deleted file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(%destination, "file already absent");
                Ok(())
            }
            Err(source) => Err(Error::Storage {
                destination,
                source,
            }),
        }
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn delete_files(&self, destinations: &[String]) -> Result<()> {
        let results: Vec<Result<()>> = stream::iter(destinations.to_vec())
            .map(|destination| self.delete_one(destination))
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let mut failures = results.into_iter().filter_map(|r| r.err());
        match failures.next() {
            None => Ok(()),
            Some(first) => {
                let remaining = failures.count();
                if remaining > 0 {
                    tracing::warn!(remaining, "additional file deletions failed");
                }
                Err(first)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_with(files: &[&str]) -> (tempfile::TempDir, LocalFileStorage) {
        let dir = tempfile::tempdir().unwrap();
        for file in files {
            let path = dir.path().join(file);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, b"png").unwrap();
        }
        let storage = LocalFileStorage::new(dir.path(), 5);
        (dir, storage)
    }

    #[tokio::test]
    async fn test_deletes_all_destinations() {
        let files = ["images/products/a.png", "images/products/b.png"];
        let (dir, storage) = storage_with(&files);

        let destinations: Vec<String> = files.iter().map(|f| f.to_string()).collect();
        storage.delete_files(&destinations).await.unwrap();

        for file in files {
            assert!(!dir.path().join(file).exists());
        }
    }

    #[tokio::test]
    async fn test_missing_file_counts_as_deleted() {
        let (_dir, storage) = storage_with(&[]);
        let destinations = vec![destination("images/products", "gone.png")];
        storage.delete_files(&destinations).await.unwrap();
        // Idempotent on repeat
        storage.delete_files(&destinations).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_destinations_outside_root() {
        let (_dir, storage) = storage_with(&["images/products/keep.png"]);
        let destinations = vec![
            "../outside.png".to_string(),
            "images/products/keep.png".to_string(),
        ];

        let error = storage.delete_files(&destinations).await.unwrap_err();
        assert!(matches!(error, Error::InvalidDestination(ref d) if d == "../outside.png"));
        // Valid destinations are still attempted
        assert!(!storage.root().join("images/products/keep.png").exists());
    }

    #[tokio::test]
    async fn test_deletes_from_a_spawned_task_through_the_trait() {
        let (dir, storage) = storage_with(&["images/products/a.png"]);
        let storage: std::sync::Arc<dyn FileStorage> = std::sync::Arc::new(storage);
        let destinations = vec![destination("images/products", "a.png")];

        tokio::spawn(async move { storage.delete_files(&destinations).await })
            .await
            .unwrap()
            .unwrap();

        assert!(!dir.path().join("images/products/a.png").exists());
    }

    #[test]
    fn test_absolute_destination_is_invalid() {
        let storage = LocalFileStorage::new("/srv/assets", 1);
        assert!(storage.resolve("/etc/passwd").is_err());
        assert!(storage.resolve("").is_err());
        assert_eq!(
            storage.resolve("images/products/a.png").unwrap(),
            PathBuf::from("/srv/assets/images/products/a.png")
        );
    }

    #[test]
    fn test_zero_workers_is_clamped() {
        let storage = LocalFileStorage::new("/srv/assets", 0);
        assert_eq!(storage.workers, 1);
    }
}
