//! Storage disks.
//!
//! A disk is anything implementing [`BlobStore`]. Disks are registered under
//! the identifiers the media config refers to (`disks.<entity>`), and looked
//! up once per upload through the [`DiskRegistry`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::config::Config;
use crate::error::MediaError;
use crate::models::settings::{DiskConfig, MediaConfig};
use crate::services::local::LocalDisk;
use crate::services::s3::S3Disk;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("upload failed: {0}")]
    UploadFailed(String),

    #[error("delete failed: {0}")]
    DeleteFailed(String),

    #[error("invalid file name: {0}")]
    InvalidKey(String),

    #[error("storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, name: &str, data: Vec<u8>, content_type: &str) -> StorageResult<()>;

    async fn exists(&self, name: &str) -> StorageResult<bool>;

    /// Deleting a name that does not exist succeeds.
    async fn delete(&self, name: &str) -> StorageResult<()>;

    fn url(&self, name: &str) -> String;
}

/// Best-effort delete: failures are logged and skipped. Returns how many
/// deletes succeeded (already-missing files count as deleted).
pub async fn delete_all<S: AsRef<str>>(store: &dyn BlobStore, names: &[S]) -> usize {
    let mut deleted = 0;
    for name in names {
        let name = name.as_ref();
        if name.is_empty() {
            continue;
        }
        match store.delete(name).await {
            Ok(()) => deleted += 1,
            Err(e) => tracing::warn!(file = name, error = %e, "could not delete stored file"),
        }
    }
    deleted
}

#[derive(Clone, Default)]
pub struct DiskRegistry {
    disks: HashMap<String, Arc<dyn BlobStore>>,
}

impl DiskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_disk(mut self, id: impl Into<String>, disk: Arc<dyn BlobStore>) -> Self {
        self.insert(id, disk);
        self
    }

    pub fn insert(&mut self, id: impl Into<String>, disk: Arc<dyn BlobStore>) {
        self.disks.insert(id.into(), disk);
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn BlobStore>, MediaError> {
        self.disks
            .get(id)
            .cloned()
            .ok_or_else(|| MediaError::Configuration(format!("storage disk '{}' is not defined", id)))
    }

    /// Builds every disk listed under `storage` in the media config.
    pub async fn from_config(media: &MediaConfig, config: &Config) -> Result<Self, MediaError> {
        let mut registry = Self::new();

        for (id, disk) in &media.storage {
            let store: Arc<dyn BlobStore> = match disk {
                DiskConfig::Local { root, url } => Arc::new(
                    LocalDisk::new(root.clone(), url.clone().unwrap_or_default()).await?,
                ),
                DiskConfig::S3 {
                    bucket,
                    region,
                    endpoint,
                    url,
                } => Arc::new(S3Disk::new(
                    config,
                    bucket.clone(),
                    region.clone(),
                    endpoint.clone(),
                    url.clone(),
                )),
            };
            tracing::info!(disk = %id, "registered storage disk");
            registry.insert(id.clone(), store);
        }

        Ok(registry)
    }
}
