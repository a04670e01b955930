#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use image::{ImageFormat, Rgba, RgbaImage};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tempfile::TempDir;

use cms_media::models::settings::MediaConfig;
use cms_media::services::cleanup::CleanupService;
use cms_media::services::context::ContextResolver;
use cms_media::services::local::LocalDisk;
use cms_media::services::media::{ExistingRecordPolicy, MediaService};
use cms_media::services::storage::{BlobStore, DiskRegistry, StorageError, StorageResult};

pub const CONFIG: &str = r#"{
    "disks": {"content": "public", "category": "public"},
    "output": {"format": "png"},
    "files": {
        "content": {"types": {
            "avatar": {"display": "large", "sizes": {
                "original": null,
                "large": {"w": 192, "h": 108, "fit": "contain"},
                "thumb": {"w": 16, "h": 16, "fit": "cover"}
            }},
            "hero": {"display": "large", "sizes": {
                "large": {"w": 64, "h": 32, "fit": "cover"},
                "small": {"w": 24, "h": 24, "fit": "contain"},
                "tiny": {"w": 8}
            }},
            "banner": {"sizes": {
                "wide": {"w": 32, "h": 16, "fit": "cover"},
                "square": {"w": 16, "h": 16},
                "broken": {"fit": "cover"}
            }}
        }},
        "category": {"types": {
            "icon": {"display": "small", "sizes": {"small": {"w": 8, "h": 8}}}
        }}
    }
}"#;

pub struct Harness {
    pub db: DatabaseConnection,
    pub media: MediaService,
    pub cleanup: CleanupService,
    pub disk: Arc<LocalDisk>,
    pub dir: TempDir,
}

impl Harness {
    pub async fn stored_files(&self) -> Vec<String> {
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(self.disk.root()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            files.push(entry.file_name().to_string_lossy().into_owned());
        }
        files.sort();
        files
    }

    pub async fn file_exists(&self, name: &str) -> bool {
        self.disk.exists(name).await.unwrap()
    }
}

pub async fn connect() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
}

pub async fn harness() -> Harness {
    harness_with(ExistingRecordPolicy::Keep).await
}

pub async fn harness_with(policy: ExistingRecordPolicy) -> Harness {
    let dir = TempDir::new().unwrap();
    let disk = Arc::new(LocalDisk::new(dir.path().join("public"), "/storage").await.unwrap());
    harness_on(disk.clone(), disk, dir, policy).await
}

/// Same as [`harness`] but uploads go through `store` while `disk` is the
/// directory the test inspects.
pub async fn harness_on(
    store: Arc<dyn BlobStore>,
    disk: Arc<LocalDisk>,
    dir: TempDir,
    policy: ExistingRecordPolicy,
) -> Harness {
    let db = connect().await;
    let config = Arc::new(MediaConfig::from_json_str(CONFIG).unwrap());
    let disks = DiskRegistry::new().with_disk("public", store);

    let media = MediaService::new(db.clone(), config.clone(), disks.clone(), config.output)
        .with_existing_policy(policy);
    let cleanup = CleanupService::new(media.records().clone(), ContextResolver::new(config), disks);

    Harness {
        db,
        media,
        cleanup,
        disk,
        dir,
    }
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 7 % 255) as u8, (y * 13 % 255) as u8, 128, 255])
    });
    let mut buffer = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}

pub fn dimensions(path: &Path) -> (u32, u32) {
    image::image_dimensions(path).unwrap()
}

/// Local disk that refuses writes after `allowed` successful puts.
pub struct FlakyDisk {
    pub inner: Arc<LocalDisk>,
    pub allowed: usize,
    pub puts: std::sync::atomic::AtomicUsize,
}

#[async_trait]
impl BlobStore for FlakyDisk {
    async fn put(&self, name: &str, data: Vec<u8>, content_type: &str) -> StorageResult<()> {
        let n = self.puts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if n >= self.allowed {
            return Err(StorageError::UploadFailed(format!("refusing {}", name)));
        }
        self.inner.put(name, data, content_type).await
    }

    async fn exists(&self, name: &str) -> StorageResult<bool> {
        self.inner.exists(name).await
    }

    async fn delete(&self, name: &str) -> StorageResult<()> {
        self.inner.delete(name).await
    }

    fn url(&self, name: &str) -> String {
        self.inner.url(name)
    }
}
