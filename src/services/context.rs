use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::MediaError;
use crate::models::record::EntityType;
use crate::models::settings::{FitMode, KindConfig, MediaConfig};

/// Read access to the media schema.
pub trait ConfigProvider: Send + Sync {
    fn disk(&self, entity: EntityType) -> Option<String>;

    fn kind(&self, entity: EntityType, kind: &str) -> Option<KindConfig>;
}

impl ConfigProvider for MediaConfig {
    fn disk(&self, entity: EntityType) -> Option<String> {
        self.disks.get(&entity).cloned()
    }

    fn kind(&self, entity: EntityType, kind: &str) -> Option<KindConfig> {
        self.files
            .get(&entity)
            .and_then(|files| files.types.get(kind))
            .cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSizeSpec {
    pub key: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: FitMode,
    /// Listed in the table but never generated or stored.
    pub passthrough: bool,
}

pub type SizeTable = BTreeMap<String, MediaSizeSpec>;

#[derive(Debug, Clone)]
pub struct MediaContext {
    pub entity: EntityType,
    pub kind: String,
    pub disk: String,
    pub display: Option<String>,
    pub sizes: SizeTable,
}

impl MediaContext {
    /// Sizes to generate: restricted to `only` when given (unknown keys are
    /// ignored) and without passthrough entries.
    pub fn generated_sizes(&self, only: Option<&BTreeSet<String>>) -> Vec<&MediaSizeSpec> {
        self.sizes
            .values()
            .filter(|spec| only.map_or(true, |keys| keys.contains(&spec.key)))
            .filter(|spec| !spec.passthrough)
            .collect()
    }
}

#[derive(Clone)]
pub struct ContextResolver {
    config: Arc<dyn ConfigProvider>,
}

impl ContextResolver {
    pub fn new(config: Arc<dyn ConfigProvider>) -> Self {
        Self { config }
    }

    pub fn disk_for(&self, entity: EntityType) -> Result<String, MediaError> {
        self.config
            .disk(entity)
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| {
                MediaError::Configuration(format!("no storage disk configured for {}", entity))
            })
    }

    pub fn resolve(&self, entity: EntityType, kind: &str) -> Result<MediaContext, MediaError> {
        let disk = self.disk_for(entity)?;

        let kind_config = self
            .config
            .kind(entity, kind)
            .filter(|k| !k.sizes.is_empty())
            .ok_or_else(|| {
                MediaError::Configuration(format!("no size table configured for {}.{}", entity, kind))
            })?;

        let sizes = kind_config
            .sizes
            .into_iter()
            .map(|(key, size)| {
                let spec = match size {
                    Some(size) => MediaSizeSpec {
                        passthrough: key == "original",
                        key: key.clone(),
                        width: size.w,
                        height: size.h,
                        fit: size.fit,
                    },
                    None => MediaSizeSpec {
                        key: key.clone(),
                        width: None,
                        height: None,
                        fit: FitMode::default(),
                        passthrough: true,
                    },
                };
                (key, spec)
            })
            .collect();

        Ok(MediaContext {
            entity,
            kind: kind.to_string(),
            disk,
            display: kind_config.display,
            sizes,
        })
    }
}
