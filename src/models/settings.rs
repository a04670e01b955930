use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::MediaError;
use crate::models::record::EntityType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Letterbox onto a transparent canvas, nothing cropped.
    #[default]
    Contain,
    /// Fill the canvas and center-crop the overflow.
    Cover,
}

/// One entry of a kind's `sizes` table. A `null` entry in the JSON is a
/// passthrough and never reaches this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeConfig {
    pub w: Option<u32>,
    pub h: Option<u32>,
    #[serde(default)]
    pub fit: FitMode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KindConfig {
    /// Size key exposed as the primary URL of the kind.
    pub display: Option<String>,
    #[serde(default)]
    pub sizes: BTreeMap<String, Option<SizeConfig>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityFiles {
    #[serde(default)]
    pub types: BTreeMap<String, KindConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Webp,
    Avif,
    Png,
    Jpeg,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Webp => "webp",
            OutputFormat::Avif => "avif",
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Webp => "image/webp",
            OutputFormat::Avif => "image/avif",
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }
}

fn default_quality() -> u8 {
    90
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default = "default_quality")]
    pub quality: u8,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            quality: default_quality(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "driver", rename_all = "lowercase")]
pub enum DiskConfig {
    Local {
        root: PathBuf,
        #[serde(default)]
        url: Option<String>,
    },
    S3 {
        bucket: String,
        #[serde(default)]
        region: Option<String>,
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        url: Option<String>,
    },
}

/// Media schema: which disk each entity type writes to, the size tables per
/// kind, the output encoding and the disk definitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaConfig {
    #[serde(default)]
    pub disks: BTreeMap<EntityType, String>,
    #[serde(default)]
    pub files: BTreeMap<EntityType, EntityFiles>,
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(default)]
    pub storage: BTreeMap<String, DiskConfig>,
}

impl MediaConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, MediaError> {
        serde_json::from_str(raw)
            .map_err(|e| MediaError::Configuration(format!("invalid media config: {}", e)))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MediaError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            MediaError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&raw)
    }
}
