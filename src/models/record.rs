use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MediaError;
use crate::models::names::VariantNames;

/// Owner table a file record hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Content,
    Category,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Content => "content",
            EntityType::Category => "category",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "content" => Ok(EntityType::Content),
            "category" => Ok(EntityType::Category),
            other => Err(MediaError::UnsupportedModelType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Owner {
    pub entity: EntityType,
    pub id: Uuid,
}

impl Owner {
    pub fn content(id: Uuid) -> Self {
        Self {
            entity: EntityType::Content,
            id,
        }
    }

    pub fn category(id: Uuid) -> Self {
        Self {
            entity: EntityType::Category,
            id,
        }
    }
}

/// A persisted set of variant names for one `(owner, kind, subtype)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRecord {
    pub id: Uuid,
    pub owner: Owner,
    pub kind: String,
    pub subtype: Option<String>,
    pub names: VariantNames,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}
