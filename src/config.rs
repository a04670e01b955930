use std::env;
use std::path::PathBuf;

use crate::error::MediaError;

/// Process-level settings read from the environment (`.env` is honoured by
/// the binary before this runs).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub media_config_path: PathBuf,
    pub bind_addr: String,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_region: String,
    pub s3_endpoint: Option<String>,
    /// Days a soft-deleted record is kept before its files are purged.
    pub retention_days: i64,
    pub cleanup_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, MediaError> {
        let database_url = required("DATABASE_URL")?;
        let media_config_path = env::var("CMS_MEDIA_CONFIG")
            .unwrap_or_else(|_| "config/media.json".to_string())
            .into();

        Ok(Self {
            database_url,
            media_config_path,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            aws_access_key_id: env::var("AWS_ACCESS_KEY_ID").ok(),
            aws_secret_access_key: env::var("AWS_SECRET_ACCESS_KEY").ok(),
            aws_region: env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            retention_days: parsed("CLEANUP_RETENTION_DAYS", 30)?,
            cleanup_interval_secs: parsed("CLEANUP_INTERVAL_SECS", 86400)?,
        })
    }
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T, MediaError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| MediaError::Configuration(format!("{} is not a valid number", key))),
        Err(_) => Ok(default),
    }
}

fn required(key: &str) -> Result<String, MediaError> {
    env::var(key).map_err(|_| MediaError::Configuration(format!("{} must be set", key)))
}
