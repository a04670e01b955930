use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use crate::config::Config;
use crate::services::storage::{BlobStore, StorageError, StorageResult};

/// Disk backed by an S3 bucket (or an S3-compatible endpoint such as MinIO).
#[derive(Clone)]
pub struct S3Disk {
    client: Client,
    bucket_name: String,
    region: String,
    endpoint: Option<String>,
    public_url: Option<String>,
}

impl S3Disk {
    pub fn new(
        config: &Config,
        bucket_name: String,
        region: Option<String>,
        endpoint: Option<String>,
        public_url: Option<String>,
    ) -> Self {
        let region = region.unwrap_or_else(|| config.aws_region.clone());
        let endpoint = endpoint.or_else(|| config.s3_endpoint.clone());

        let mut s3_config_builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(region.clone()));

        if let (Some(key_id), Some(secret)) =
            (&config.aws_access_key_id, &config.aws_secret_access_key)
        {
            let credentials = aws_sdk_s3::config::Credentials::new(
                key_id.clone(),
                secret.clone(),
                None,
                None,
                "manual_config",
            );
            s3_config_builder = s3_config_builder.credentials_provider(credentials);
        }

        if let Some(endpoint) = &endpoint {
            s3_config_builder = s3_config_builder
                .endpoint_url(endpoint)
                .force_path_style(true);
        }

        Self {
            client: Client::from_conf(s3_config_builder.build()),
            bucket_name,
            region,
            endpoint,
            public_url,
        }
    }
}

#[async_trait]
impl BlobStore for S3Disk {
    async fn put(&self, name: &str, data: Vec<u8>, content_type: &str) -> StorageResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(name)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .acl(aws_sdk_s3::types::ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(key = name, error = ?e, "S3 upload failed");
                StorageError::UploadFailed(format!("{}: {}", name, e))
            })?;

        Ok(())
    }

    async fn exists(&self, name: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket_name)
            .key(name)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(StorageError::BackendError(service_error.to_string()))
                }
            }
        }
    }

    async fn delete(&self, name: &str) -> StorageResult<()> {
        // S3 answers 204 for keys that are already gone
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(name)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(key = name, error = %e, "S3 delete failed");
                StorageError::DeleteFailed(format!("{}: {}", name, e))
            })?;

        Ok(())
    }

    fn url(&self, name: &str) -> String {
        if let Some(base) = &self.public_url {
            format!("{}/{}", base.trim_end_matches('/'), name)
        } else if let Some(endpoint) = &self.endpoint {
            format!("{}/{}/{}", endpoint.trim_end_matches('/'), self.bucket_name, name)
        } else {
            format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket_name, self.region, name
            )
        }
    }
}
