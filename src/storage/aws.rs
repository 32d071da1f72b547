//! AWS S3 object store.
//!
//! Answers existence/size questions with `HeadObject` and mints presigned
//! GET/PUT URLs with the SDK's request signer.  Object bytes never pass
//! through the gateway; clients talk to S3 directly using the signed URLs.
//!
//! Key mapping: `{prefix}{scope}/{oid}`.
//!
//! Credentials are resolved via the standard AWS credential chain
//! (env vars, `~/.aws/credentials`, IAM role, etc.) unless an explicit
//! key pair is configured.

use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, info};

use super::backend::{append_token, ObjectStore, SignedOperation};
use crate::config::AwsStorageConfig;

/// Object store backed by a single S3 bucket.
pub struct AwsObjectStore {
    /// AWS S3 SDK client.
    client: Client,
    /// The backing S3 bucket name.
    bucket: String,
    /// Key prefix for all objects in the bucket.
    prefix: String,
    /// Fixed validity window for presigned URLs.
    url_expiry: Duration,
}

impl AwsObjectStore {
    /// Create a new S3 object store from configuration.
    pub async fn new(config: &AwsStorageConfig, url_expiry: Duration) -> anyhow::Result<Self> {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));

        if !config.endpoint_url.is_empty() {
            config_loader = config_loader.endpoint_url(&config.endpoint_url);
        }

        // If explicit credentials are provided, inject them as static credentials.
        if !config.access_key_id.is_empty() && !config.secret_access_key.is_empty() {
            let creds = aws_sdk_s3::config::Credentials::new(
                &config.access_key_id,
                &config.secret_access_key,
                None, // session_token
                None, // expiry
                "lfs-gateway-config",
            );
            config_loader = config_loader.credentials_provider(creds);
        }

        let sdk_config = config_loader.load().await;

        let s3_config_builder = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.use_path_style);

        let client = Client::from_conf(s3_config_builder.build());

        info!(
            "AWS object store initialized: bucket={} region={} prefix='{}'",
            config.bucket, config.region, config.prefix
        );

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
            prefix: config.prefix.clone(),
            url_expiry,
        })
    }

    /// Map a gateway storage key to the upstream S3 key.
    fn s3_key(&self, storage_key: &str) -> String {
        format!("{}{}", self.prefix, storage_key)
    }

    /// Map an AWS SDK error to an anyhow error with context.
    fn map_sdk_error(context: &str, err: impl std::fmt::Display) -> anyhow::Error {
        anyhow::anyhow!("AWS S3 {context}: {err}")
    }
}

impl ObjectStore for AwsObjectStore {
    fn exists(
        &self,
        storage_key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + '_>> {
        let storage_key = storage_key.to_string();
        Box::pin(async move {
            let s3_key = self.s3_key(&storage_key);

            debug!("AWS head_object: bucket={} key={}", self.bucket, s3_key);

            match self
                .client
                .head_object()
                .bucket(&self.bucket)
                .key(&s3_key)
                .send()
                .await
            {
                Ok(_) => Ok(true),
                Err(e) => {
                    let service_err = e.into_service_error();
                    if service_err.is_not_found() {
                        Ok(false)
                    } else {
                        Err(Self::map_sdk_error("head_object", service_err))
                    }
                }
            }
        })
    }

    fn size(
        &self,
        storage_key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<u64>> + Send + '_>> {
        let storage_key = storage_key.to_string();
        Box::pin(async move {
            let s3_key = self.s3_key(&storage_key);

            debug!("AWS head_object: bucket={} key={}", self.bucket, s3_key);

            let resp = match self
                .client
                .head_object()
                .bucket(&self.bucket)
                .key(&s3_key)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    let service_err = e.into_service_error();
                    // Size is only meaningful for objects that exist; a key
                    // deleted since the existence check reads as zero.
                    if service_err.is_not_found() {
                        return Ok(0);
                    }
                    return Err(Self::map_sdk_error("head_object", service_err));
                }
            };

            let length = resp
                .content_length()
                .ok_or_else(|| anyhow::anyhow!("AWS S3 head_object: no content length"))?;
            u64::try_from(length)
                .map_err(|_| anyhow::anyhow!("AWS S3 head_object: negative content length"))
        })
    }

    fn presign(
        &self,
        storage_key: &str,
        operation: SignedOperation,
        token: Option<&str>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>> {
        let storage_key = storage_key.to_string();
        let token = token.map(|t| t.to_string());
        Box::pin(async move {
            let s3_key = self.s3_key(&storage_key);
            let signing = PresigningConfig::expires_in(self.url_expiry)
                .map_err(|e| Self::map_sdk_error("presign config", e))?;

            debug!(
                "AWS presign {:?}: bucket={} key={}",
                operation, self.bucket, s3_key
            );

            let url = match operation {
                SignedOperation::Get => self
                    .client
                    .get_object()
                    .bucket(&self.bucket)
                    .key(&s3_key)
                    .presigned(signing)
                    .await
                    .map_err(|e| Self::map_sdk_error("presign get_object", e))?
                    .uri()
                    .to_string(),
                SignedOperation::Put => self
                    .client
                    .put_object()
                    .bucket(&self.bucket)
                    .key(&s3_key)
                    .presigned(signing)
                    .await
                    .map_err(|e| Self::map_sdk_error("presign put_object", e))?
                    .uri()
                    .to_string(),
            };

            Ok(append_token(url, token.as_deref()))
        })
    }
}
