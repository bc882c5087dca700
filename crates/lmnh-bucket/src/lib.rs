//! Object storage holding the museum's historical kiosk exports.
//!
//! The archive only ever reads: it lists the bucket and downloads the per-site
//! CSVs and exhibition JSON files it recognises.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client;
use bytes::Bytes;
use thiserror::Error;

pub const DEFAULT_REGION: &str = "eu-west-2";

/// Access keys for the archive bucket. When absent, the AWS default chain
/// (environment, profile, instance role) is used.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

#[derive(Debug, Clone)]
pub struct BucketConfig {
    pub bucket: String,
    pub region: String,
    /// S3-compatible endpoint such as MinIO; addressed path-style.
    pub endpoint: Option<String>,
    pub credentials: Option<StaticCredentials>,
}

impl BucketConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            credentials: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum BucketError {
    #[error("no archive bucket name given")]
    MissingBucket,
    #[error("{operation} failed on bucket {bucket}: {message}")]
    Request {
        operation: &'static str,
        bucket: String,
        message: String,
    },
    #[error("archive object {0} does not exist")]
    NotFound(String),
}

/// Read-only view of the archive bucket.
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Every object key, in listing order.
    async fn list_keys(&self) -> Result<Vec<String>, BucketError>;
    async fn get_object(&self, key: &str) -> Result<Bytes, BucketError>;
}

#[derive(Clone)]
pub struct S3BucketStore {
    client: Client,
    bucket: String,
}

impl S3BucketStore {
    pub async fn connect(config: BucketConfig) -> Result<Self, BucketError> {
        if config.bucket.trim().is_empty() {
            return Err(BucketError::MissingBucket);
        }

        let mut shared =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region));
        if let Some(keys) = config.credentials {
            let credentials = Credentials::new(
                keys.access_key_id,
                keys.secret_access_key,
                None,
                None,
                "lmnh-archive",
            );
            shared = shared.credentials_provider(SharedCredentialsProvider::new(credentials));
        }

        let mut s3 = aws_sdk_s3::config::Builder::from(&shared.load().await);
        if let Some(endpoint) = config.endpoint {
            s3 = s3.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(s3.build()),
            bucket: config.bucket,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn request_error(&self, operation: &'static str, err: impl std::error::Error) -> BucketError {
        BucketError::Request {
            operation,
            bucket: self.bucket.clone(),
            message: DisplayErrorContext(err).to_string(),
        }
    }
}

#[async_trait]
impl BucketStore for S3BucketStore {
    async fn list_keys(&self) -> Result<Vec<String>, BucketError> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|err| self.request_error("ListObjectsV2", err))?;
            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );
        }
        Ok(keys)
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, BucketError> {
        let request = self.client.get_object().bucket(&self.bucket).key(key);
        let output = match request.send().await {
            Ok(output) => output,
            Err(err) if err.as_service_error().is_some_and(|e| e.is_no_such_key()) => {
                return Err(BucketError::NotFound(key.to_string()));
            }
            Err(err) => return Err(self.request_error("GetObject", err)),
        };

        let body = output
            .body
            .collect()
            .await
            .map_err(|err| self.request_error("GetObject", err))?;
        Ok(body.into_bytes())
    }
}
