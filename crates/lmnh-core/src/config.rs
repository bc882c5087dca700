//! Runtime configuration read from the environment (and `.env`).

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use lmnh_bucket::{BucketConfig, StaticCredentials, DEFAULT_REGION};

/// Kafka consumer settings, passed through to the client untouched.
#[derive(Debug, Clone, Default)]
pub struct KafkaConfig {
    pub bootstrap_servers: Option<String>,
    pub auto_offset_reset: String,
    pub security_protocol: Option<String>,
    pub sasl_mechanism: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub group_id: String,
    pub topic: String,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub database_url: Option<String>,
    /// Where archive files are downloaded and collated.
    pub data_dir: PathBuf,
    pub aws_region: String,
    pub aws_endpoint: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub kafka: KafkaConfig,
}

impl PipelineConfig {
    /// Environment variables:
    /// - `DATABASE_URL` or `LMNH_DATABASE_URL`
    /// - `DATA_DIR` (default: `./data`)
    /// - `AWS_REGION`, `AWS_ENDPOINT_URL`, `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`
    /// - `BOOTSTRAP_SERVERS`, `AUTO_OFFSET` (default: `latest`), `SECURITY_PROTOCOL`,
    ///   `SASL_MECHANISM`, `KAFKA_USERNAME`, `KAFKA_PASSWORD`, `GROUP` (default: `lmnh-pipeline`),
    ///   `TOPIC` (default: `lmnh`)
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .or_else(|_| env::var("LMNH_DATABASE_URL"))
                .ok(),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            aws_region: env::var("AWS_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string()),
            aws_endpoint: env::var("AWS_ENDPOINT_URL").ok(),
            aws_access_key_id: env::var("AWS_ACCESS_KEY_ID").ok(),
            aws_secret_access_key: env::var("AWS_SECRET_ACCESS_KEY").ok(),
            kafka: KafkaConfig {
                bootstrap_servers: env::var("BOOTSTRAP_SERVERS").ok(),
                auto_offset_reset: env::var("AUTO_OFFSET").unwrap_or_else(|_| "latest".to_string()),
                security_protocol: env::var("SECURITY_PROTOCOL").ok(),
                sasl_mechanism: env::var("SASL_MECHANISM").ok(),
                username: env::var("KAFKA_USERNAME").ok(),
                password: env::var("KAFKA_PASSWORD").ok(),
                group_id: env::var("GROUP").unwrap_or_else(|_| "lmnh-pipeline".to_string()),
                topic: env::var("TOPIC").unwrap_or_else(|_| "lmnh".to_string()),
            },
        }
    }

    pub fn database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL (or LMNH_DATABASE_URL) must be set")
    }

    /// Static keys are used only when both halves are set.
    pub fn bucket_config(&self, bucket: &str) -> BucketConfig {
        let credentials = match (&self.aws_access_key_id, &self.aws_secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => Some(StaticCredentials {
                access_key_id: access_key_id.clone(),
                secret_access_key: secret_access_key.clone(),
            }),
            _ => None,
        };
        BucketConfig {
            bucket: bucket.to_string(),
            region: self.aws_region.clone(),
            endpoint: self.aws_endpoint.clone(),
            credentials,
        }
    }
}
