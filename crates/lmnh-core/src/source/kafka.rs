use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::Message;
use tracing::info;

use crate::config::KafkaConfig;

use super::{SourceError, StreamSource};

/// Kafka consumer subscribed to a single topic.
pub struct KafkaSource {
    consumer: BaseConsumer,
}

impl KafkaSource {
    pub fn subscribe(config: &KafkaConfig) -> Result<Self, SourceError> {
        let servers = config
            .bootstrap_servers
            .as_deref()
            .ok_or_else(|| SourceError::Transport("BOOTSTRAP_SERVERS is not set".into()))?;

        let mut client = ClientConfig::new();
        client
            .set("bootstrap.servers", servers)
            .set("group.id", &config.group_id)
            .set("auto.offset.reset", &config.auto_offset_reset);
        if let Some(protocol) = &config.security_protocol {
            client.set("security.protocol", protocol);
        }
        if let Some(mechanism) = &config.sasl_mechanism {
            client.set("sasl.mechanisms", mechanism);
        }
        if let Some(username) = &config.username {
            client.set("sasl.username", username);
        }
        if let Some(password) = &config.password {
            client.set("sasl.password", password);
        }

        let consumer: BaseConsumer = client
            .create()
            .map_err(|err| SourceError::Transport(err.to_string()))?;
        consumer
            .subscribe(&[config.topic.as_str()])
            .map_err(|err| SourceError::Transport(err.to_string()))?;
        info!(topic = %config.topic, "Subscribed to topic");

        Ok(Self { consumer })
    }
}

#[async_trait]
impl StreamSource for KafkaSource {
    async fn poll(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, SourceError> {
        // librdkafka polling blocks the calling thread.
        let consumer = &self.consumer;
        tokio::task::block_in_place(|| match consumer.poll(timeout) {
            None => Ok(None),
            Some(Ok(message)) => Ok(message.payload().map(<[u8]>::to_vec)),
            Some(Err(err)) => Err(SourceError::Transport(err.to_string())),
        })
    }
}
