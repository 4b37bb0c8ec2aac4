//! Kafka transport over `rskafka`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rskafka::client::partition::{Compression, PartitionClient, UnknownTopicHandling};
use rskafka::client::{Client, ClientBuilder};
use rskafka::record::Record;

use crate::config::KafkaConfig;
use crate::error::EventError;
use crate::transport::{BrokerClient, Delivery, Producer};

pub struct KafkaBroker {
    client: Client,
}

impl KafkaBroker {
    /// Connect to the bootstrap server, retrying `connect_retries` times
    /// with `retry_backoff` between attempts.
    pub async fn connect(
        config: &KafkaConfig,
        tls: Option<Arc<rustls::ClientConfig>>,
    ) -> Result<Self, EventError> {
        let url = config.url();
        let attempts = config.connect_retries.max(1);
        let mut reason = String::new();

        for attempt in 1..=attempts {
            let mut builder = ClientBuilder::new(vec![url.clone()]);
            if let Some(tls) = &tls {
                builder = builder.tls_config(Arc::clone(tls));
            }
            match builder.build().await {
                Ok(client) => {
                    tracing::info!(%url, attempt, "Kafka client connected");
                    return Ok(Self { client });
                }
                Err(e) => {
                    reason = e.to_string();
                    tracing::warn!(%url, attempt, attempts, error = %reason, "Kafka connect failed");
                }
            }
            if attempt < attempts {
                tokio::time::sleep(config.retry_backoff).await;
            }
        }

        Err(EventError::Connect { attempts, reason })
    }

    async fn partition_count(&self, topic: &str) -> Result<usize, EventError> {
        let topics = self
            .client
            .list_topics()
            .await
            .map_err(|e| EventError::KafkaSendFailed {
                topic: topic.to_string(),
                reason: e.to_string(),
            })?;
        topics
            .into_iter()
            .find(|t| t.name == topic)
            .map(|t| t.partitions.len())
            .filter(|count| *count > 0)
            .ok_or_else(|| EventError::TopicNotFound(topic.to_string()))
    }
}

#[async_trait]
impl BrokerClient for KafkaBroker {
    async fn open_producer(&self, topic: &str) -> Result<Box<dyn Producer>, EventError> {
        let count = self.partition_count(topic).await?;
        let partition = rand::random_range(0..count) as i32;
        let client = self
            .client
            .partition_client(topic.to_string(), partition, UnknownTopicHandling::Retry)
            .await
            .map_err(|e| EventError::KafkaSendFailed {
                topic: topic.to_string(),
                reason: e.to_string(),
            })?;
        tracing::debug!(topic, partition, "Kafka producer opened");
        Ok(Box::new(KafkaProducer {
            topic: topic.to_string(),
            partition,
            client,
        }))
    }
}

struct KafkaProducer {
    topic: String,
    partition: i32,
    client: PartitionClient,
}

#[async_trait]
impl Producer for KafkaProducer {
    async fn send(&mut self, payload: Vec<u8>) -> Result<Delivery, EventError> {
        let record = Record {
            key: None,
            value: Some(payload),
            headers: BTreeMap::new(),
            timestamp: Utc::now(),
        };
        let offsets = self
            .client
            .produce(vec![record], Compression::NoCompression)
            .await
            .map_err(|e| EventError::KafkaSendFailed {
                topic: self.topic.clone(),
                reason: e.to_string(),
            })?;
        Ok(Delivery {
            partition: self.partition,
            offset: offsets.first().copied().unwrap_or_default(),
        })
    }

    async fn close(&mut self) -> Result<(), EventError> {
        tracing::debug!(topic = %self.topic, partition = self.partition, "Kafka producer closed");
        Ok(())
    }
}
