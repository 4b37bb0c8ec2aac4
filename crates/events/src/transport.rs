//! Seam between the emitter and the message broker.
//!
//! [`BrokerClient`] opens one producer per logical send; the emitter wraps
//! it in a [`TopicHandle`] which must be closed on every path.

use async_trait::async_trait;

use crate::error::EventError;

/// Where a message landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub partition: i32,
    pub offset: i64,
}

#[async_trait]
pub trait BrokerClient: Send + Sync {
    async fn open_producer(&self, topic: &str) -> Result<Box<dyn Producer>, EventError>;
}

#[async_trait]
pub trait Producer: Send {
    async fn send(&mut self, payload: Vec<u8>) -> Result<Delivery, EventError>;
    async fn close(&mut self) -> Result<(), EventError>;
}

/// An open producer bound to one topic.
pub struct TopicHandle {
    topic: String,
    producer: Option<Box<dyn Producer>>,
}

impl TopicHandle {
    pub async fn open(client: &dyn BrokerClient, topic: &str) -> Result<Self, EventError> {
        let producer = client.open_producer(topic).await?;
        Ok(Self {
            topic: topic.to_string(),
            producer: Some(producer),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub async fn send(&mut self, payload: Vec<u8>) -> Result<Delivery, EventError> {
        match self.producer.as_mut() {
            Some(producer) => producer.send(payload).await,
            None => Err(EventError::KafkaSendFailed {
                topic: self.topic.clone(),
                reason: "handle already closed".into(),
            }),
        }
    }

    /// Release the producer. Closing twice is a no-op.
    pub async fn close(&mut self) -> Result<(), EventError> {
        match self.producer.take() {
            Some(mut producer) => producer.close().await,
            None => Ok(()),
        }
    }
}

impl Drop for TopicHandle {
    fn drop(&mut self) {
        if self.producer.is_some() {
            tracing::warn!(topic = %self.topic, "Topic handle dropped without close");
        }
    }
}
