//! In-process broker used by tests and by deployments without Kafka.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::EventError;
use crate::transport::{BrokerClient, Delivery, Producer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl RecordedMessage {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.payload).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Default)]
struct State {
    messages: Vec<RecordedMessage>,
    opened: usize,
    closed: usize,
    fail_sends: bool,
}

/// Records every produced message. Cloning shares the record.
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<State>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every subsequent send fail.
    pub fn fail_sends(&self, fail: bool) {
        self.state().fail_sends = fail;
    }

    pub fn messages(&self) -> Vec<RecordedMessage> {
        self.state().messages.clone()
    }

    pub fn opened(&self) -> usize {
        self.state().opened
    }

    pub fn closed(&self) -> usize {
        self.state().closed
    }
}

#[async_trait]
impl BrokerClient for MemoryBroker {
    async fn open_producer(&self, topic: &str) -> Result<Box<dyn Producer>, EventError> {
        self.state().opened += 1;
        Ok(Box::new(MemoryProducer {
            broker: self.clone(),
            topic: topic.to_string(),
        }))
    }
}

struct MemoryProducer {
    broker: MemoryBroker,
    topic: String,
}

#[async_trait]
impl Producer for MemoryProducer {
    async fn send(&mut self, payload: Vec<u8>) -> Result<Delivery, EventError> {
        let mut state = self.broker.state();
        if state.fail_sends {
            return Err(EventError::KafkaSendFailed {
                topic: self.topic.clone(),
                reason: "broker unavailable".into(),
            });
        }
        let offset = state.messages.len() as i64;
        state.messages.push(RecordedMessage {
            topic: self.topic.clone(),
            payload,
        });
        Ok(Delivery {
            partition: 0,
            offset,
        })
    }

    async fn close(&mut self) -> Result<(), EventError> {
        self.broker.state().closed += 1;
        Ok(())
    }
}
