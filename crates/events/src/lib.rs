//! Kafka notifications about repository lifecycle events.

pub mod config;
pub mod emitter;
pub mod error;
pub mod kafka;
pub mod memory;
pub mod schema;
pub mod tls;
pub mod transport;

use std::sync::{Arc, OnceLock};

pub use config::{KafkaConfig, TopicConfig, TopicMode};
pub use emitter::EventEmitter;
pub use error::EventError;
pub use memory::MemoryBroker;
pub use schema::RepositoryCreated;
pub use transport::{BrokerClient, Delivery, Producer, TopicHandle};

static GLOBAL: OnceLock<Arc<EventEmitter>> = OnceLock::new();

/// Install the process-wide emitter. Returns `false` if one was already set.
pub fn install(emitter: Arc<EventEmitter>) -> bool {
    GLOBAL.set(emitter).is_ok()
}

pub fn global() -> Option<Arc<EventEmitter>> {
    GLOBAL.get().cloned()
}

/// Close the process-wide client, if any.
pub fn shutdown() {
    if let Some(emitter) = GLOBAL.get() {
        emitter.shutdown();
    }
}
