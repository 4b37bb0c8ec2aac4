use sourcegate_core::error::CoreError;
use sourcegate_secrets::SecretError;

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error(transparent)]
    Config(#[from] CoreError),

    #[error("load kafka credentials: {0}")]
    Secret(#[from] SecretError),

    #[error("kafka TLS configuration: {0}")]
    Tls(String),

    #[error("create Kafka client failed after {attempts} attempts: {reason}")]
    Connect { attempts: u32, reason: String },

    #[error("topic {0} not found or has no partitions")]
    TopicNotFound(String),

    #[error("topic {topic} is not open for producing ({mode})")]
    NotProducing { topic: String, mode: String },

    #[error("send to topic {topic} failed: {reason}")]
    KafkaSendFailed { topic: String, reason: String },

    #[error("serialize event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("kafka client is not initialized")]
    NotInitialized,
}
