//! Best-effort notifications about business events.
//!
//! Each send opens a fresh [`TopicHandle`], produces one message and closes
//! the handle whatever happened in between. Failures are audited and handed
//! back to the caller; the business operation has already committed.

use std::sync::{Arc, RwLock};

use serde::Serialize;

use sourcegate_audit::{params, Actor, AuditSink, EventKind, Status};
use sourcegate_core::config::Settings;
use sourcegate_core::error::CoreError;
use sourcegate_secrets::{SecretBroker, SecretError, SecretRef};

use crate::config::{KafkaConfig, TopicConfig};
use crate::error::EventError;
use crate::kafka::KafkaBroker;
use crate::schema::RepositoryCreated;
use crate::tls;
use crate::transport::{BrokerClient, Delivery, TopicHandle};

pub struct EventEmitter {
    config: KafkaConfig,
    client: RwLock<Option<Arc<dyn BrokerClient>>>,
    audit: AuditSink,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter").finish_non_exhaustive()
    }
}

impl EventEmitter {
    pub fn new(config: KafkaConfig, client: Arc<dyn BrokerClient>, audit: AuditSink) -> Self {
        Self {
            config,
            client: RwLock::new(Some(client)),
            audit,
        }
    }

    /// Emitter that never publishes.
    pub fn disabled(audit: AuditSink) -> Self {
        Self {
            config: KafkaConfig::disabled(),
            client: RwLock::new(None),
            audit,
        }
    }

    /// Connect the shared Kafka client. With `AUTH_ENABLED` the TLS material
    /// comes from `[sourcecontrol.vault.kafka]` through the broker.
    pub async fn connect(
        config: KafkaConfig,
        settings: &Settings,
        broker: Option<&SecretBroker>,
        audit: AuditSink,
    ) -> Result<Self, EventError> {
        if !config.enabled {
            tracing::info!("Kafka disabled");
            return Ok(Self::disabled(audit));
        }

        let tls = if config.auth_enabled {
            let broker = broker.ok_or(SecretError::Disabled)?;
            let secret = SecretRef::from_settings(settings, tls::SECRET_SUBSYSTEM)?.ok_or_else(|| {
                CoreError::missing("sourcecontrol.vault.kafka", "SECRET_PATH")
            })?;
            Some(tls::load_from_broker(broker, &secret, &audit).await?)
        } else {
            None
        };

        let client = KafkaBroker::connect(&config, tls).await?;
        Ok(Self::new(config, Arc::new(client), audit))
    }

    pub fn config(&self) -> &KafkaConfig {
        &self.config
    }

    fn client(&self) -> Option<Arc<dyn BrokerClient>> {
        match self.client.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Publish a new repository in both schema versions.
    ///
    /// Called by the repository service after its create transaction
    /// commits; that service links this crate and lives outside the
    /// coordination binary. A no-op unless the repository topic is enabled
    /// in `produce` mode.
    pub async fn send_repository_created(
        &self,
        event: &RepositoryCreated,
        actor: &Actor,
        remote_addr: &str,
    ) -> Result<(), EventError> {
        let topic = &self.config.repository_topic;
        if !topic.publishes() {
            tracing::debug!(topic = %topic.topic, mode = %topic.mode, "Repository topic not publishing");
            return Ok(());
        }

        let issuer = &self.config.issuer;
        let v1 = self.publish(topic, &event.to_v1(issuer)).await;
        let v2 = self.publish(topic, &event.to_v2(issuer)).await;
        let outcome = v1.and(v2).map(|_| ());

        let mut audit_params = params([
            ("repository", event.name.clone()),
            ("owner", event.owner_name.clone()),
            ("repository_id", event.repository_id.to_string()),
        ]);
        if let Err(e) = &outcome {
            tracing::error!(
                repository = %event.name,
                owner = %event.owner_name,
                error = %e,
                "Error has occurred while sending event about new repository"
            );
            audit_params.insert("error".into(), e.to_string());
        }
        self.audit.emit(
            EventKind::CreateRepositorySend,
            actor,
            Status::from_ok(outcome.is_ok()),
            remote_addr,
            audit_params,
        );
        outcome
    }

    async fn publish<T: Serialize>(
        &self,
        topic: &TopicConfig,
        message: &T,
    ) -> Result<Delivery, EventError> {
        let client = self.client().ok_or(EventError::NotInitialized)?;
        if !topic.mode.produces() {
            return Err(EventError::NotProducing {
                topic: topic.topic.clone(),
                mode: topic.mode.to_string(),
            });
        }

        let mut handle = TopicHandle::open(client.as_ref(), &topic.topic).await?;
        let sent = async {
            let payload = serde_json::to_vec(message)?;
            handle.send(payload).await
        }
        .await;
        if let Err(e) = handle.close().await {
            tracing::warn!(topic = %handle.topic(), error = %e, "Closing topic handle failed");
        }

        let delivery = sent?;
        tracing::debug!(
            topic = %topic.topic,
            partition = delivery.partition,
            offset = delivery.offset,
            "Event delivered"
        );
        Ok(delivery)
    }

    /// Drop the shared client. Later sends fail with `NotInitialized`.
    pub fn shutdown(&self) {
        let taken = match self.client.write() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if taken.is_some() {
            tracing::info!("Kafka client closed");
        }
    }
}
