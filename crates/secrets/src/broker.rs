//! Auto-rotating access to the secret store.
//!
//! A warm-up cycle reads the wrapped secret id from disk, unwraps it, logs
//! in with the resulting AppRole credentials, wraps them again and writes
//! the new wrapped id back. The client token from the login is published
//! for subsequent reads. [`SecretBroker::bootstrap`] runs one cycle before
//! returning; [`SecretBroker::spawn_refresh`] repeats it every period.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use sourcegate_audit::{params, Actor, AuditSink, EventKind, Status};

use crate::client::VaultClient;
use crate::config::{BrokerConfig, KvVersion, SecretRef};
use crate::error::SecretError;
use crate::response::SecretData;
use crate::wrap_file;

const CLIENT_TOKEN_SECRET_NAME: &str = "client authorization token";

/// Currently published client token.
#[derive(Debug, Default)]
struct TokenCell {
    token: String,
    rotated_at: Option<DateTime<Utc>>,
}

pub struct SecretBroker {
    client: VaultClient,
    config: BrokerConfig,
    token: RwLock<TokenCell>,
    audit: AuditSink,
}

impl std::fmt::Debug for SecretBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretBroker").finish_non_exhaustive()
    }
}

impl SecretBroker {
    /// Build the broker and run one warm-up cycle. Any failure is returned.
    pub async fn bootstrap(config: BrokerConfig, audit: AuditSink) -> Result<Arc<Self>, SecretError> {
        if !config.enabled {
            return Err(SecretError::Disabled);
        }
        let broker = Arc::new(Self {
            client: VaultClient::new(&config)?,
            config,
            token: RwLock::new(TokenCell::default()),
            audit,
        });
        broker.refresh().await?;
        tracing::info!(namespace = %broker.config.namespace, "Secret broker ready");
        Ok(broker)
    }

    /// Run one warm-up cycle and publish the new client token.
    pub async fn refresh(&self) -> Result<(), SecretError> {
        let outcome = self.warm_up().await;

        let mut audit_params = params([("secret_name", CLIENT_TOKEN_SECRET_NAME)]);
        if let Err(e) = &outcome {
            audit_params.insert("error".into(), e.to_string());
        }
        self.audit.emit(
            EventKind::SecManApplySecret,
            &Actor::anonymous(),
            Status::from_ok(outcome.is_ok()),
            "-",
            audit_params,
        );

        let client_token = outcome?;
        let mut cell = self.token.write().await;
        cell.token = client_token;
        cell.rotated_at = Some(Utc::now());
        Ok(())
    }

    async fn warm_up(&self) -> Result<String, SecretError> {
        let path = &self.config.wrap_token_path;
        let wrapped_id = wrap_file::read_wrapped_id(path).await?;
        let creds = self.client.unwrap(&wrapped_id).await?;
        let client_token = self.client.login(&creds).await?;
        let rewrapped = self
            .client
            .wrap(&client_token, &creds, &self.config.wrap_ttl)
            .await?;
        wrap_file::write_wrapped_id(path, &rewrapped).await?;
        Ok(client_token)
    }

    /// Repeat the warm-up cycle every period until `cancel` fires.
    ///
    /// A failed cycle is logged and the previous token stays in use.
    pub fn spawn_refresh(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let broker = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(broker.config.period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; bootstrap already covered it.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("Secret broker refresh stopping");
                        break;
                    }
                    _ = interval.tick() => {
                        match broker.refresh().await {
                            Ok(()) => tracing::info!("Secret broker token re-wrapped"),
                            Err(e) => tracing::error!(error = %e, "Secret broker warm-up failed, keeping previous token"),
                        }
                    }
                }
            }
        })
    }

    pub async fn client_token(&self) -> String {
        self.token.read().await.token.clone()
    }

    pub async fn last_rotated(&self) -> Option<DateTime<Utc>> {
        self.token.read().await.rotated_at
    }

    /// Read the secret at `storage_path`/`secret_path`.
    pub async fn get_secret(
        &self,
        storage_path: &str,
        secret_path: &str,
        version: KvVersion,
    ) -> Result<SecretData, SecretError> {
        let token = self.client_token().await;
        self.client
            .read(&token, storage_path, secret_path, version)
            .await
    }

    /// Resolve every key configured in `secret` to its value.
    ///
    /// Emits one read event per consulted key. Missing or empty values fail
    /// the whole lookup after all keys have been reported.
    pub async fn get_secret_keys(
        &self,
        secret: &SecretRef,
    ) -> Result<BTreeMap<String, String>, SecretError> {
        self.get_secret_keys_with_optional(secret, &[]).await
    }

    /// Like [`Self::get_secret_keys`], but the configuration keys listed in
    /// `optional` may be missing or empty; they are then left out of the map.
    pub async fn get_secret_keys_with_optional(
        &self,
        secret: &SecretRef,
        optional: &[&str],
    ) -> Result<BTreeMap<String, String>, SecretError> {
        let data = match self
            .get_secret(&secret.storage_path, &secret.secret_path, secret.version)
            .await
        {
            Ok(data) => data,
            Err(e) => {
                for key in secret.keys.values() {
                    self.audit_read(secret, key, Some(&e.to_string()));
                }
                return Err(e);
            }
        };

        let mut values = BTreeMap::new();
        let mut first_missing = None;
        for (config_key, key) in &secret.keys {
            match data.get(key).filter(|v| !v.is_empty()) {
                Some(value) => {
                    self.audit_read(secret, key, None);
                    values.insert(config_key.clone(), value);
                }
                None => {
                    self.audit_read(secret, key, Some("secret is empty"));
                    if optional.contains(&config_key.as_str()) {
                        tracing::warn!(subsystem = %secret.subsystem, key = %config_key, "Optional secret is empty");
                    } else {
                        first_missing.get_or_insert_with(|| key.clone());
                    }
                }
            }
        }

        match first_missing {
            Some(key) => Err(SecretError::EmptySecret {
                secret: secret.secret_path.clone(),
                key,
            }),
            None => Ok(values),
        }
    }

    fn audit_read(&self, secret: &SecretRef, key: &str, error: Option<&str>) {
        let mut audit_params = params([
            ("secret_name", key.to_string()),
            ("subsystem", secret.subsystem.clone()),
        ]);
        if let Some(error) = error {
            audit_params.insert("error".into(), error.to_string());
        }
        self.audit.emit(
            EventKind::SecManReadSecret,
            &Actor::anonymous(),
            Status::from_ok(error.is_none()),
            "-",
            audit_params,
        );
    }
}
