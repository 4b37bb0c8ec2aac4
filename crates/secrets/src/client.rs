//! HTTP client for the secret store.
//!
//! Every call goes through [`VaultClient::execute`], which retries on
//! transport errors and HTTP 500 with exponential back-off and gives up
//! with [`SecretError::SecretStorageUnavailable`].

use reqwest::{Client, RequestBuilder, Response, StatusCode};

use crate::config::{BrokerConfig, KvVersion, RetryPolicy};
use crate::error::SecretError;
use crate::response::{AppRoleCredentials, SecretData, SecretResponse};

pub const TOKEN_HEADER: &str = "X-Vault-Token";
pub const WRAP_TTL_HEADER: &str = "X-Vault-Wrap-TTL";

#[derive(Debug, Clone)]
pub struct VaultClient {
    http: Client,
    base_url: String,
    namespace: String,
    retry: RetryPolicy,
}

impl VaultClient {
    pub fn new(config: &BrokerConfig) -> Result<Self, SecretError> {
        let mut builder = Client::builder().timeout(config.request_timeout);

        if let Some(path) = &config.ca_cert_path {
            let pem = std::fs::read(path)
                .map_err(|e| SecretError::Client(format!("read CA bundle {}: {e}", path.display())))?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| SecretError::Client(format!("parse CA bundle: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }

        let http = builder
            .build()
            .map_err(|e| SecretError::Client(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            namespace: config.namespace.clone(),
            retry: config.retry.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}/{}", self.base_url, self.namespace, path)
    }

    /// Exchange a wrapped secret id for the AppRole credentials it holds.
    pub async fn unwrap(&self, wrapped_id: &str) -> Result<AppRoleCredentials, SecretError> {
        let url = self.url("sys/wrapping/unwrap");
        let response = self
            .execute("unwrap", || self.http.post(&url).header(TOKEN_HEADER, wrapped_id))
            .await?;
        let creds = decode(response, "unwrap").await?.app_role();
        if creds.role_id.is_empty() || creds.secret_id.is_empty() {
            return Err(SecretError::CannotGetWrappedSecret);
        }
        Ok(creds)
    }

    /// AppRole login; returns the client token.
    pub async fn login(&self, creds: &AppRoleCredentials) -> Result<String, SecretError> {
        let url = self.url("auth/approle/login");
        let response = self
            .execute("login", || self.http.post(&url).json(creds))
            .await?;
        let token = decode(response, "login")
            .await?
            .auth
            .map(|auth| auth.client_token)
            .unwrap_or_default();
        if token.is_empty() {
            return Err(SecretError::EmptyClientToken);
        }
        Ok(token)
    }

    /// Wrap `creds` again under `ttl`; returns the new wrapped secret id.
    pub async fn wrap(
        &self,
        client_token: &str,
        creds: &AppRoleCredentials,
        ttl: &str,
    ) -> Result<String, SecretError> {
        let url = self.url("sys/wrapping/wrap");
        let response = self
            .execute("wrap", || {
                self.http
                    .post(&url)
                    .header(TOKEN_HEADER, client_token)
                    .header(WRAP_TTL_HEADER, ttl)
                    .json(creds)
            })
            .await?;
        let wrapped = decode(response, "wrap")
            .await?
            .wrap_info
            .map(|info| info.token)
            .unwrap_or_default();
        if wrapped.is_empty() {
            return Err(SecretError::EmptyWrappedToken);
        }
        Ok(wrapped)
    }

    /// Read a secret from a v1 (`{storage}/{secret}`) or v2
    /// (`{storage}/data/{secret}`) key/value mount.
    pub async fn read(
        &self,
        client_token: &str,
        storage_path: &str,
        secret_path: &str,
        version: KvVersion,
    ) -> Result<SecretData, SecretError> {
        let storage = storage_path.trim_matches('/');
        let secret = secret_path.trim_matches('/');
        let url = match version {
            KvVersion::V1 => self.url(&format!("{storage}/{secret}")),
            KvVersion::V2 => self.url(&format!("{storage}/data/{secret}")),
        };
        let response = self
            .execute("read", || self.http.get(&url).header(TOKEN_HEADER, client_token))
            .await?;
        Ok(decode(response, "read")
            .await?
            .into_secret(version == KvVersion::V2))
    }

    async fn execute<F>(&self, operation: &'static str, build: F) -> Result<Response, SecretError>
    where
        F: Fn() -> RequestBuilder,
    {
        let attempts = self.retry.max_attempts.max(1);
        let mut reason = String::new();

        for attempt in 1..=attempts {
            match build().send().await {
                Ok(response) if response.status() == StatusCode::INTERNAL_SERVER_ERROR => {
                    reason = format!("{operation} returned 500");
                }
                Ok(response) => return Ok(response),
                Err(e) => {
                    reason = format!("{operation} request failed: {e}");
                }
            }

            tracing::warn!(operation, attempt, attempts, %reason, "Secret storage call failed");
            if attempt < attempts {
                tokio::time::sleep(self.retry.delay(attempt)).await;
            }
        }

        Err(SecretError::SecretStorageUnavailable { attempts, reason })
    }
}

async fn decode(response: Response, operation: &'static str) -> Result<SecretResponse, SecretError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SecretError::Upstream {
            operation,
            status: status.as_u16(),
            body,
        });
    }
    response
        .json::<SecretResponse>()
        .await
        .map_err(|e| SecretError::Decode {
            operation,
            reason: e.to_string(),
        })
}
