//! Wire types of the secret store HTTP API.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope returned by every secret store endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecretResponse {
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub lease_id: String,
    #[serde(default)]
    pub lease_duration: i64,
    #[serde(default)]
    pub renewable: bool,
    #[serde(default)]
    pub data: Option<HashMap<String, Value>>,
    #[serde(default)]
    pub warnings: Option<Vec<String>>,
    #[serde(default)]
    pub wrap_info: Option<WrapInfo>,
    #[serde(default)]
    pub auth: Option<AuthInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WrapInfo {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub ttl: i64,
    #[serde(default)]
    pub creation_time: String,
    #[serde(default)]
    pub creation_path: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthInfo {
    #[serde(default)]
    pub client_token: String,
    #[serde(default)]
    pub accessor: String,
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(default)]
    pub token_policies: Vec<String>,
    #[serde(default)]
    pub lease_duration: i64,
    #[serde(default)]
    pub renewable: bool,
    #[serde(default)]
    pub entity_id: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub orphan: bool,
    #[serde(default)]
    pub num_uses: i64,
}

/// AppRole credentials carried inside a wrapped secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppRoleCredentials {
    pub role_id: String,
    pub secret_id: String,
}

/// Key/value content of a secret.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecretData(pub HashMap<String, Value>);

impl SecretData {
    /// String value of `key`. Non-string JSON values are rendered as JSON.
    pub fn get(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl SecretResponse {
    fn field(&self, name: &str) -> String {
        self.data
            .as_ref()
            .and_then(|d| d.get(name))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    /// Credentials of an unwrap response, empty strings when absent.
    pub fn app_role(&self) -> AppRoleCredentials {
        AppRoleCredentials {
            role_id: self.field("role_id"),
            secret_id: self.field("secret_id"),
        }
    }

    /// Secret payload: `data` for v1 mounts, `data.data` for v2 mounts.
    pub fn into_secret(self, nested: bool) -> SecretData {
        let data = self.data.unwrap_or_default();
        if !nested {
            return SecretData(data);
        }
        match data.get("data") {
            Some(Value::Object(inner)) => {
                SecretData(inner.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            }
            _ => SecretData::default(),
        }
    }
}
