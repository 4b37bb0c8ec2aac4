use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use sourcegate_core::config::Settings;
use sourcegate_core::error::CoreError;

pub const SECTION: &str = "sourcecontrol.wrap.vault";
pub const SECRET_SECTION_PREFIX: &str = "sourcecontrol.vault.";

/// Retry behaviour for every call to the secret store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each failure.
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Back-off to wait after the `attempt`-th failure (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Secret broker configuration, read from `[sourcecontrol.wrap.vault]`.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub enabled: bool,
    /// Base URL of the secret store, without the `/v1` suffix.
    pub url: String,
    /// Tenant namespace inserted after `/v1/`.
    pub namespace: String,
    /// JSON file holding the current wrapped secret id.
    pub wrap_token_path: PathBuf,
    /// Interval between warm-up cycles.
    pub period: Duration,
    /// Value of `X-Vault-Wrap-TTL` for newly wrapped secrets.
    pub wrap_ttl: String,
    /// Extra CA bundle (PEM) trusted for the secret store.
    pub ca_cert_path: Option<PathBuf>,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl BrokerConfig {
    /// | Key                        | Default   |
    /// |----------------------------|-----------|
    /// | `VAULT_ENABLED`            | `false`   |
    /// | `URL_SEC_MAN`              | required  |
    /// | `NAME_TENANT_SEC_MAN_WRAP` | required  |
    /// | `WRAP_TOKEN_PATH`          | required  |
    /// | `PERIOD_WRAPPING_TOKEN`    | `1800` s  |
    /// | `TTL_WRAP_TOKEN`           | `3600s`   |
    /// | `CA_CERT_PATH`             | none      |
    /// | `REQUEST_TIMEOUT`          | `10s`     |
    /// | `RETRY_BACKOFF`            | `200ms`   |
    ///
    /// `PERIOD_TIME` is accepted as an alias of `PERIOD_WRAPPING_TOKEN`.
    pub fn from_settings(settings: &Settings) -> Result<Self, CoreError> {
        let section = settings.section(SECTION);
        let enabled = section.bool_or("VAULT_ENABLED", false)?;

        let period_key = if section.contains("PERIOD_WRAPPING_TOKEN") {
            "PERIOD_WRAPPING_TOKEN"
        } else {
            "PERIOD_TIME"
        };

        let mut config = Self {
            enabled,
            url: section.string_or("URL_SEC_MAN", ""),
            namespace: section.string_or("NAME_TENANT_SEC_MAN_WRAP", ""),
            wrap_token_path: PathBuf::from(section.string_or("WRAP_TOKEN_PATH", "")),
            period: section.duration_or(period_key, Duration::from_secs(1800))?,
            wrap_ttl: section.string_or("TTL_WRAP_TOKEN", "3600s"),
            ca_cert_path: section.get("CA_CERT_PATH").map(PathBuf::from),
            request_timeout: section.duration_or("REQUEST_TIMEOUT", Duration::from_secs(10))?,
            retry: RetryPolicy {
                base_delay: section.duration_or("RETRY_BACKOFF", Duration::from_millis(200))?,
                ..RetryPolicy::default()
            },
        };

        if enabled {
            config.url = section.required("URL_SEC_MAN")?.trim_end_matches('/').to_string();
            config.namespace = section.required("NAME_TENANT_SEC_MAN_WRAP")?;
            config.wrap_token_path = PathBuf::from(section.required("WRAP_TOKEN_PATH")?);
            if config.period.is_zero() {
                return Err(CoreError::invalid(SECTION, period_key, "must be positive"));
            }
        }

        Ok(config)
    }
}

/// Key/value engine version of a secret mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KvVersion {
    #[default]
    V1,
    V2,
}

impl KvVersion {
    /// `2` selects v2; anything else (including absent) is v1.
    pub fn from_number(value: i64) -> Self {
        if value == 2 {
            KvVersion::V2
        } else {
            KvVersion::V1
        }
    }
}

/// Where a consumer's secret lives and which keys it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRef {
    /// Consumer name, e.g. `kafka` or `db`.
    pub subsystem: String,
    pub storage_path: String,
    pub secret_path: String,
    pub version: KvVersion,
    /// Configuration key (e.g. `PASSWORD`) to the key name inside the secret.
    pub keys: BTreeMap<String, String>,
}

const RESERVED_KEYS: [&str; 4] = ["STORAGE_PATH", "SECRET_PATH", "VERSION_KV", "VERSION_KEY"];

impl SecretRef {
    /// Read `[sourcecontrol.vault.<subsystem>]`. `None` when the section is absent.
    pub fn from_settings(settings: &Settings, subsystem: &str) -> Result<Option<Self>, CoreError> {
        let name = format!("{SECRET_SECTION_PREFIX}{subsystem}");
        let section = settings.section(&name);
        if !section.exists() {
            return Ok(None);
        }

        let version_key = if section.contains("VERSION_KV") {
            "VERSION_KV"
        } else {
            "VERSION_KEY"
        };
        let version = KvVersion::from_number(section.parse_or(version_key, 1i64)?);

        let keys = section
            .entries()
            .into_iter()
            .filter(|(key, value)| !RESERVED_KEYS.contains(key) && !value.is_empty())
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        Ok(Some(Self {
            subsystem: subsystem.to_string(),
            storage_path: section.required("STORAGE_PATH")?,
            secret_path: section.required("SECRET_PATH")?,
            version,
            keys,
        }))
    }

    /// Secret key name configured under `config_key`.
    pub fn key(&self, config_key: &str) -> Option<&str> {
        self.keys.get(config_key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn disabled_broker_needs_nothing() {
        let config = BrokerConfig::from_settings(&Settings::empty()).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.period, Duration::from_secs(1800));
        assert_eq!(config.retry.max_attempts, 5);
    }

    #[test]
    fn enabled_broker_requires_url() {
        let settings = Settings::parse("[sourcecontrol.wrap.vault]\nVAULT_ENABLED = true\n").unwrap();
        assert_matches!(
            BrokerConfig::from_settings(&settings),
            Err(CoreError::ConfigMissing { ref key, .. }) if key == "URL_SEC_MAN"
        );
    }

    #[test]
    fn enabled_broker_reads_all_keys() {
        let settings = Settings::parse(
            "[sourcecontrol.wrap.vault]\n\
             VAULT_ENABLED = true\n\
             URL_SEC_MAN = https://vault.local/\n\
             NAME_TENANT_SEC_MAN_WRAP = tenant\n\
             WRAP_TOKEN_PATH = /run/wrap.json\n\
             PERIOD_TIME = 1\n\
             TTL_WRAP_TOKEN = 5s\n",
        )
        .unwrap();
        let config = BrokerConfig::from_settings(&settings).unwrap();
        assert_eq!(config.url, "https://vault.local");
        assert_eq!(config.namespace, "tenant");
        assert_eq!(config.period, Duration::from_secs(1));
        assert_eq!(config.wrap_ttl, "5s");
    }

    #[test]
    fn retry_delay_doubles_up_to_cap() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(350));
    }

    #[test]
    fn secret_ref_collects_key_names() {
        let settings = Settings::parse(
            "[sourcecontrol.vault.kafka]\n\
             STORAGE_PATH = kv\n\
             SECRET_PATH = kafka/tls\n\
             VERSION_KEY = 2\n\
             CERTIFICATE = tls_cert\n\
             PRIVATE_KEY = tls_key\n\
             CA_ROOT_CERTIFICATE =\n",
        )
        .unwrap();
        let secret = SecretRef::from_settings(&settings, "kafka").unwrap().unwrap();
        assert_eq!(secret.version, KvVersion::V2);
        assert_eq!(secret.key("CERTIFICATE"), Some("tls_cert"));
        assert_eq!(secret.key("PRIVATE_KEY"), Some("tls_key"));
        assert_eq!(secret.key("CA_ROOT_CERTIFICATE"), None);
        assert_eq!(secret.key("STORAGE_PATH"), None);
    }

    #[test]
    fn absent_secret_section_is_none() {
        assert!(SecretRef::from_settings(&Settings::empty(), "db").unwrap().is_none());
    }
}
