use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use sourcegate_core::config::Settings;
use sourcegate_core::error::CoreError;

pub const SECTION: &str = "kafka";
pub const REPOSITORY_TOPIC_SECTION: &str = "kafka.repository";

/// Which clients a topic handle opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TopicMode {
    #[default]
    Multiple,
    Consume,
    Produce,
}

impl TopicMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TopicMode::Multiple => "multiple",
            TopicMode::Consume => "consume",
            TopicMode::Produce => "produce",
        }
    }

    pub fn produces(self) -> bool {
        matches!(self, TopicMode::Multiple | TopicMode::Produce)
    }
}

impl fmt::Display for TopicMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TopicMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "multiple" => Ok(TopicMode::Multiple),
            "consume" => Ok(TopicMode::Consume),
            "produce" => Ok(TopicMode::Produce),
            other => Err(format!("unknown topic type `{other}`")),
        }
    }
}

/// Settings of one logical topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicConfig {
    pub enabled: bool,
    pub topic: String,
    pub mode: TopicMode,
}

impl TopicConfig {
    /// | Key             | Default    |
    /// |-----------------|------------|
    /// | `TOPIC_ENABLED` | required   |
    /// | `TOPIC`         | required when enabled |
    /// | `TYPE`          | `multiple` |
    pub fn from_settings(settings: &Settings, section_name: &str) -> Result<Self, CoreError> {
        let section = settings.section(section_name);
        if !section.contains("TOPIC_ENABLED") {
            return Err(CoreError::missing(section_name, "TOPIC_ENABLED"));
        }
        let enabled = section.bool_or("TOPIC_ENABLED", false)?;
        let topic = if enabled {
            section.required("TOPIC")?
        } else {
            section.string_or("TOPIC", "")
        };
        let mode = section
            .string_or("TYPE", TopicMode::Multiple.as_str())
            .parse::<TopicMode>()
            .map_err(|reason| CoreError::invalid(section_name, "TYPE", reason))?;
        Ok(Self {
            enabled,
            topic,
            mode,
        })
    }

    /// Events are only published to enabled topics in `produce` mode.
    pub fn publishes(&self) -> bool {
        self.enabled && self.mode == TopicMode::Produce
    }
}

/// Kafka connection settings from `[kafka]` and `[kafka.repository]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaConfig {
    pub enabled: bool,
    pub address: String,
    pub port: u16,
    pub connect_retries: u32,
    pub retry_backoff: Duration,
    /// Mutual TLS with material from the secret store.
    pub auth_enabled: bool,
    /// Producer id written into every message.
    pub issuer: String,
    pub repository_topic: TopicConfig,
}

impl KafkaConfig {
    /// | Key               | Default |
    /// |-------------------|---------|
    /// | `ENABLED`         | `false` |
    /// | `ADDRESS`         | required when enabled |
    /// | `PORT`            | required when enabled |
    /// | `CONNECT_RETRIES` | `10`    |
    /// | `RETRY_BACKOFF`   | `3s`    |
    /// | `AUTH_ENABLED`    | `false` |
    /// | `ISSUER`          | `sc`    |
    ///
    /// When enabled, `[kafka.repository]` must exist.
    pub fn from_settings(settings: &Settings) -> Result<Self, CoreError> {
        let section = settings.section(SECTION);
        let enabled = section.bool_or("ENABLED", false)?;
        if !enabled {
            return Ok(Self::disabled());
        }

        let port: u16 = section.parse_or("PORT", 0)?;
        if port == 0 {
            return Err(CoreError::missing(SECTION, "PORT"));
        }

        Ok(Self {
            enabled,
            address: section.required("ADDRESS")?,
            port,
            connect_retries: section.parse_or("CONNECT_RETRIES", 10u32)?.max(1),
            retry_backoff: section.duration_or("RETRY_BACKOFF", Duration::from_secs(3))?,
            auth_enabled: section.bool_or("AUTH_ENABLED", false)?,
            issuer: section.string_or("ISSUER", "sc"),
            repository_topic: TopicConfig::from_settings(settings, REPOSITORY_TOPIC_SECTION)?,
        })
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            address: String::new(),
            port: 0,
            connect_retries: 10,
            retry_backoff: Duration::from_secs(3),
            auth_enabled: false,
            issuer: "sc".into(),
            repository_topic: TopicConfig {
                enabled: false,
                topic: String::new(),
                mode: TopicMode::Multiple,
            },
        }
    }

    /// Bootstrap server as `address:port`.
    pub fn url(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}
