//! INI configuration access.
//!
//! The service is configured from a single INI file. [`Settings`] wraps the
//! parsed document and hands out [`Section`] views whose typed getters fall
//! back to documented defaults and report bad values as
//! [`CoreError::ConfigInvalid`] / [`CoreError::ConfigMissing`].

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};

use crate::error::CoreError;

/// A parsed INI configuration document.
#[derive(Debug, Clone)]
pub struct Settings {
    ini: Ini,
}

impl Settings {
    /// Load and parse the INI file at `path`.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let ini = Ini::load_from_file(path).map_err(|e| {
            CoreError::Internal(format!("read configuration {}: {e}", path.display()))
        })?;
        Ok(Self { ini })
    }

    /// Parse an in-memory INI document.
    pub fn parse(content: &str) -> Result<Self, CoreError> {
        let ini = Ini::load_from_str(content)
            .map_err(|e| CoreError::Internal(format!("parse configuration: {e}")))?;
        Ok(Self { ini })
    }

    /// An empty document; every getter returns its default.
    pub fn empty() -> Self {
        Self { ini: Ini::new() }
    }

    /// View of `[name]`. Absent sections behave as empty ones.
    pub fn section<'a>(&'a self, name: &'a str) -> Section<'a> {
        Section {
            name,
            props: self.ini.section(Some(name)),
        }
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.ini.section(Some(name)).is_some()
    }
}

/// Borrowed view of one INI section.
#[derive(Debug, Clone, Copy)]
pub struct Section<'a> {
    name: &'a str,
    props: Option<&'a Properties>,
}

impl<'a> Section<'a> {
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn exists(&self) -> bool {
        self.props.is_some()
    }

    /// Trimmed value of `key`; empty values count as absent.
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.props
            .and_then(|p| p.get(key))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.props.is_some_and(|p| p.contains_key(key))
    }

    pub fn string_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    pub fn required(&self, key: &str) -> Result<String, CoreError> {
        self.get(key)
            .map(str::to_string)
            .ok_or_else(|| CoreError::missing(self.name, key))
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, CoreError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => parse_bool(raw)
                .ok_or_else(|| CoreError::invalid(self.name, key, format!("`{raw}` is not a boolean"))),
        }
    }

    pub fn parse_or<T>(&self, key: &str, default: T) -> Result<T, CoreError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw
                .parse()
                .map_err(|e: T::Err| CoreError::invalid(self.name, key, e.to_string())),
        }
    }

    /// Durations accept `ms`, `s`, `m` and `h` suffixes; a bare number is seconds.
    pub fn duration_or(&self, key: &str, default: Duration) -> Result<Duration, CoreError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => parse_duration(raw)
                .ok_or_else(|| CoreError::invalid(self.name, key, format!("`{raw}` is not a duration"))),
        }
    }

    /// Comma-separated list with blanks removed.
    pub fn list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All `(key, value)` pairs of the section in file order.
    pub fn entries(&self) -> Vec<(&'a str, &'a str)> {
        self.props
            .map(|p| p.iter().map(|(k, v)| (k, v.trim())).collect())
            .unwrap_or_default()
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse `500ms`, `3s`, `2m`, `1h` or a bare number of seconds.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let value: u64 = digits.parse().ok()?;
    match unit.trim() {
        "" | "s" => Some(Duration::from_secs(value)),
        "ms" => Some(Duration::from_millis(value)),
        "m" => value.checked_mul(60).map(Duration::from_secs),
        "h" => value.checked_mul(3600).map(Duration::from_secs),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const SAMPLE: &str = r#"
[kafka]
ENABLED = true
ADDRESS = broker.local
PORT = 9093
RETRY_BACKOFF = 500ms

[kafka.repository]
TOPIC_ENABLED = false

[iam]
WHITE_LIST_ROLES_ADMIN = ROLE_ADMIN, ROLE_ROOT ,
"#;

    #[test]
    fn typed_getters_read_values_and_defaults() {
        let settings = Settings::parse(SAMPLE).unwrap();
        let kafka = settings.section("kafka");
        assert!(kafka.bool_or("ENABLED", false).unwrap());
        assert_eq!(kafka.parse_or::<u16>("PORT", 0).unwrap(), 9093);
        assert_eq!(kafka.parse_or::<u32>("CONNECT_RETRIES", 10).unwrap(), 10);
        assert_eq!(
            kafka.duration_or("RETRY_BACKOFF", Duration::from_secs(3)).unwrap(),
            Duration::from_millis(500)
        );
        assert_eq!(kafka.string_or("ISSUER", "sc"), "sc");
    }

    #[test]
    fn dotted_section_names_are_distinct() {
        let settings = Settings::parse(SAMPLE).unwrap();
        assert!(settings.has_section("kafka.repository"));
        assert!(!settings.section("kafka.repository").bool_or("TOPIC_ENABLED", true).unwrap());
        assert!(!settings.section("kafka").contains("TOPIC_ENABLED"));
    }

    #[test]
    fn list_trims_and_skips_blanks() {
        let settings = Settings::parse(SAMPLE).unwrap();
        assert_eq!(
            settings.section("iam").list("WHITE_LIST_ROLES_ADMIN"),
            vec!["ROLE_ADMIN".to_string(), "ROLE_ROOT".to_string()]
        );
        assert!(settings.section("iam").list("WHITE_LIST_ROLES_USER").is_empty());
    }

    #[test]
    fn required_reports_section_and_key() {
        let settings = Settings::parse(SAMPLE).unwrap();
        let err = settings.section("cron").required("SCHEDULE").unwrap_err();
        assert_matches!(err, CoreError::ConfigMissing { ref section, ref key } if section == "cron" && key == "SCHEDULE");
    }

    #[test]
    fn invalid_bool_is_rejected() {
        let settings = Settings::parse("[x]\nFLAG = maybe\n").unwrap();
        assert_matches!(
            settings.section("x").bool_or("FLAG", false),
            Err(CoreError::ConfigInvalid { .. })
        );
    }

    #[test]
    fn duration_units() {
        assert_eq!(parse_duration("60"), Some(Duration::from_secs(60)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("10 days"), None);
        assert_eq!(parse_duration("s"), None);
    }

    #[test]
    fn oversized_durations_are_invalid() {
        let huge = format!("{}h", u64::MAX / 60);
        assert_eq!(parse_duration(&huge), None);
        assert_eq!(parse_duration(&format!("{}m", u64::MAX)), None);

        let settings = Settings::parse(&format!("[cron]\nCHECK_DELAY_UNLOCKED = {huge}\n")).unwrap();
        assert_matches!(
            settings
                .section("cron")
                .duration_or("CHECK_DELAY_UNLOCKED", Duration::from_secs(60)),
            Err(CoreError::ConfigInvalid { .. })
        );
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.ini");
        std::fs::write(&path, SAMPLE).unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.section("kafka").get("ADDRESS"), Some("broker.local"));
    }
}
