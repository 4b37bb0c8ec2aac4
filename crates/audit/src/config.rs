use std::path::{Path, PathBuf};

use sourcegate_core::config::Settings;
use sourcegate_core::error::CoreError;

pub const SECTION: &str = "sbt.audit";
pub const DEFAULT_FILE_NAME: &str = "audit";

/// Rotation behaviour of the audit log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Rotate whenever the calendar day (UTC) changes.
    pub daily: bool,
    /// Enables size- and day-based rotation at all.
    pub rotate: bool,
    /// Rotate once the file would exceed this many bytes.
    pub max_size: u64,
    /// Rotated files older than this many days are removed. Zero keeps them.
    pub max_days: u32,
    pub compress: bool,
    /// gzip level 0..=9, or -1 for the library default.
    pub compression_level: i32,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            daily: true,
            rotate: true,
            max_size: 1 << 28,
            max_days: 7,
            compress: true,
            compression_level: -1,
        }
    }
}

/// Audit sink configuration, read from `[sbt.audit]`.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Directory holding the audit files.
    pub dir: PathBuf,
    /// Base name; the active file is `{file_name}.log`.
    pub file_name: String,
    pub rotation: RotationPolicy,
    /// Capacity of the writer queue. Events beyond it are dropped.
    pub queue_capacity: usize,
}

impl AuditConfig {
    /// | Key                 | Default          |
    /// |---------------------|------------------|
    /// | `AUDIT_PATH`        | `app_work_path`  |
    /// | `AUDIT_FILE_NAME`   | `audit`          |
    /// | `ROTATE`            | `true`           |
    /// | `DAILY_ROTATE`      | `true`           |
    /// | `MAX_SIZE_SHIFT`    | `28`             |
    /// | `MAX_DAYS`          | `7`              |
    /// | `COMPRESS`          | `true`           |
    /// | `COMPRESSION_LEVEL` | `-1`             |
    /// | `QUEUE_CAPACITY`    | `4096`           |
    ///
    /// A relative `AUDIT_PATH` is resolved against `app_work_path`.
    pub fn from_settings(settings: &Settings, app_work_path: &Path) -> Result<Self, CoreError> {
        let section = settings.section(SECTION);

        let dir = match section.get("AUDIT_PATH") {
            None => app_work_path.to_path_buf(),
            Some(raw) if Path::new(raw).is_absolute() => PathBuf::from(raw),
            Some(raw) => app_work_path.join(raw),
        };

        let shift: u32 = section.parse_or("MAX_SIZE_SHIFT", 28)?;
        if shift >= 64 {
            return Err(CoreError::invalid(SECTION, "MAX_SIZE_SHIFT", "must be below 64"));
        }

        let compression_level: i32 = section.parse_or("COMPRESSION_LEVEL", -1)?;
        if !(-1..=9).contains(&compression_level) {
            return Err(CoreError::invalid(
                SECTION,
                "COMPRESSION_LEVEL",
                "must be between -1 and 9",
            ));
        }

        Ok(Self {
            dir,
            file_name: section.string_or("AUDIT_FILE_NAME", DEFAULT_FILE_NAME),
            rotation: RotationPolicy {
                daily: section.bool_or("DAILY_ROTATE", true)?,
                rotate: section.bool_or("ROTATE", true)?,
                max_size: 1u64 << shift,
                max_days: section.parse_or("MAX_DAYS", 7)?,
                compress: section.bool_or("COMPRESS", true)?,
                compression_level,
            },
            queue_capacity: section.parse_or("QUEUE_CAPACITY", 4096)?,
        })
    }

    /// Path of the active log file.
    pub fn file_path(&self) -> PathBuf {
        self.dir.join(format!("{}.log", self.file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(ini: &str) -> AuditConfig {
        let settings = Settings::parse(ini).unwrap();
        AuditConfig::from_settings(&settings, Path::new("/srv/sourcegate")).unwrap()
    }

    #[test]
    fn defaults_without_section() {
        let config = load("");
        assert_eq!(config.dir, PathBuf::from("/srv/sourcegate"));
        assert_eq!(config.file_name, "audit");
        assert_eq!(config.rotation, RotationPolicy::default());
        assert_eq!(config.file_path(), PathBuf::from("/srv/sourcegate/audit.log"));
    }

    #[test]
    fn relative_path_joins_work_path() {
        let config = load("[sbt.audit]\nAUDIT_PATH = sbt_audit\n");
        assert_eq!(config.dir, PathBuf::from("/srv/sourcegate/sbt_audit"));
    }

    #[test]
    fn absolute_path_and_file_name() {
        let config = load("[sbt.audit]\nAUDIT_PATH = /tmp/a\nAUDIT_FILE_NAME = audit123\n");
        assert_eq!(config.file_path(), PathBuf::from("/tmp/a/audit123.log"));
    }

    #[test]
    fn size_shift_controls_threshold() {
        let config = load("[sbt.audit]\nMAX_SIZE_SHIFT = 10\nMAX_DAYS = 3\nCOMPRESS = false\n");
        assert_eq!(config.rotation.max_size, 1024);
        assert_eq!(config.rotation.max_days, 3);
        assert!(!config.rotation.compress);
    }

    #[test]
    fn out_of_range_compression_level_is_rejected() {
        let settings = Settings::parse("[sbt.audit]\nCOMPRESSION_LEVEL = 12\n").unwrap();
        assert!(AuditConfig::from_settings(&settings, Path::new("/srv")).is_err());
    }
}
