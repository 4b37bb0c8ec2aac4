//! Append-only log file with day and size based rotation.
//!
//! The active file is `{name}.log`. Rotation renames it to
//! `{name}.log.{YYYY-MM-DD}.{NNN}` (the date the file was opened on) and,
//! when compression is on, replaces that with a gzipped `.gz` copy.
//!
//! [`RotatingFile`] is an [`io::Write`] target. Each `write` call is treated
//! as one record and is never split across two files.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, NaiveDate, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::config::RotationPolicy;

pub struct RotatingFile {
    retention: Retention,
    policy: RotationPolicy,
    file: File,
    size: u64,
    opened_on: NaiveDate,
}

impl RotatingFile {
    /// Open (or create) `{dir}/{name}.log` for appending.
    pub fn open(dir: &Path, name: &str, policy: RotationPolicy) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let retention = Retention {
            dir: dir.to_path_buf(),
            base: format!("{name}.log"),
            max_days: policy.max_days,
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(retention.active_path())?;
        let meta = file.metadata()?;
        let opened_on = meta
            .modified()
            .map(|t| DateTime::<Utc>::from(t).date_naive())
            .unwrap_or_else(|_| Utc::now().date_naive());

        Ok(Self {
            retention,
            policy,
            file,
            size: meta.len(),
            opened_on,
        })
    }

    pub fn path(&self) -> PathBuf {
        self.retention.active_path()
    }

    /// Retention rules for the files this writer rotates out.
    pub fn retention(&self) -> Retention {
        self.retention.clone()
    }

    fn should_rotate(&self, incoming: u64, today: NaiveDate) -> bool {
        if !self.policy.rotate || self.size == 0 {
            return false;
        }
        (self.policy.daily && today != self.opened_on)
            || self.size + incoming > self.policy.max_size
    }

    /// Close the active file under a dated name and start a fresh one.
    pub fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        let active = self.path();
        let rotated = self.next_rotated_name();
        fs::rename(&active, &rotated)?;

        self.file = OpenOptions::new().create(true).append(true).open(&active)?;
        self.size = 0;
        self.opened_on = Utc::now().date_naive();

        if self.policy.compress {
            if let Err(e) = compress(&rotated, self.policy.compression_level) {
                tracing::error!(file = %rotated.display(), error = %e, "Failed to compress rotated audit file");
            }
        }
        if let Err(e) = self.retention.purge_expired() {
            tracing::error!(error = %e, "Failed to purge expired audit files");
        }
        Ok(())
    }

    fn next_rotated_name(&self) -> PathBuf {
        let date = self.opened_on.format("%Y-%m-%d");
        let base = &self.retention.base;
        let mut index = 1u32;
        loop {
            let plain = self.retention.dir.join(format!("{base}.{date}.{index:03}"));
            let packed = plain.with_file_name(format!("{base}.{date}.{index:03}.gz"));
            if !plain.exists() && !packed.exists() {
                return plain;
            }
            index += 1;
        }
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let len = buf.len() as u64;
        if self.should_rotate(len, Utc::now().date_naive()) {
            self.rotate()?;
        }
        self.file.write_all(buf)?;
        self.size += len;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.sync_data()
    }
}

/// Which rotated files exist for an audit log and how long they are kept.
#[derive(Debug, Clone)]
pub struct Retention {
    dir: PathBuf,
    base: String,
    max_days: u32,
}

impl Retention {
    fn active_path(&self) -> PathBuf {
        self.dir.join(&self.base)
    }

    /// Remove rotated files whose modification time is past `max_days`.
    /// Returns how many files were removed.
    pub fn purge_expired(&self) -> io::Result<usize> {
        if self.max_days == 0 {
            return Ok(0);
        }
        let max_age = Duration::from_secs(u64::from(self.max_days) * 24 * 3600);
        let prefix = format!("{}.", self.base);
        let now = SystemTime::now();
        let mut removed = 0;

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with(&prefix) {
                continue;
            }
            // The writer thread and the cleanup task may race on the same file.
            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            if now.duration_since(modified).unwrap_or_default() > max_age {
                match fs::remove_file(entry.path()) {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(removed)
    }
}

fn compress(path: &Path, level: i32) -> io::Result<()> {
    let compression = if level < 0 {
        Compression::default()
    } else {
        Compression::new(level as u32)
    };
    let mut target = path.as_os_str().to_owned();
    target.push(".gz");

    let mut source = File::open(path)?;
    let mut encoder = GzEncoder::new(File::create(&target)?, compression);
    io::copy(&mut source, &mut encoder)?;
    encoder.finish()?.sync_all()?;
    fs::remove_file(path)
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;

    use super::*;

    fn line(writer: &mut RotatingFile, text: &str) {
        writer.write_all(format!("{text}\n").as_bytes()).unwrap();
    }

    fn policy(max_size: u64, compress: bool) -> RotationPolicy {
        RotationPolicy {
            daily: true,
            rotate: true,
            max_size,
            max_days: 7,
            compress,
            compression_level: -1,
        }
    }

    fn rotated_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .filter(|n| n != "audit.log")
            .collect();
        names.sort();
        names
    }

    #[test]
    fn appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RotatingFile::open(dir.path(), "audit", policy(1 << 20, false)).unwrap();
        line(&mut writer, "one");
        line(&mut writer, "two");
        writer.flush().unwrap();

        let content = fs::read_to_string(dir.path().join("audit.log")).unwrap();
        assert_eq!(content, "one\ntwo\n");
    }

    #[test]
    fn rotates_when_size_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RotatingFile::open(dir.path(), "audit", policy(8, false)).unwrap();
        line(&mut writer, "aaaaaa");
        line(&mut writer, "bbbbbb");
        writer.flush().unwrap();

        let active = fs::read_to_string(dir.path().join("audit.log")).unwrap();
        assert_eq!(active, "bbbbbb\n");

        let rotated = rotated_files(dir.path());
        assert_eq!(rotated.len(), 1);
        assert!(rotated[0].starts_with("audit.log."));
        assert!(rotated[0].ends_with(".001"));
    }

    #[test]
    fn rotated_file_is_gzipped_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RotatingFile::open(dir.path(), "audit", policy(8, true)).unwrap();
        line(&mut writer, "first-line");
        line(&mut writer, "second");

        let rotated = rotated_files(dir.path());
        assert_eq!(rotated.len(), 1);
        assert!(rotated[0].ends_with(".gz"));

        let mut decoded = String::new();
        GzDecoder::new(File::open(dir.path().join(&rotated[0])).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "first-line\n");
    }

    #[test]
    fn rotation_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut no_rotate = policy(4, false);
        no_rotate.rotate = false;
        let mut writer = RotatingFile::open(dir.path(), "audit", no_rotate).unwrap();
        line(&mut writer, "long enough line");
        line(&mut writer, "another long line");
        assert!(rotated_files(dir.path()).is_empty());
    }

    #[test]
    fn day_change_triggers_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RotatingFile::open(dir.path(), "audit", policy(1 << 20, false)).unwrap();
        line(&mut writer, "x");
        let tomorrow = writer.opened_on.succ_opt().unwrap();
        assert!(writer.should_rotate(1, tomorrow));
        assert!(!writer.should_rotate(1, writer.opened_on));
    }

    #[test]
    fn successive_rotations_get_distinct_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RotatingFile::open(dir.path(), "audit", policy(1 << 20, false)).unwrap();
        line(&mut writer, "a");
        writer.rotate().unwrap();
        line(&mut writer, "b");
        writer.rotate().unwrap();

        let rotated = rotated_files(dir.path());
        assert_eq!(rotated.len(), 2);
        assert!(rotated[0].ends_with(".001"));
        assert!(rotated[1].ends_with(".002"));
    }

    #[test]
    fn purge_keeps_recent_files() {
        let dir = tempfile::tempdir().unwrap();
        let writer = RotatingFile::open(dir.path(), "audit", policy(1 << 20, false)).unwrap();
        fs::write(dir.path().join("audit.log.2020-01-01.001"), "old").unwrap();
        fs::write(dir.path().join("unrelated.txt"), "keep").unwrap();

        // Freshly written files are within retention regardless of their name.
        assert_eq!(writer.retention().purge_expired().unwrap(), 0);
        assert!(dir.path().join("unrelated.txt").exists());
    }
}
