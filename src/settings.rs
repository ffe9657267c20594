use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::NaiveTime;
use chrono_tz::Tz;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Configuration errors that make the scheduler unable to run at all.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("unknown time zone: {0}")]
    InvalidTimeZone(String),
    #[error("invalid backup time {0:?}, expected HH:MM")]
    InvalidScheduleFormat(String),
    #[error("backup path and destination must be set before starting the service")]
    ConfigurationIncomplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    Gzip,
    Bzip2,
    Xz,
}

impl Compression {
    /// The tar compression selector flag.
    pub fn tar_flag(self) -> &'static str {
        match self {
            Compression::Gzip => "-z",
            Compression::Bzip2 => "-j",
            Compression::Xz => "-J",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Compression::Gzip => "tar.gz",
            Compression::Bzip2 => "tar.bz2",
            Compression::Xz => "tar.xz",
        }
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Compression::Gzip => "gzip",
            Compression::Bzip2 => "bzip2",
            Compression::Xz => "xz",
        };
        write!(f, "{name}")
    }
}

fn default_destination() -> String {
    String::from("/var/backups/rbak")
}

fn default_retention() -> u32 {
    7
}

fn default_compression() -> Compression {
    Compression::Gzip
}

/// The persisted configuration record. Read by the scheduler on every tick,
/// mutated only by the `set`/`start`/`stop` command handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub backup_path: String,
    #[serde(default = "default_destination")]
    pub destination: String,
    #[serde(default)]
    pub backup_time: String,
    #[serde(default)]
    pub time_zone: String,
    #[serde(default = "default_retention")]
    pub retention_days: u32,
    #[serde(default = "default_compression")]
    pub compression: Compression,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(default)]
    pub is_running: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            backup_path: String::new(),
            destination: default_destination(),
            backup_time: String::new(),
            time_zone: String::new(),
            retention_days: default_retention(),
            compression: default_compression(),
            exclude_patterns: Vec::new(),
            is_running: false,
        }
    }
}

/// Parse a daily trigger time in HH:MM form.
pub fn parse_schedule(raw: &str) -> Result<NaiveTime, ScheduleError> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .map_err(|_| ScheduleError::InvalidScheduleFormat(raw.to_string()))
}

/// Resolve an IANA zone identifier against the bundled zone database.
pub fn resolve_zone(raw: &str) -> Result<Tz, ScheduleError> {
    raw.parse::<Tz>()
        .map_err(|_| ScheduleError::InvalidTimeZone(raw.to_string()))
}

/// Best-effort detection of the host's IANA zone.
pub fn host_zone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| String::from("UTC"))
}

/// Durable settings store backed by a YAML file. Every mutation is persisted
/// synchronously; separate process invocations communicate only through the
/// file, so the daemon re-reads it each tick via [`SettingsStore::reload`].
pub struct SettingsStore {
    path: PathBuf,
    inner: Mutex<Settings>,
}

impl SettingsStore {
    /// Load the settings file, creating it with defaults if absent. A file
    /// without a time zone gets the host zone filled in and re-saved.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create config directory {}", parent.display())
            })?;
        }

        let (mut settings, mut dirty) = match fs::read_to_string(&path) {
            Ok(raw) => {
                let parsed: Settings = serde_yaml::from_str(&raw)
                    .with_context(|| format!("failed to parse {}", path.display()))?;
                (parsed, false)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => (Settings::default(), true),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read {}", path.display()));
            }
        };

        if settings.time_zone.is_empty() {
            settings.time_zone = host_zone();
            dirty = true;
        }
        if dirty {
            persist(&path, &settings)?;
        }

        Ok(SettingsStore {
            path,
            inner: Mutex::new(settings),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> Settings {
        self.inner.lock().expect("settings mutex poisoned").clone()
    }

    /// Mutate the settings under the lock and persist the result. Returns the
    /// updated snapshot.
    pub fn update<F>(&self, apply: F) -> Result<Settings>
    where
        F: FnOnce(&mut Settings),
    {
        let mut guard = self.inner.lock().expect("settings mutex poisoned");
        apply(&mut guard);
        persist(&self.path, &guard)?;
        Ok(guard.clone())
    }

    /// Re-read the settings file, replacing the in-memory copy. Lets the
    /// daemon observe `stop` (or reconfiguration) issued from another process.
    pub fn reload(&self) -> Result<Settings> {
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let settings: Settings = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        let mut guard = self.inner.lock().expect("settings mutex poisoned");
        *guard = settings.clone();
        Ok(settings)
    }
}

fn persist(path: &Path, settings: &Settings) -> Result<()> {
    let raw = serde_yaml::to_string(settings).context("failed to serialize settings")?;
    fs::write(path, raw).with_context(|| format!("failed to write {}", path.display()))?;
    info!("settings saved to {}", path.display());
    Ok(())
}

/// `/etc/rbak/config.yaml` for root, the user config dir otherwise.
/// `RBAK_CONFIG` overrides both.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var("RBAK_CONFIG") {
        return PathBuf::from(path);
    }
    if nix::unistd::getuid().is_root() {
        PathBuf::from("/etc/rbak/config.yaml")
    } else {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rbak")
            .join("config.yaml")
    }
}

/// Directory for the daemon's rolling log files and redirected stdio.
pub fn default_log_dir() -> PathBuf {
    if nix::unistd::getuid().is_root() {
        PathBuf::from("/var/log/rbak")
    } else {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rbak")
            .join("logs")
    }
}
