use std::path::Path;

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;
use tracing::info;

use crate::commands::status::print_settings;
use crate::settings::{self, Compression, SettingsStore};

#[derive(Debug, Default, Args)]
pub struct SetArgs {
    /// Backup source path
    #[arg(long, value_name = "DIR")]
    pub path: Option<String>,
    /// Backup destination path
    #[arg(long, value_name = "DIR")]
    pub dest: Option<String>,
    /// Daily backup time (HH:MM)
    #[arg(long, value_name = "HH:MM")]
    pub time: Option<String>,
    /// Retention window in days
    #[arg(long, value_name = "DAYS")]
    pub retention: Option<u32>,
    /// Compression algorithm
    #[arg(long, value_enum)]
    pub compression: Option<Compression>,
    /// Glob pattern to exclude from the archive, repeatable
    #[arg(long = "exclude", value_name = "PATTERN")]
    pub exclude: Vec<String>,
    /// IANA time zone, e.g. America/New_York
    #[arg(long, value_name = "ZONE")]
    pub timezone: Option<String>,
}

impl SetArgs {
    fn is_empty(&self) -> bool {
        self.path.is_none()
            && self.dest.is_none()
            && self.time.is_none()
            && self.retention.is_none()
            && self.compression.is_none()
            && self.exclude.is_empty()
            && self.timezone.is_none()
    }
}

/// Apply configuration changes. Every provided option is validated before
/// anything is persisted, so a rejected `set` leaves the store untouched.
pub fn set_config(store: &SettingsStore, args: SetArgs) -> Result<()> {
    if args.is_empty() {
        println!("{} No changes made to configuration", "✗".red());
        return Ok(());
    }

    if let Some(path) = &args.path {
        if !Path::new(path).is_dir() {
            bail!("directory does not exist: {path}");
        }
    }
    if let Some(time) = &args.time {
        settings::parse_schedule(time)?;
    }
    if let Some(zone) = &args.timezone {
        settings::resolve_zone(zone)?;
    }

    let updated = store.update(|s| {
        if let Some(path) = args.path {
            info!("backup path set: {path}");
            s.backup_path = path;
        }
        if let Some(dest) = args.dest {
            info!("destination set: {dest}");
            s.destination = dest;
        }
        if let Some(time) = args.time {
            info!("backup time set: {time}");
            s.backup_time = time;
        }
        if let Some(days) = args.retention {
            info!("retention set: {days} days");
            s.retention_days = days;
        }
        if let Some(compression) = args.compression {
            info!("compression set: {compression}");
            s.compression = compression;
        }
        if !args.exclude.is_empty() {
            info!("exclude patterns set: {:?}", args.exclude);
            s.exclude_patterns = args.exclude;
        }
        if let Some(zone) = args.timezone {
            info!("time zone set: {zone}");
            s.time_zone = zone;
        }
    })?;

    println!("{} Backup configuration updated", "✓".green());
    println!("{}", "=== Current Configuration ===".blue());
    print_settings(&updated);
    Ok(())
}

/// List the zone database, optionally filtered by a case-insensitive substring.
pub fn list_timezones(filter: Option<&str>) {
    let needle = filter.map(str::to_lowercase);
    println!("Available time zones:");
    for tz in chrono_tz::TZ_VARIANTS {
        let name = tz.name();
        if needle
            .as_ref()
            .is_none_or(|n| name.to_lowercase().contains(n))
        {
            println!("  {name}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn store_in(dir: &Path) -> SettingsStore {
        SettingsStore::open(dir.join("config.yaml")).unwrap()
    }

    #[test]
    fn test_set_updates_and_persists() {
        let dir = tempdir().unwrap();
        let source = tempdir().unwrap();
        let store = store_in(dir.path());

        let args = SetArgs {
            path: Some(source.path().to_string_lossy().into_owned()),
            dest: Some(String::from("/srv/backups")),
            time: Some(String::from("02:30")),
            retention: Some(14),
            compression: Some(Compression::Bzip2),
            exclude: vec![String::from("*.tmp")],
            timezone: Some(String::from("Europe/Berlin")),
        };
        set_config(&store, args).unwrap();

        let reopened = store_in(dir.path()).snapshot();
        assert_eq!(reopened.destination, "/srv/backups");
        assert_eq!(reopened.backup_time, "02:30");
        assert_eq!(reopened.retention_days, 14);
        assert_eq!(reopened.compression, Compression::Bzip2);
        assert_eq!(reopened.exclude_patterns, vec!["*.tmp"]);
        assert_eq!(reopened.time_zone, "Europe/Berlin");
    }

    #[test]
    fn test_invalid_timezone_leaves_store_unchanged() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let before = fs::read_to_string(dir.path().join("config.yaml")).unwrap();

        let args = SetArgs {
            timezone: Some(String::from("Atlantis/Lost_City")),
            ..SetArgs::default()
        };
        assert!(set_config(&store, args).is_err());

        let after = fs::read_to_string(dir.path().join("config.yaml")).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_invalid_time_rejected_before_persist() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let before = fs::read_to_string(dir.path().join("config.yaml")).unwrap();

        let args = SetArgs {
            time: Some(String::from("26:10")),
            dest: Some(String::from("/elsewhere")),
            ..SetArgs::default()
        };
        assert!(set_config(&store, args).is_err());

        // the valid --dest must not have been applied either
        let after = fs::read_to_string(dir.path().join("config.yaml")).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_missing_source_directory_rejected() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        let args = SetArgs {
            path: Some(String::from("/no/such/directory")),
            ..SetArgs::default()
        };
        assert!(set_config(&store, args).is_err());
        assert!(store.snapshot().backup_path.is_empty());
    }

    #[test]
    fn test_empty_set_is_a_noop() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let before = store.snapshot();

        set_config(&store, SetArgs::default()).unwrap();
        assert_eq!(store.snapshot(), before);
    }
}
