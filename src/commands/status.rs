use colored::Colorize;

use crate::settings::{Settings, SettingsStore};

pub fn show_status(store: &SettingsStore) {
    let settings = store.snapshot();
    println!("{}", "=== rbak status ===".blue());
    print_settings(&settings);
    let state = if settings.is_running {
        "Running".green()
    } else {
        "Stopped".red()
    };
    println!("Status: {state}");
}

pub fn print_settings(settings: &Settings) {
    println!("Backup Path: {}", settings.backup_path);
    println!("Destination: {}", settings.destination);
    println!("Schedule: {}", settings.backup_time);
    println!("Retention: {} days", settings.retention_days);
    println!("Compression: {}", settings.compression);
    println!("Exclude Patterns: {:?}", settings.exclude_patterns);
    println!("Time Zone: {}", settings.time_zone);
}
