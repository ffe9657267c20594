use std::path::Path;
use std::time::SystemTime;

use anyhow::Result;
use colored::Colorize;
use tracing::warn;

use crate::settings::{ScheduleError, SettingsStore};
use crate::{archive, service, sweep};

pub fn start_service(store: &SettingsStore) -> Result<()> {
    service::start(store)?;
    println!("{} Backup service started", "✓".green());
    Ok(())
}

pub fn stop_service(store: &SettingsStore) -> Result<()> {
    service::stop(store)?;
    println!("{} Backup service stopped", "✓".green());
    Ok(())
}

/// One-shot backup outside the schedule, followed by the same best-effort
/// retention sweep a scheduled run would perform.
#[tokio::main]
pub async fn backup_now(store: &SettingsStore) -> Result<()> {
    let settings = store.snapshot();
    if settings.backup_path.is_empty() || settings.destination.is_empty() {
        return Err(ScheduleError::ConfigurationIncomplete.into());
    }

    let path = archive::run(&settings).await?;
    println!(
        "{} Backup created: {}",
        "✓".green(),
        path.display().to_string().cyan()
    );

    match sweep::sweep(
        Path::new(&settings.destination),
        settings.retention_days,
        SystemTime::now(),
    ) {
        Ok(report) if report.deleted > 0 => {
            println!("Removed {} expired archive(s)", report.deleted);
        }
        Ok(_) => {}
        Err(e) => warn!("sweep failed: {e}"),
    }
    Ok(())
}
