use std::env;
use std::process::{Command, Stdio};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::scheduler::Scheduler;
use crate::settings::{ScheduleError, SettingsStore};

/// Flip the running flag on and launch the daemon process. The scheduler loop
/// runs detached; this invocation returns immediately.
pub fn start(store: &SettingsStore) -> Result<()> {
    let settings = store.snapshot();
    if settings.backup_path.is_empty() || settings.destination.is_empty() {
        return Err(ScheduleError::ConfigurationIncomplete.into());
    }
    store.update(|s| s.is_running = true)?;

    let exe = env::current_exe().context("failed to locate the rbak binary")?;
    Command::new(exe)
        .arg("daemon")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("failed to launch the backup daemon")?;

    info!("backup service started");
    Ok(())
}

/// Clear the running flag. The daemon observes it at its next tick boundary;
/// an in-flight archive run is never interrupted.
pub fn stop(store: &SettingsStore) -> Result<()> {
    store.update(|s| s.is_running = false)?;
    info!("backup service stopped");
    Ok(())
}

/// Daemon entry point, called from the binary after it has detached. Drives
/// the scheduler until the flag clears; a fatal configuration error also
/// clears the flag so `status` reports Stopped instead of a stale Running.
#[tokio::main]
pub async fn daemon_main(store: Arc<SettingsStore>) -> Result<()> {
    let scheduler = Scheduler::new(store.clone());
    match scheduler.run().await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("scheduler halted: {e}");
            if let Err(save_err) = store.update(|s| s.is_running = false) {
                error!("failed to clear running flag: {save_err:#}");
            }
            Err(e.into())
        }
    }
}
