use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use thiserror::Error;
use tracing::{info, warn};

const SECS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("failed to read destination directory {path}: {source}")]
    ReadDir { path: PathBuf, source: io::Error },
}

/// Outcome of one retention pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Files removed because their mtime fell strictly before the cutoff.
    pub deleted: usize,
    /// Entries whose metadata could not be read; skipped, not deleted.
    pub unreadable: usize,
}

/// Delete archives in `destination` whose modification time is strictly
/// before `now - retention_days`. Only immediate file entries are considered;
/// directories are never touched. Per-file failures are logged and skipped.
pub fn sweep(
    destination: &Path,
    retention_days: u32,
    now: SystemTime,
) -> Result<SweepReport, SweepError> {
    let cutoff = now - Duration::from_secs(u64::from(retention_days) * SECS_PER_DAY);

    let entries = fs::read_dir(destination).map_err(|source| SweepError::ReadDir {
        path: destination.to_path_buf(),
        source,
    })?;

    let mut report = SweepReport::default();
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("unreadable entry in {}: {e}", destination.display());
                report.unreadable += 1;
                continue;
            }
        };
        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                warn!("failed to stat {}: {e}", entry.path().display());
                report.unreadable += 1;
                continue;
            }
        };
        if metadata.is_dir() {
            continue;
        }
        let modified = match metadata.modified() {
            Ok(m) => m,
            Err(e) => {
                warn!("no mtime for {}: {e}", entry.path().display());
                report.unreadable += 1;
                continue;
            }
        };
        if modified < cutoff {
            match fs::remove_file(entry.path()) {
                Ok(()) => {
                    info!("removed expired archive: {}", entry.path().display());
                    report.deleted += 1;
                }
                Err(e) => {
                    warn!("failed to remove {}: {e}", entry.path().display());
                }
            }
        }
    }

    Ok(report)
}
