pub mod archive;
pub mod commands;
pub mod logging;
pub mod scheduler;
pub mod service;
pub mod settings;
pub mod sweep;

// re-export selected public API
pub use archive::{ArchiveError, run as run_archive};
pub use scheduler::{BackupRunner, Scheduler, TarRunner, due};
pub use settings::{Compression, Settings, ScheduleError, SettingsStore};
pub use sweep::{SweepError, SweepReport, sweep};
