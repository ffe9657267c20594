use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;
use tracing::{error, info, warn};

use crate::archive::{self, ArchiveError};
use crate::settings::{self, Settings, ScheduleError, SettingsStore};
use crate::sweep::{self, SweepError, SweepReport};

pub const POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Seam between the tick loop and its side effects, so scheduling decisions
/// can be tested without spawning tar or touching the filesystem.
pub trait BackupRunner {
    fn archive(
        &self,
        settings: &Settings,
    ) -> impl Future<Output = Result<PathBuf, ArchiveError>>;
    fn sweep(
        &self,
        destination: &Path,
        retention_days: u32,
    ) -> Result<SweepReport, SweepError>;
}

/// Production runner: external tar plus the retention sweep.
pub struct TarRunner;

impl BackupRunner for TarRunner {
    async fn archive(&self, settings: &Settings) -> Result<PathBuf, ArchiveError> {
        archive::run(settings).await
    }

    fn sweep(
        &self,
        destination: &Path,
        retention_days: u32,
    ) -> Result<SweepReport, SweepError> {
        sweep::sweep(destination, retention_days, SystemTime::now())
    }
}

/// The trigger fires iff the current (hour, minute) in the configured zone
/// equals the schedule exactly and no run has happened today yet. The
/// last-run date guard keeps this at-most-once per day under poll jitter: a
/// tick that lands late but still inside the trigger minute fires, a missed
/// minute does not re-fire later that day.
pub fn due(now: DateTime<Tz>, schedule: NaiveTime, last_run: Option<NaiveDate>) -> bool {
    if last_run == Some(now.date_naive()) {
        return false;
    }
    now.hour() == schedule.hour() && now.minute() == schedule.minute()
}

/// Whether the loop keeps polling after an iteration.
enum Flow {
    Continue,
    Stop,
}

/// The control loop. Owns the last-run date; everything else is read fresh
/// from the settings store each tick so stop/reconfigure issued by another
/// process invocation is observed at the next tick boundary.
pub struct Scheduler<R: BackupRunner = TarRunner> {
    store: Arc<SettingsStore>,
    runner: R,
    poll_interval: Duration,
    last_run: Option<NaiveDate>,
}

impl Scheduler<TarRunner> {
    pub fn new(store: Arc<SettingsStore>) -> Self {
        Scheduler::with_runner(store, TarRunner)
    }
}

impl<R: BackupRunner> Scheduler<R> {
    pub fn with_runner(store: Arc<SettingsStore>, runner: R) -> Self {
        Scheduler {
            store,
            runner,
            poll_interval: POLL_INTERVAL,
            last_run: None,
        }
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Run until the persisted running flag clears or a fatal configuration
    /// error surfaces. An in-flight archive run always completes before the
    /// stop flag is checked again.
    pub async fn run(mut self) -> Result<(), ScheduleError> {
        info!("scheduler started, polling every {:?}", self.poll_interval);
        loop {
            match self.poll_once(Utc::now()).await? {
                Flow::Stop => {
                    info!("stop flag observed, scheduler exiting");
                    return Ok(());
                }
                Flow::Continue => tokio::time::sleep(self.poll_interval).await,
            }
        }
    }

    /// One loop iteration: reload, check the stop flag, maybe tick. A failed
    /// reload skips the tick entirely; the previous snapshot only decides
    /// whether the loop keeps running.
    async fn poll_once(&mut self, now_utc: DateTime<Utc>) -> Result<Flow, ScheduleError> {
        match self.store.reload() {
            Ok(settings) => {
                if !settings.is_running {
                    return Ok(Flow::Stop);
                }
                self.tick_at(now_utc, &settings).await?;
            }
            Err(e) => {
                warn!("failed to reload settings, skipping tick: {e:#}");
                if !self.store.snapshot().is_running {
                    return Ok(Flow::Stop);
                }
            }
        }
        Ok(Flow::Continue)
    }

    /// One scheduling decision at the given instant. Fatal configuration
    /// errors propagate; per-run archive and sweep failures are contained
    /// here and only logged.
    pub async fn tick_at(
        &mut self,
        now_utc: DateTime<Utc>,
        settings: &Settings,
    ) -> Result<(), ScheduleError> {
        let zone = settings::resolve_zone(&settings.time_zone)?;
        let schedule = settings::parse_schedule(&settings.backup_time)?;
        let now = now_utc.with_timezone(&zone);

        if !due(now, schedule, self.last_run) {
            return Ok(());
        }
        self.last_run = Some(now.date_naive());

        info!("scheduled backup triggered at {}", now.format("%Y-%m-%d %H:%M %Z"));
        match self.runner.archive(settings).await {
            Ok(path) => {
                info!("backup succeeded: {}", path.display());
                let destination = Path::new(&settings.destination);
                match self.runner.sweep(destination, settings.retention_days) {
                    Ok(report) => {
                        info!("sweep removed {} expired archive(s)", report.deleted);
                        if report.unreadable > 0 {
                            warn!("sweep could not stat {} entries", report.unreadable);
                        }
                    }
                    Err(e) => warn!("sweep failed: {e}"),
                }
            }
            Err(e) => error!("backup failed: {e}"),
        }
        Ok(())
    }
}
