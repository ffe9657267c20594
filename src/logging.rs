use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const FILTER_ENV: &str = "RBAK_LOG";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Plain console logging for command invocations.
pub fn init_console() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .init();
}

/// Daemon logging: a daily-rolling file under `dir`. The returned guard must
/// stay alive for the process lifetime or buffered lines are dropped.
pub fn init_daemon(dir: &Path) -> Result<WorkerGuard> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    let appender = tracing_appender::rolling::daily(dir, "rbak.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .init();
    Ok(guard)
}
