use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use chrono::Local;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{info, warn};

use crate::settings::Settings;

/// Upper bound on a single tar invocation. A hung archiver used to stall the
/// scheduler forever; now it is killed and surfaced as [`ArchiveError::TimedOut`].
pub const ARCHIVE_TIMEOUT: Duration = Duration::from_secs(6 * 60 * 60);

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to create destination directory {path}: {source}")]
    DestinationUnavailable { path: PathBuf, source: io::Error },
    #[error("failed to spawn tar: {0}")]
    SpawnFailed(io::Error),
    #[error("tar exited with status {code:?}: {stderr}")]
    ArchiveFailed { code: Option<i32>, stderr: String },
    #[error("tar did not finish within {0:?}")]
    TimedOut(Duration),
    #[error("i/o error while waiting for tar: {0}")]
    Io(io::Error),
}

/// Archive the configured source into the destination directory, returning
/// the path of the new bundle.
pub async fn run(settings: &Settings) -> Result<PathBuf, ArchiveError> {
    run_with_timeout(settings, ARCHIVE_TIMEOUT).await
}

pub async fn run_with_timeout(
    settings: &Settings,
    limit: Duration,
) -> Result<PathBuf, ArchiveError> {
    let destination = Path::new(&settings.destination);
    std::fs::create_dir_all(destination).map_err(|source| {
        ArchiveError::DestinationUnavailable {
            path: destination.to_path_buf(),
            source,
        }
    })?;

    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let name = format!("backup_{stamp}.{}", settings.compression.extension());
    let output_path = destination.join(name);

    let mut cmd = Command::new("tar");
    cmd.arg("-c").arg(settings.compression.tar_flag());
    for pattern in &settings.exclude_patterns {
        cmd.arg("--exclude").arg(pattern);
    }
    cmd.arg("-f")
        .arg(&output_path)
        .arg("-C")
        .arg(&settings.backup_path)
        .arg(".");
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    info!(
        "archiving {} -> {} ({})",
        settings.backup_path,
        output_path.display(),
        settings.compression
    );

    let mut child = cmd.spawn().map_err(ArchiveError::SpawnFailed)?;
    let stderr_pipe = child.stderr.take();

    let wait = async {
        let mut diagnostics = String::new();
        if let Some(mut pipe) = stderr_pipe {
            pipe.read_to_string(&mut diagnostics).await?;
        }
        let status = child.wait().await?;
        Ok::<_, io::Error>((status, diagnostics))
    };

    let outcome = tokio::time::timeout(limit, wait).await;
    match outcome {
        Ok(Ok((status, diagnostics))) => {
            if status.success() {
                info!("archive created: {}", output_path.display());
                Ok(output_path)
            } else {
                Err(ArchiveError::ArchiveFailed {
                    code: status.code(),
                    stderr: diagnostics,
                })
            }
        }
        Ok(Err(e)) => Err(ArchiveError::Io(e)),
        Err(_) => {
            warn!("archive run exceeded {limit:?}, killing tar");
            let _ = child.start_kill();
            let _ = child.wait().await;
            Err(ArchiveError::TimedOut(limit))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Compression;
    use std::fs;
    use tempfile::tempdir;

    fn settings_for(source: &Path, dest: &Path) -> Settings {
        Settings {
            backup_path: source.to_string_lossy().into_owned(),
            destination: dest.to_string_lossy().into_owned(),
            compression: Compression::Gzip,
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn test_run_creates_archive() {
        let source = tempdir().unwrap();
        let dest = tempdir().unwrap();
        fs::write(source.path().join("a.txt"), "hello").unwrap();
        fs::create_dir(source.path().join("sub")).unwrap();
        fs::write(source.path().join("sub/b.txt"), "world").unwrap();

        let settings = settings_for(source.path(), dest.path());
        let out = run(&settings).await.unwrap();

        assert!(out.exists());
        assert!(out.to_string_lossy().ends_with(".tar.gz"));
        assert_eq!(fs::read_dir(dest.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_run_creates_missing_destination() {
        let source = tempdir().unwrap();
        let dest = tempdir().unwrap();
        fs::write(source.path().join("a.txt"), "hello").unwrap();

        let nested = dest.path().join("deep/nested");
        let settings = settings_for(source.path(), &nested);
        let out = run(&settings).await.unwrap();

        assert!(nested.exists());
        assert!(out.starts_with(&nested));
    }

    #[tokio::test]
    async fn test_failure_carries_stderr() {
        let dest = tempdir().unwrap();
        let mut settings = settings_for(Path::new("/nonexistent/source/dir"), dest.path());
        settings.compression = Compression::Gzip;

        let err = run(&settings).await.unwrap_err();
        match err {
            ArchiveError::ArchiveFailed { code, stderr } => {
                assert_ne!(code, Some(0));
                assert!(!stderr.is_empty());
            }
            other => panic!("expected ArchiveFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_archiver() {
        let source = tempdir().unwrap();
        let dest = tempdir().unwrap();
        fs::write(source.path().join("a.txt"), "hello").unwrap();

        let settings = settings_for(source.path(), dest.path());
        let err = run_with_timeout(&settings, Duration::from_millis(0))
            .await
            .unwrap_err();

        assert!(matches!(err, ArchiveError::TimedOut(_)));
    }

    #[tokio::test]
    async fn test_exclude_patterns_respected() {
        let source = tempdir().unwrap();
        let dest = tempdir().unwrap();
        fs::write(source.path().join("keep.txt"), "keep").unwrap();
        fs::write(source.path().join("skip.log"), "skip").unwrap();

        let mut settings = settings_for(source.path(), dest.path());
        settings.exclude_patterns = vec![String::from("*.log")];
        let out = run(&settings).await.unwrap();

        // list the archive and make sure the excluded file is absent
        let listing = std::process::Command::new("tar")
            .arg("-tzf")
            .arg(&out)
            .output()
            .unwrap();
        let names = String::from_utf8_lossy(&listing.stdout).into_owned();
        assert!(names.contains("keep.txt"));
        assert!(!names.contains("skip.log"));
    }
}
