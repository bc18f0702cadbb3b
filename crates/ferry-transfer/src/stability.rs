//! File stability detection.
//!
//! The wait is a timer, not a blocking sleep, so many checks can run side by
//! side on the same runtime.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::task::JoinSet;
use tracing::debug;

async fn modified_at(path: &Path) -> Option<SystemTime> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    if !metadata.is_file() {
        return None;
    }
    metadata.modified().ok()
}

/// Whether `path` still carries the modification time `baseline` (taken at
/// scan time) and keeps it across `wait`.
///
/// A zero wait is always stable. Any error (including the file vanishing)
/// counts as unstable.
pub async fn is_stable(path: &Path, baseline: SystemTime, wait: Duration) -> bool {
    if wait.is_zero() {
        return true;
    }
    match modified_at(path).await {
        Some(current) if current == baseline => {}
        Some(_) => {
            debug!(path = %path.display(), "file changed since it was scanned");
            return false;
        }
        None => {
            debug!(path = %path.display(), "stability check could not read mtime");
            return false;
        }
    }
    tokio::time::sleep(wait).await;
    let stable = modified_at(path).await.is_some_and(|after| after == baseline);
    if !stable {
        debug!(path = %path.display(), "file changed during stability window");
    }
    stable
}

/// Run [`is_stable`] for every `(path, baseline)` pair concurrently; results
/// keep input order.
pub async fn check_all(files: Vec<(PathBuf, SystemTime)>, wait: Duration) -> Vec<bool> {
    let mut results = vec![false; files.len()];
    if wait.is_zero() {
        results.fill(true);
        return results;
    }

    let mut checks = JoinSet::new();
    for (index, (path, baseline)) in files.into_iter().enumerate() {
        checks.spawn(async move { (index, is_stable(&path, baseline, wait).await) });
    }
    while let Some(joined) = checks.join_next().await {
        // A panicked check leaves its slot `false`.
        if let Ok((index, stable)) = joined {
            results[index] = stable;
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{FileTime, set_file_mtime};
    use std::fs;
    use std::time::Instant;
    use tempfile::TempDir;

    #[tokio::test]
    async fn zero_wait_is_immediately_stable() {
        assert!(
            is_stable(
                Path::new("/definitely/not/here"),
                SystemTime::UNIX_EPOCH,
                Duration::ZERO
            )
            .await
        );
    }

    #[tokio::test]
    async fn missing_file_is_unstable() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        assert!(
            !is_stable(
                &temp.path().join("gone"),
                SystemTime::now(),
                Duration::from_millis(10)
            )
            .await
        );
        Ok(())
    }

    #[tokio::test]
    async fn modified_file_is_unstable() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("growing.dat");
        fs::write(&path, b"part")?;
        set_file_mtime(&path, FileTime::from_unix_time(1_700_000_000, 0))?;
        let baseline = fs::metadata(&path)?.modified()?;

        let touch = path.clone();
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            set_file_mtime(&touch, FileTime::from_unix_time(1_700_000_100, 0))
        });
        let stable = is_stable(&path, baseline, Duration::from_millis(200)).await;
        writer.await??;
        assert!(!stable);
        Ok(())
    }

    #[tokio::test]
    async fn write_after_scan_is_unstable() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("late.dat");
        fs::write(&path, b"first")?;
        set_file_mtime(&path, FileTime::from_unix_time(1_700_000_000, 0))?;
        let scanned_at = fs::metadata(&path)?.modified()?;

        // The writer finishes before the check starts; the file is quiet afterwards.
        set_file_mtime(&path, FileTime::from_unix_time(1_700_000_050, 0))?;
        assert!(!is_stable(&path, scanned_at, Duration::from_millis(50)).await);
        Ok(())
    }

    #[tokio::test]
    async fn checks_run_concurrently() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let mut paths = Vec::new();
        for index in 0..5 {
            let path = temp.path().join(format!("f{index}.txt"));
            fs::write(&path, b"done")?;
            let baseline = fs::metadata(&path)?.modified()?;
            paths.push((path, baseline));
        }
        paths.push((temp.path().join("missing.txt"), SystemTime::now()));

        let started = Instant::now();
        let results = check_all(paths, Duration::from_millis(300)).await;
        assert!(started.elapsed() < Duration::from_millis(1_200));
        assert_eq!(results, vec![true, true, true, true, true, false]);
        Ok(())
    }
}
