//! Result artifact storage and retention
//!
//! Persisted artifacts live flat in the results directory under two name
//! prefixes: `source_` for uploaded originals and `gradcam_` for rendered
//! overlays. Retention runs on two axes, age and count, and only ever
//! touches files matching those prefixes so the directory can be shared.

use crate::config::DetectionConfig;
use crate::error::{DetectionError, Result};
use image::RgbImage;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Artifact name prefixes owned by the retention sweep
const MANAGED_PREFIXES: [&str; 2] = ["gradcam_", "source_"];

/// Occupancy counters for the results directory
#[derive(Debug, Clone, Serialize)]
pub struct StorageStats {
    pub file_count: usize,
    pub total_bytes: u64,
}

fn is_managed(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| MANAGED_PREFIXES.iter().any(|p| name.starts_with(p)))
}

/// Managed artifacts with their modification times, unsorted
fn managed_files(dir: &Path) -> Result<Vec<(PathBuf, SystemTime)>> {
    let mut files = Vec::new();
    let entries = fs::read_dir(dir).map_err(|e| DetectionError::file_io_error(dir, &e))?;
    for entry in entries {
        let entry = entry.map_err(|e| DetectionError::file_io_error(dir, &e))?;
        let path = entry.path();
        if !path.is_file() || !is_managed(&path) {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .map_err(|e| DetectionError::file_io_error(&path, &e))?;
        files.push((path, modified));
    }
    Ok(files)
}

/// Persist an image as a PNG, creating the parent directory if needed
///
/// # Errors
///
/// `DetectionError::Storage` when the directory cannot be created or the
/// encode/write fails.
pub fn save_png(image: &RgbImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| DetectionError::storage(format!("could not create results directory: {e}")))?;
    }
    image
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| DetectionError::storage(format!("could not write image: {e}")))?;
    debug!(path = %path.display(), "persisted artifact");
    Ok(())
}

/// Delete managed artifacts older than the retention window
///
/// Returns the number of files removed. A missing results directory is
/// treated as empty.
pub fn cleanup_by_age(dir: &Path, retention_hours: u64) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let cutoff = SystemTime::now() - Duration::from_secs(retention_hours * 3600);
    let mut removed = 0;
    for (path, modified) in managed_files(dir)? {
        if modified < cutoff {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "could not remove expired artifact"),
            }
        }
    }
    if removed > 0 {
        debug!(removed, "expired artifacts removed");
    }
    Ok(removed)
}

/// Delete the oldest managed artifacts beyond the file-count cap
///
/// Returns the number of files removed.
pub fn cleanup_by_count(dir: &Path, max_files: usize) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut files = managed_files(dir)?;
    if files.len() <= max_files {
        return Ok(0);
    }
    files.sort_by_key(|(_, modified)| *modified);

    let excess = files.len() - max_files;
    let mut removed = 0;
    for (path, _) in files.into_iter().take(excess) {
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "could not evict artifact"),
        }
    }
    debug!(removed, "artifacts evicted over count cap");
    Ok(removed)
}

/// Count and size of managed artifacts
pub fn storage_stats(dir: &Path) -> Result<StorageStats> {
    if !dir.exists() {
        return Ok(StorageStats {
            file_count: 0,
            total_bytes: 0,
        });
    }
    let mut stats = StorageStats {
        file_count: 0,
        total_bytes: 0,
    };
    for (path, _) in managed_files(dir)? {
        stats.file_count += 1;
        stats.total_bytes += fs::metadata(&path)
            .map_err(|e| DetectionError::file_io_error(&path, &e))?
            .len();
    }
    Ok(stats)
}

/// Spawn a periodic retention sweep over the results directory
///
/// Applies the age window first, then the count cap. Failures are logged
/// and the sweep keeps running.
pub fn spawn_retention_task(
    config: Arc<DetectionConfig>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = cleanup_by_age(&config.results_dir, config.retention_hours) {
                warn!(error = %e, "age-based retention sweep failed");
            }
            if let Err(e) = cleanup_by_count(&config.results_dir, config.max_result_files) {
                warn!(error = %e, "count-based retention sweep failed");
            }
        }
    })
}
