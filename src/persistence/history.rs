//! Append-only record of job fingerprints that have already been posted.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, info};

use super::run_blocking;
use crate::models::Job;
use crate::{AppError, Result};

/// Durable set of posted-job fingerprints.
///
/// Backed by a newline-delimited file that is read once into memory on
/// first use. A missing file is an empty history; an unreadable one makes
/// [`PostHistory::load`] fail so duplicates are never re-posted silently.
pub struct PostHistory {
    path: PathBuf,
    seen: Mutex<HashSet<String>>,
    loaded: AtomicBool,
}

impl PostHistory {
    /// Create a store over `path`. Nothing is read until first use.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            seen: Mutex::new(HashSet::new()),
            loaded: AtomicBool::new(false),
        }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hydrate the in-memory set from disk. Idempotent; concurrent callers
    /// wait on the same lock and only the first one reads the file.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Persistence` if the file exists but cannot be
    /// read. A later call retries the read.
    pub async fn load(&self) -> Result<()> {
        if self.loaded.load(Ordering::Acquire) {
            return Ok(());
        }
        let mut seen = self.seen.lock().await;
        if self.loaded.load(Ordering::Acquire) {
            return Ok(());
        }

        let path = self.path.clone();
        let entries = run_blocking(move || read_entries(&path)).await?;
        info!(path = %self.path.display(), entries = entries.len(), "post history loaded");
        *seen = entries;
        self.loaded.store(true, Ordering::Release);
        Ok(())
    }

    /// Whether a job with the same fingerprint has been posted before.
    /// Jobs without a fingerprint are never duplicates.
    ///
    /// # Errors
    ///
    /// Propagates [`PostHistory::load`] failures.
    pub async fn is_posted(&self, job: &Job) -> Result<bool> {
        self.load().await?;
        let Some(key) = job.fingerprint() else {
            return Ok(false);
        };
        Ok(self.seen.lock().await.contains(&key))
    }

    /// Record a job as posted. No-op for jobs without a fingerprint or
    /// already present.
    ///
    /// The in-memory insert happens under the lock before the file append,
    /// so a later [`PostHistory::is_posted`] sees the job even while the
    /// append is still in flight.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Persistence` if the append fails. The fingerprint
    /// stays in memory for the rest of the process lifetime.
    pub async fn mark_posted(&self, job: &Job) -> Result<()> {
        self.load().await?;
        let Some(key) = job.fingerprint() else {
            return Ok(());
        };
        {
            let mut seen = self.seen.lock().await;
            if !seen.insert(key.clone()) {
                return Ok(());
            }
        }

        let path = self.path.clone();
        debug!(%key, "appending fingerprint to post history");
        run_blocking(move || append_entry(&path, &key)).await
    }

    /// Number of fingerprints currently known.
    ///
    /// # Errors
    ///
    /// Propagates [`PostHistory::load`] failures.
    pub async fn count(&self) -> Result<usize> {
        self.load().await?;
        Ok(self.seen.lock().await.len())
    }
}

fn read_entries(path: &Path) -> Result<HashSet<String>> {
    if !path.exists() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                AppError::Persistence(format!("failed to create {}: {err}", parent.display()))
            })?;
        }
        return Ok(HashSet::new());
    }

    let raw = fs::read_to_string(path).map_err(|err| {
        AppError::Persistence(format!("post history {} is unreadable: {err}", path.display()))
    })?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect())
}

fn append_entry(path: &Path, key: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| {
            AppError::Persistence(format!("failed to open {}: {err}", path.display()))
        })?;
    writeln!(file, "{key}")
        .map_err(|err| AppError::Persistence(format!("post history append failed: {err}")))
}
