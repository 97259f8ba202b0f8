//! Durable ledger of in-flight `post` requests, used to resume work after
//! a restart.
//!
//! The ledger is one JSON array rewritten wholesale on every mutation. A
//! single lock spans each read-modify-write cycle. Writes land in a
//! temporary sibling file that is atomically renamed over the ledger, so
//! a crash mid-write leaves the previous version intact.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::run_blocking;
use crate::models::pending::PendingRequest;
use crate::{AppError, Result};

/// Crash-recoverable table of pending requests.
pub struct RetryLedger {
    path: PathBuf,
    max_attempts: u32,
    lock: Mutex<()>,
}

impl RetryLedger {
    /// Open a ledger at `path`, creating its directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Persistence` if the directory cannot be created.
    pub fn new(path: PathBuf, max_attempts: u32) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                AppError::Persistence(format!("failed to create {}: {err}", parent.display()))
            })?;
        }
        Ok(Self {
            path,
            max_attempts,
            lock: Mutex::new(()),
        })
    }

    /// Attempts after which an entry is no longer resumed.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Record the start of a request. Re-submitting an existing id
    /// overwrites its workspace, user and reference but keeps its attempt
    /// count.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Persistence` if the ledger cannot be written.
    pub async fn start_request(
        &self,
        request_id: &str,
        workspace_id: &str,
        user_id: &str,
        reference: &str,
    ) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read().await?;
        if let Some(entry) = entries.iter_mut().find(|e| e.request_id == request_id) {
            workspace_id.clone_into(&mut entry.workspace_id);
            user_id.clone_into(&mut entry.user_id);
            reference.clone_into(&mut entry.reference);
        } else {
            entries.push(PendingRequest::new(
                request_id.to_owned(),
                workspace_id.to_owned(),
                user_id.to_owned(),
                reference.to_owned(),
            ));
        }
        self.write(entries).await
    }

    /// Remove a request. No-op when it is not present.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Persistence` if the ledger cannot be written.
    pub async fn complete_request(&self, request_id: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read().await?;
        let before = entries.len();
        entries.retain(|e| e.request_id != request_id);
        if entries.len() == before {
            return Ok(());
        }
        debug!(request_id, "cleared pending request");
        self.write(entries).await
    }

    /// Count a failed attempt. An unknown id gets a fresh entry with one
    /// attempt recorded.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Persistence` if the ledger cannot be written.
    pub async fn fail_request(&self, request_id: &str, error: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read().await?;
        if let Some(entry) = entries.iter_mut().find(|e| e.request_id == request_id) {
            entry.record_failure(error);
            warn!(
                request_id,
                attempts = entry.attempts,
                max_attempts = self.max_attempts,
                last_error = entry.last_error.as_deref().unwrap_or_default(),
                "pending request failed"
            );
        } else {
            let mut entry = PendingRequest::new(
                request_id.to_owned(),
                String::new(),
                String::new(),
                String::new(),
            );
            entry.record_failure(error);
            entries.push(entry);
        }
        self.write(entries).await
    }

    /// Every entry currently in the ledger, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Persistence` if the blocking read task fails.
    pub async fn list_pending_requests(&self) -> Result<Vec<PendingRequest>> {
        let _guard = self.lock.lock().await;
        self.read().await
    }

    async fn read(&self) -> Result<Vec<PendingRequest>> {
        let path = self.path.clone();
        run_blocking(move || Ok(read_entries(&path))).await
    }

    async fn write(&self, entries: Vec<PendingRequest>) -> Result<()> {
        let path = self.path.clone();
        run_blocking(move || write_entries(&path, &entries)).await
    }
}

/// Read the ledger. Missing, unreadable or malformed documents are treated
/// as empty.
fn read_entries(path: &Path) -> Vec<PendingRequest> {
    if !path.exists() {
        return Vec::new();
    }
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(path = %path.display(), %err, "could not read retry ledger; treating as empty");
            return Vec::new();
        }
    };
    let items = match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Array(items)) => items,
        Ok(_) => {
            warn!(path = %path.display(), "retry ledger is not a JSON array; treating as empty");
            return Vec::new();
        }
        Err(err) => {
            warn!(path = %path.display(), %err, "retry ledger is corrupt; treating as empty");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<PendingRequest>(item.clone()) {
            Ok(entry) => Some(entry),
            Err(err) => {
                debug!(%err, %item, "skipping malformed retry entry");
                None
            }
        })
        .collect()
}

fn write_entries(path: &Path, entries: &[PendingRequest]) -> Result<()> {
    let json = serde_json::to_string_pretty(entries)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)
        .map_err(|err| AppError::Persistence(format!("failed to stage retry ledger: {err}")))?;
    file.write_all(json.as_bytes())
        .map_err(|err| AppError::Persistence(format!("failed to write retry ledger: {err}")))?;
    file.persist(path)
        .map_err(|err| AppError::Persistence(format!("failed to replace retry ledger: {err}")))?;
    Ok(())
}
