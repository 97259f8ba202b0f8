//! Startup resumption of requests left in the retry ledger.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{error, info, info_span, warn, Instrument};

use super::request::{Collection, RequestOrchestrator};
use crate::dispatch::WorkspaceDirectory;
use crate::models::{Job, PendingRequest};

/// Failure recorded when a resumed request collects nothing.
pub const EMPTY_RETRY_ERROR: &str = "Retry produced no jobs";

/// Opens a workspace by ID so resumed requests can be dispatched.
pub trait WorkspaceOpener: Send + Sync {
    /// Directory for `workspace_id`, or `None` when it is not reachable.
    fn open_workspace(
        &self,
        workspace_id: &str,
    ) -> Pin<Box<dyn Future<Output = Option<Arc<dyn WorkspaceDirectory>>> + Send + '_>>;
}

/// Counts from one resumption pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResumeSummary {
    /// Entries skipped because they reached the attempt limit.
    pub skipped: usize,
    /// Entries retried and removed from the ledger.
    pub completed: usize,
    /// Entries retried without success.
    pub failed: usize,
}

impl RequestOrchestrator {
    /// Retry every entry of a startup ledger snapshot below the attempt
    /// limit, one at a time.
    ///
    /// Only entries in `pending` are considered, so requests accepted after
    /// the snapshot was taken are never picked up here. Successful retries
    /// are removed from the ledger; an empty collection, an unreachable
    /// workspace or a dispatch error counts as a failed attempt. The
    /// configured pause separates consecutive retries.
    pub async fn resume_pending(
        &self,
        pending: Vec<PendingRequest>,
        opener: &dyn WorkspaceOpener,
    ) -> ResumeSummary {
        let mut summary = ResumeSummary::default();
        if pending.is_empty() {
            return summary;
        }

        let max_attempts = self.ledger.max_attempts();
        info!(count = pending.len(), "resuming pending job requests");

        let mut first = true;
        for entry in pending {
            if entry.is_exhausted(max_attempts) {
                warn!(
                    request_id = %entry.request_id,
                    attempts = entry.attempts,
                    last_error = entry.last_error.as_deref().unwrap_or_default(),
                    "skipping request after too many attempts"
                );
                summary.skipped += 1;
                continue;
            }

            if !first {
                tokio::time::sleep(self.config.resume_pause()).await;
            }
            first = false;

            let span = info_span!(
                "resume_request",
                request_id = %entry.request_id,
                workspace_id = %entry.workspace_id,
                attempt = entry.attempts + 1,
                max_attempts
            );
            let outcome = self.retry(&entry, opener).instrument(span).await;

            let ledger_result = match outcome {
                Ok(()) => {
                    summary.completed += 1;
                    self.ledger.complete_request(&entry.request_id).await
                }
                Err(reason) => {
                    summary.failed += 1;
                    self.ledger.fail_request(&entry.request_id, &reason).await
                }
            };
            if let Err(err) = ledger_result {
                error!(request_id = %entry.request_id, %err, "failed to update retry ledger");
            }
        }

        info!(
            skipped = summary.skipped,
            completed = summary.completed,
            failed = summary.failed,
            "resumption pass finished"
        );
        summary
    }

    async fn retry(&self, entry: &PendingRequest, opener: &dyn WorkspaceOpener) -> Result<(), String> {
        let Some(directory) = opener.open_workspace(&entry.workspace_id).await else {
            warn!("cannot access workspace for retry");
            return Err(format!("workspace {} unavailable", entry.workspace_id));
        };

        info!("retrying request");
        let Collection { jobs, mut issues } = self.collect(&entry.reference).await;
        if jobs.is_empty() {
            if !issues.is_empty() {
                warn!(issues = %issues.join(" | "), "retry produced no jobs");
            }
            return Err(EMPTY_RETRY_ERROR.to_owned());
        }

        let normalized: Vec<Job> = jobs.iter().map(Job::from_raw).collect();
        let report = self
            .router
            .dispatch(normalized, directory.as_ref())
            .await
            .map_err(|err| err.to_string())?;
        issues.extend(report.issues);
        info!(posted = report.posted.len(), issues = issues.len(), "retry finished");
        Ok(())
    }
}
