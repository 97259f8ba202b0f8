//! Pending request records held by the retry ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound on the stored `last_error` length, in characters.
pub const MAX_ERROR_CHARS: usize = 500;

/// A durable record of an in-progress or failed `post` invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PendingRequest {
    /// Identifier of the originating command invocation.
    pub request_id: String,
    /// Slack workspace (team) the command came from.
    pub workspace_id: String,
    /// Slack user who issued the command.
    pub user_id: String,
    /// Raw reference text as submitted.
    pub reference: String,
    /// When the entry was first recorded.
    pub created_at: DateTime<Utc>,
    /// Failed attempts so far.
    #[serde(default)]
    pub attempts: u32,
    /// Most recent failure description, truncated.
    #[serde(default)]
    pub last_error: Option<String>,
}

impl PendingRequest {
    /// Construct a fresh entry with zero attempts.
    #[must_use]
    pub fn new(
        request_id: String,
        workspace_id: String,
        user_id: String,
        reference: String,
    ) -> Self {
        Self {
            request_id,
            workspace_id,
            user_id,
            reference,
            created_at: Utc::now(),
            attempts: 0,
            last_error: None,
        }
    }

    /// Record one failed attempt.
    pub fn record_failure(&mut self, error: &str) {
        self.attempts = self.attempts.saturating_add(1);
        self.last_error = Some(truncate_error(error));
    }

    /// Whether the entry has used up its retry budget.
    #[must_use]
    pub fn is_exhausted(&self, max_attempts: u32) -> bool {
        self.attempts >= max_attempts
    }
}

/// Truncate an error description to [`MAX_ERROR_CHARS`] characters.
#[must_use]
pub fn truncate_error(error: &str) -> String {
    error.chars().take(MAX_ERROR_CHARS).collect()
}
