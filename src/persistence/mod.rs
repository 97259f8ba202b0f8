//! Persistence layer: post history and the retry ledger.
//!
//! Both stores are plain files under the configured data directory. File
//! I/O runs on the blocking pool so the async workers are never stalled.

pub mod history;
pub mod ledger;

pub use history::PostHistory;
pub use ledger::RetryLedger;

use crate::{AppError, Result};

/// Run a synchronous storage closure on the blocking thread pool.
pub(crate) async fn run_blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| AppError::Persistence(format!("storage task panicked: {err}")))?
}
