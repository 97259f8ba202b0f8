//! Request lifecycle orchestration.
//!
//! Covers the interactive `post` and `preview` flows and the startup
//! resumption of requests left in the retry ledger.

pub mod request;
pub mod resume;

pub use request::{Collection, PostOutcome, PreviewEntry, PreviewReport, RequestOrchestrator};
pub use resume::{ResumeSummary, WorkspaceOpener};
