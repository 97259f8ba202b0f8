//! Domain models: jobs, teams, and pending requests.

pub mod job;
pub mod pending;
pub mod team;

pub use job::{Job, RawJob};
pub use pending::PendingRequest;
pub use team::Team;
