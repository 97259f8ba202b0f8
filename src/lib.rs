#![forbid(unsafe_code)]

//! `job-caster`: a Slack bot that turns job links and poster images into
//! routed job postings.

pub mod config;
pub mod dispatch;
pub mod errors;
pub mod health;
pub mod intake;
pub mod models;
pub mod orchestrator;
pub mod persistence;
pub mod slack;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
