//! Liveness listener for container platforms.
//!
//! Answers `GET /`, `/health` and `/healthz` with `{"status":"ok"}`; every
//! other path is a 404.

use std::env;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::HealthConfig;
use crate::{AppError, Result};

/// Router serving the liveness routes.
#[must_use]
pub fn router() -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/healthz", get(health))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// Port to bind: a positive integer in `PORT` wins, otherwise the
/// configured one.
#[must_use]
pub fn resolve_port(configured: u16, env_value: Option<&str>) -> u16 {
    let Some(raw) = env_value.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return configured;
    };
    match raw.parse::<u16>() {
        Ok(port) if port > 0 => port,
        _ => {
            warn!(value = raw, configured, "ignoring invalid PORT value");
            configured
        }
    }
}

/// Bind the configured address and serve until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Config` if the address cannot be bound or the
/// server fails.
pub async fn serve_health(config: &HealthConfig, ct: CancellationToken) -> Result<()> {
    let port = resolve_port(config.port, env::var("PORT").ok().as_deref());
    let bind = format!("{}:{port}", config.host);
    let listener = TcpListener::bind(&bind)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind health listener on {bind}: {err}")))?;
    serve_on(listener, ct).await
}

/// Serve the liveness routes on an already bound listener.
///
/// # Errors
///
/// Returns `AppError::Config` if the server fails.
pub async fn serve_on(listener: TcpListener, ct: CancellationToken) -> Result<()> {
    let addr = listener
        .local_addr()
        .map_err(|err| AppError::Config(format!("health listener has no address: {err}")))?;
    info!(%addr, "health listener ready");

    axum::serve(listener, router())
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Config(format!("health server error: {err}")))?;

    info!("health listener shut down");
    Ok(())
}
