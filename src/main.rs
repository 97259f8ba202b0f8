#![forbid(unsafe_code)]

//! `job-caster`: Slack job routing bot binary.
//!
//! Bootstraps configuration and credentials, loads the post history,
//! starts the liveness listener and the Slack Socket Mode integration, then
//! resumes any requests left in the retry ledger by a previous run.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, Instrument};
use tracing_subscriber::{fmt, EnvFilter};

use job_caster::config::GlobalConfig;
use job_caster::dispatch::DispatchRouter;
use job_caster::health;
use job_caster::intake::{Fetcher, HttpFetcher, JobExtractor, OpenAiExtractor};
use job_caster::models::PendingRequest;
use job_caster::orchestrator::{RequestOrchestrator, WorkspaceOpener};
use job_caster::persistence::{PostHistory, RetryLedger};
use job_caster::slack::client::{BotState, SlackService};
use job_caster::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "job-caster", about = "Slack job routing bot", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the directory holding the post history and retry ledger.
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("job-caster bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    config.load_credentials().await?;
    let config = Arc::new(config);
    info!(data_dir = %config.data_dir.display(), "configuration loaded");

    // ── Storage ─────────────────────────────────────────
    let history = Arc::new(PostHistory::new(config.history_path()));
    history.load().await.map_err(|err| {
        error!(%err, "refusing to start without a readable post history");
        err
    })?;
    let ledger = Arc::new(RetryLedger::new(config.ledger_path(), config.max_attempts)?);

    // ── Request lifecycle engine ────────────────────────
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(
        config.request_timeout(),
        config.max_scrape_bytes,
        config.max_image_bytes,
    )?);
    let extractor: Arc<dyn JobExtractor> = Arc::new(OpenAiExtractor::new(&config.openai)?);
    let router = Arc::new(DispatchRouter::new(Arc::clone(&config), Arc::clone(&history)));
    let orchestrator = Arc::new(RequestOrchestrator::new(
        Arc::clone(&config),
        fetcher,
        extractor,
        router,
        ledger,
    ));

    let ct = CancellationToken::new();

    // ── Liveness listener ───────────────────────────────
    let health_ct = ct.clone();
    let health_config = config.health.clone();
    let health_handle = tokio::spawn(async move {
        if let Err(err) = health::serve_health(&health_config, health_ct).await {
            error!(%err, "health listener failed");
        }
    });

    // ── Ledger snapshot, taken before commands arrive ──
    let pending = orchestrator.pending_requests().await.unwrap_or_else(|err| {
        error!(%err, "could not read retry ledger, nothing will be resumed");
        Vec::new()
    });

    // ── Slack ───────────────────────────────────────────
    let state = Arc::new(BotState::new(Arc::clone(&config), Arc::clone(&orchestrator)));
    let (slack, socket_task) = SlackService::start(state).await.map_err(|err| {
        error!(%err, "slack service start failed");
        err
    })?;
    let slack = Arc::new(slack);

    // ── Resume interrupted requests once connected ──────
    let resume_ct = ct.clone();
    let resume_slack = Arc::clone(&slack);
    let resume_handle = tokio::spawn(async move {
        tokio::select! {
            () = resume_ct.cancelled() => return,
            () = resume_slack.wait_until_ready() => {}
        }
        resume_pending(&orchestrator, pending, &resume_slack)
            .instrument(info_span!("startup_resume"))
            .await;
    });

    info!("job-caster ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();
    socket_task.abort();
    resume_handle.abort();

    let _ = tokio::join!(health_handle, resume_handle);
    info!("job-caster shut down");

    Ok(())
}

/// Warm the channel routes for the bot's workspace, then retry every
/// request from the startup snapshot.
async fn resume_pending(
    orchestrator: &RequestOrchestrator,
    pending: Vec<PendingRequest>,
    slack: &SlackService,
) {
    if pending.is_empty() {
        return;
    }
    if let Some(directory) = slack.open_workspace(slack.workspace_id()).await {
        orchestrator.router().refresh_workspace(directory.as_ref()).await;
    }

    let summary = orchestrator.resume_pending(pending, slack).await;
    info!(
        completed = summary.completed,
        failed = summary.failed,
        skipped = summary.skipped,
        "pending requests processed"
    );
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
