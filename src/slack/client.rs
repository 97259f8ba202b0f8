//! Slack Socket Mode client, shared bot state and deferred replies.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::json;
use slack_morphism::prelude::{
    SlackApiToken, SlackApiTokenType, SlackApiTokenValue, SlackBlock, SlackClient,
    SlackClientEventsListenerEnvironment, SlackClientEventsUserState,
    SlackClientHyperHttpsConnector, SlackClientSocketModeConfig, SlackClientSocketModeListener,
    SlackSocketModeListenerCallbacks,
};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::{GlobalConfig, SlackConfig};
use crate::dispatch::WorkspaceDirectory;
use crate::orchestrator::{RequestOrchestrator, WorkspaceOpener};
use crate::slack::commands;
use crate::slack::workspace::SlackWorkspace;
use crate::{AppError, Result};

/// Hyper-backed Slack client used throughout the bridge.
pub type SlackHyperClient = SlackClient<SlackClientHyperHttpsConnector>;

/// State shared with every Socket Mode callback.
pub struct BotState {
    /// Immutable configuration.
    pub config: Arc<GlobalConfig>,
    /// Request lifecycle engine.
    pub orchestrator: Arc<RequestOrchestrator>,
    /// Bot token for Web API calls.
    pub bot_token: SlackApiToken,
    /// HTTP client for `response_url` deliveries.
    pub http: reqwest::Client,
    /// Signalled on every Socket Mode `hello`.
    pub ready: Notify,
}

impl BotState {
    /// Assemble bot state.
    #[must_use]
    pub fn new(config: Arc<GlobalConfig>, orchestrator: Arc<RequestOrchestrator>) -> Self {
        let bot_token = bot_token(&config.slack);
        Self {
            config,
            orchestrator,
            bot_token,
            http: reqwest::Client::new(),
            ready: Notify::new(),
        }
    }

    /// Open a workspace through the given client with the bot token.
    pub async fn open_workspace(&self, client: Arc<SlackHyperClient>, workspace_id: &str) -> SlackWorkspace {
        SlackWorkspace::open(client, self.bot_token.clone(), workspace_id.to_owned()).await
    }
}

/// Slack connection owning the Socket Mode listener.
pub struct SlackService {
    client: Arc<SlackHyperClient>,
    state: Arc<BotState>,
    workspace_id: String,
}

impl SlackService {
    /// Verify the bot token and start the Socket Mode listener.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if the HTTPS connector cannot be created
    /// or the bot token is rejected.
    pub async fn start(state: Arc<BotState>) -> Result<(Self, JoinHandle<()>)> {
        let connector = SlackClientHyperHttpsConnector::new()
            .map_err(|err| AppError::Slack(format!("failed to init slack connector: {err}")))?;
        let client = Arc::new(SlackClient::new(connector));

        let identity = client
            .open_session(&state.bot_token)
            .auth_test()
            .await
            .map_err(|err| AppError::Slack(format!("bot token rejected: {err}")))?;
        let workspace_id = identity.team_id.to_string();
        info!(workspace_id, "slack bot authenticated");

        let app_token = SlackApiToken {
            token_value: SlackApiTokenValue(state.config.slack.app_token.clone()),
            cookie: None,
            team_id: None,
            scope: None,
            token_type: Some(SlackApiTokenType::App),
        };
        let socket_task = Self::spawn_socket_mode(&client, app_token, Arc::clone(&state));
        info!(command = %state.config.command, "slack socket mode started");

        Ok((
            Self {
                client,
                state,
                workspace_id,
            },
            socket_task,
        ))
    }

    /// Workspace the bot token belongs to.
    #[must_use]
    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    /// Wait until Socket Mode has said `hello` at least once.
    pub async fn wait_until_ready(&self) {
        self.state.ready.notified().await;
    }

    fn spawn_socket_mode(
        client: &Arc<SlackHyperClient>,
        app_token: SlackApiToken,
        state: Arc<BotState>,
    ) -> JoinHandle<()> {
        let listener_env = Arc::new(
            SlackClientEventsListenerEnvironment::new(Arc::clone(client))
                .with_error_handler(|err, _client, _state| {
                    error!(?err, "socket mode error");
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR
                })
                .with_user_state(state),
        );
        let callbacks = SlackSocketModeListenerCallbacks::new()
            .with_hello_events(handle_hello)
            .with_command_events(commands::handle_command);
        let config = SlackClientSocketModeConfig {
            max_connections_count: SlackClientSocketModeConfig::DEFAULT_CONNECTIONS_COUNT,
            debug_connections: SlackClientSocketModeConfig::DEFAULT_DEBUG_CONNECTIONS,
            initial_backoff_in_seconds:
                SlackClientSocketModeConfig::DEFAULT_INITIAL_BACKOFF_IN_SECONDS,
            reconnect_timeout_in_seconds:
                SlackClientSocketModeConfig::DEFAULT_RECONNECT_TIMEOUT_IN_SECONDS,
            ping_interval_in_seconds: SlackClientSocketModeConfig::DEFAULT_PING_INTERVAL_IN_SECONDS,
            ping_failure_threshold_times:
                SlackClientSocketModeConfig::DEFAULT_PING_FAILURE_THRESHOLD_TIMES,
        };

        let listener = SlackClientSocketModeListener::new(&config, listener_env, callbacks);
        tokio::spawn(async move {
            if let Err(error) = listener.listen_for(&app_token).await {
                error!(?error, "socket mode listen failed");
                return;
            }

            listener.serve().await;
            info!("socket mode listener exited");
        })
    }
}

impl WorkspaceOpener for SlackService {
    fn open_workspace(
        &self,
        workspace_id: &str,
    ) -> Pin<Box<dyn Future<Output = Option<Arc<dyn WorkspaceDirectory>>> + Send + '_>> {
        let workspace_id = workspace_id.to_owned();
        Box::pin(async move {
            if workspace_id != self.workspace_id {
                warn!(workspace_id, "bot is not installed in workspace");
                return None;
            }
            let workspace = self
                .state
                .open_workspace(Arc::clone(&self.client), &workspace_id)
                .await;
            Some(Arc::new(workspace) as Arc<dyn WorkspaceDirectory>)
        })
    }
}

async fn handle_hello<E: std::fmt::Debug>(
    event: E,
    _client: Arc<SlackHyperClient>,
    state: SlackClientEventsUserState,
) {
    info!(?event, "socket hello");
    let bot: Option<Arc<BotState>> = {
        let guard = state.read().await;
        guard.get_user_state::<Arc<BotState>>().cloned()
    };
    if let Some(bot) = bot {
        bot.ready.notify_one();
    }
}

/// Deliver an ephemeral reply to a slash command's `response_url`.
///
/// Returns whether Slack accepted it. An expired URL (404/410) or a
/// transport failure is logged and otherwise ignored.
pub async fn respond(http: &reqwest::Client, response_url: &str, text: &str, blocks: Vec<SlackBlock>) -> bool {
    let body = json!({
        "response_type": "ephemeral",
        "replace_original": false,
        "text": text,
        "blocks": blocks,
    });

    match http.post(response_url).json(&body).send().await {
        Ok(response) if response.status().is_success() => true,
        Ok(response) => {
            let status = response.status();
            if matches!(status.as_u16(), 404 | 410) {
                warn!(%status, "response_url expired before reply could be sent");
            } else {
                warn!(%status, "slack rejected deferred reply");
            }
            false
        }
        Err(err) => {
            warn!(%err, "failed to deliver deferred reply");
            false
        }
    }
}

fn bot_token(config: &SlackConfig) -> SlackApiToken {
    SlackApiToken {
        token_value: SlackApiTokenValue(config.bot_token.clone()),
        cookie: None,
        team_id: None,
        scope: None,
        token_type: Some(SlackApiTokenType::Bot),
    }
}
