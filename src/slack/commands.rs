//! Slack slash command router.
//!
//! The slash command takes a sub-command as its first word. Sub-commands
//! are declared in [`COMMANDS`]; anything else gets the usage help. Every
//! reply is ephemeral. Work that talks to Slack or fetches pages runs in a
//! spawned task and reports back through the command's `response_url`.

use std::sync::Arc;

use slack_morphism::prelude::{
    SlackBlock, SlackClientEventsUserState, SlackCommandEvent, SlackCommandEventResponse,
    SlackMessageContent, SlackMessageResponseType,
};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::dispatch::WorkspaceDirectory;
use crate::models::Team;
use crate::orchestrator::PostOutcome;
use crate::slack::blocks;
use crate::slack::client::{respond, BotState, SlackHyperClient};
use crate::slack::workspace::SlackWorkspace;

/// Sub-command handled by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Show the team → channel routes for this workspace.
    Status,
    /// Parse a reference and post the jobs.
    Post,
    /// Parse a reference and show routing without posting.
    Preview,
}

/// Registration entry for one sub-command.
#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    /// Word typed after the slash command.
    pub name: &'static str,
    /// Handler selected for this word.
    pub kind: CommandKind,
    /// Argument synopsis shown in help.
    pub usage: &'static str,
    /// One-line description shown in help.
    pub description: &'static str,
    /// Whether a reference argument is mandatory.
    pub needs_reference: bool,
}

/// Every sub-command the bot answers to.
pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "status",
        kind: CommandKind::Status,
        usage: "status",
        description: "Show bot configuration for this workspace",
        needs_reference: false,
    },
    CommandSpec {
        name: "post",
        kind: CommandKind::Post,
        usage: "post <reference>",
        description: "Parse and distribute job offers (use `image: https://...` for posters)",
        needs_reference: true,
    },
    CommandSpec {
        name: "preview",
        kind: CommandKind::Preview,
        usage: "preview <reference>",
        description: "Preview channel routing for a job reference",
        needs_reference: true,
    },
];

/// Result of parsing the slash command text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    /// A known sub-command with its (possibly empty) reference.
    Run {
        /// Selected handler.
        kind: CommandKind,
        /// Everything after the sub-command word, trimmed.
        reference: String,
    },
    /// Show help, optionally prefixed with a problem description.
    Help(Option<String>),
}

/// Find a sub-command by name, case-insensitively.
#[must_use]
pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.name.eq_ignore_ascii_case(name))
}

/// Parse the text typed after the slash command.
#[must_use]
pub fn parse_command(text: &str) -> ParsedCommand {
    let text = text.trim();
    let (name, rest) = match text.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (text, ""),
    };
    if name.is_empty() || name.eq_ignore_ascii_case("help") {
        return ParsedCommand::Help(None);
    }

    let Some(spec) = lookup(name) else {
        return ParsedCommand::Help(Some(format!("Unknown sub-command `{name}`.")));
    };
    if spec.needs_reference && rest.is_empty() {
        return ParsedCommand::Help(Some(format!("`{}` needs a reference.", spec.name)));
    }
    ParsedCommand::Run {
        kind: spec.kind,
        reference: rest.to_owned(),
    }
}

/// Usage help listing every registered sub-command.
#[must_use]
pub fn usage_text(command: &str) -> String {
    let mut lines = vec!["*Usage*".to_owned()];
    lines.extend(
        COMMANDS
            .iter()
            .map(|spec| format!("\u{2022} `{command} {}`: {}", spec.usage, spec.description)),
    );
    lines.join("\n")
}

/// One `status` line for a team route.
#[must_use]
pub fn route_line(team: Team, channel_id: &str, resolved: bool) -> String {
    if resolved {
        format!("\u{2705} `{team}` \u{2192} <#{channel_id}>")
    } else {
        format!("\u{26a0}\u{fe0f} `{team}` \u{2192} id:{channel_id}")
    }
}

/// Handle incoming slash commands routed via Socket Mode.
///
/// # Errors
///
/// Returns an error if the command response cannot be constructed.
pub async fn handle_command(
    event: SlackCommandEvent,
    client: Arc<SlackHyperClient>,
    state: SlackClientEventsUserState,
) -> slack_morphism::AnyStdResult<SlackCommandEventResponse> {
    info!(command = ?event.command, user = ?event.user_id, team = ?event.team_id, "received slash command");

    let bot: Option<Arc<BotState>> = {
        let guard = state.read().await;
        guard.get_user_state::<Arc<BotState>>().cloned()
    };
    let Some(bot) = bot else {
        warn!("bot state not available; cannot process command");
        return Ok(ephemeral("The bot is still starting up. Try again shortly."));
    };

    let text = event.text.clone().unwrap_or_default();
    let (kind, reference) = match parse_command(&text) {
        ParsedCommand::Run { kind, reference } => (kind, reference),
        ParsedCommand::Help(problem) => {
            let help = usage_text(&bot.config.command);
            let body = match problem {
                Some(problem) => format!("{problem}\n{help}"),
                None => help,
            };
            return Ok(ephemeral(&body));
        }
    };

    let invocation = Invocation {
        kind,
        reference,
        workspace_id: event.team_id.to_string(),
        user_id: event.user_id.to_string(),
        response_url: event.response_url.0.to_string(),
    };
    let ack = match kind {
        CommandKind::Status => "Checking team channel routes\u{2026}",
        CommandKind::Post => "Working on it. I'll report back here once the jobs are posted.",
        CommandKind::Preview => "Building a preview\u{2026}",
    };
    tokio::spawn(run_invocation(bot, client, invocation));

    Ok(ephemeral(ack))
}

/// Deferred part of a slash command.
struct Invocation {
    kind: CommandKind,
    reference: String,
    workspace_id: String,
    user_id: String,
    response_url: String,
}

async fn run_invocation(bot: Arc<BotState>, client: Arc<SlackHyperClient>, invocation: Invocation) {
    let request_id = Uuid::new_v4().to_string();
    let span = info_span!(
        "slash_command",
        request_id = %request_id,
        kind = ?invocation.kind,
        user_id = %invocation.user_id
    );
    async move {
        let workspace = bot.open_workspace(client, &invocation.workspace_id).await;
        let (text, reply) = match invocation.kind {
            CommandKind::Status => status_reply(&bot, &workspace).await,
            CommandKind::Post => post_reply(&bot, &workspace, &request_id, &invocation).await,
            CommandKind::Preview => {
                let report = bot.orchestrator.preview(&invocation.reference, &workspace).await;
                if report.entries.is_empty() {
                    (
                        "Preview failed".to_owned(),
                        blocks::nothing_found_blocks("Preview", &report.issues),
                    )
                } else {
                    (
                        format!("Preview: {} job(s) found", report.entries.len()),
                        blocks::preview_blocks(&report.entries, &report.issues),
                    )
                }
            }
        };
        respond(&bot.http, &invocation.response_url, &text, reply).await;
    }
    .instrument(span)
    .await;
}

async fn post_reply(
    bot: &BotState,
    workspace: &SlackWorkspace,
    request_id: &str,
    invocation: &Invocation,
) -> (String, Vec<SlackBlock>) {
    match bot
        .orchestrator
        .post(request_id, &invocation.user_id, &invocation.reference, workspace)
        .await
    {
        Ok(PostOutcome::NothingFound { issues }) => (
            "Post failed".to_owned(),
            blocks::nothing_found_blocks("Post", &issues),
        ),
        Ok(PostOutcome::Dispatched { posted, issues }) => (
            format!("Jobs posted: {}", posted.len()),
            blocks::post_summary_blocks(&posted, &issues),
        ),
        Err(err) => {
            error!(%err, "post request failed");
            (
                "Post failed".to_owned(),
                vec![blocks::severity_section(
                    "error",
                    &format!("Posting failed and will be retried after a restart: {err}"),
                )],
            )
        }
    }
}

async fn status_reply(bot: &BotState, workspace: &SlackWorkspace) -> (String, Vec<SlackBlock>) {
    let router = bot.orchestrator.router();
    router.refresh_workspace(workspace).await;

    let mut lines = Vec::new();
    for team in Team::ALL {
        let Some(channel_id) = bot.config.channel_for(team) else {
            continue;
        };
        let resolved = router.resolve_channel(workspace, team).await.is_some();
        lines.push(route_line(team, channel_id, resolved));
    }
    let cached = router.cached_routes(workspace.workspace_id());
    ("job-caster status".to_owned(), blocks::status_blocks(&lines, cached))
}

fn ephemeral(text: &str) -> SlackCommandEventResponse {
    SlackCommandEventResponse {
        content: SlackMessageContent {
            text: Some(text.to_owned()),
            blocks: None,
            attachments: None,
            upload: None,
            files: None,
            reactions: None,
            metadata: None,
            markdown_text: None,
        },
        response_type: Some(SlackMessageResponseType::Ephemeral),
    }
}
