//! Global configuration parsing, validation, and credential loading.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::models::Team;
use crate::{AppError, Result};

/// Keyring service name credentials are stored under.
const KEYRING_SERVICE: &str = "job-caster";

/// Slack connectivity settings.
///
/// Tokens are loaded at runtime via OS keychain or environment variables,
/// not from the TOML config file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SlackConfig {
    /// App-level token used for Socket Mode (populated at runtime).
    #[serde(skip)]
    pub app_token: String,
    /// Bot user token used for posting messages (populated at runtime).
    #[serde(skip)]
    pub bot_token: String,
}

/// Language-model settings for job extraction.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct OpenAiConfig {
    /// API key (populated at runtime).
    #[serde(skip)]
    pub api_key: String,
    /// Model used for page text.
    #[serde(default = "default_model")]
    pub model: String,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Model used for images; falls back to `model`.
    #[serde(default)]
    pub image_model: Option<String>,
    /// API base URL.
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    /// Output token cap per call.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Per-call timeout.
    #[serde(default = "default_response_timeout")]
    pub response_timeout_seconds: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            temperature: default_temperature(),
            image_model: None,
            base_url: default_openai_base_url(),
            max_output_tokens: default_max_output_tokens(),
            response_timeout_seconds: default_response_timeout(),
        }
    }
}

impl OpenAiConfig {
    /// Model to use for image extraction.
    #[must_use]
    pub fn image_model(&self) -> &str {
        self.image_model.as_deref().unwrap_or(&self.model)
    }
}

/// Liveness listener settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct HealthConfig {
    /// Bind host.
    #[serde(default = "default_health_host")]
    pub host: String,
    /// Bind port; the `PORT` env var takes precedence when valid.
    #[serde(default = "default_health_port")]
    pub port: u16,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            host: default_health_host(),
            port: default_health_port(),
        }
    }
}

fn default_model() -> String {
    "gpt-5.1-mini".into()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_max_output_tokens() -> u32 {
    1200
}

fn default_response_timeout() -> u64 {
    60
}

fn default_health_host() -> String {
    "0.0.0.0".into()
}

fn default_health_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_command() -> String {
    "/jobbot".into()
}

fn default_max_scrape_bytes() -> usize {
    600_000
}

fn default_max_image_bytes() -> usize {
    5_000_000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_resume_pause_millis() -> u64 {
    1000
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Directory holding the post history and retry ledger.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Slash command the bot answers to.
    #[serde(default = "default_command")]
    pub command: String,
    /// Page bodies are truncated to this many bytes before parsing.
    #[serde(default = "default_max_scrape_bytes")]
    pub max_scrape_bytes: usize,
    /// Images larger than this are rejected.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
    /// Timeout for each page or image fetch.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Ledger entries at or above this attempt count are not resumed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Pause between successive resumed requests.
    #[serde(default = "default_resume_pause_millis")]
    pub resume_pause_millis: u64,
    /// Slack credentials.
    #[serde(default)]
    pub slack: SlackConfig,
    /// Extraction model settings.
    #[serde(default)]
    pub openai: OpenAiConfig,
    /// Liveness listener settings.
    #[serde(default)]
    pub health: HealthConfig,
    /// Raw team → channel ID table as written in the file.
    #[serde(default)]
    channels: BTreeMap<String, String>,
    /// Validated team → channel ID mapping.
    #[serde(skip)]
    pub team_channels: BTreeMap<Team, String>,
}

impl GlobalConfig {
    /// Load configuration from a TOML file, apply environment overrides,
    /// and validate.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read, contains
    /// invalid TOML, or fails validation.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        let mut config: Self = toml::from_str(&raw)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string and validate it, without
    /// consulting the environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load every credential from OS keychain with env-var fallback.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` naming every credential that could not
    /// be found.
    pub async fn load_credentials(&mut self) -> Result<()> {
        let mut missing = Vec::new();

        match load_credential("slack_app_token", "SLACK_APP_TOKEN").await {
            Ok(value) => self.slack.app_token = value,
            Err(name) => missing.push(name),
        }
        match load_credential("slack_bot_token", "SLACK_BOT_TOKEN").await {
            Ok(value) => self.slack.bot_token = value,
            Err(name) => missing.push(name),
        }
        match load_credential("openai_api_key", "OPENAI_API_KEY").await {
            Ok(value) => self.openai.api_key = value,
            Err(name) => missing.push(name),
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::Config(format!(
                "missing credentials (set in keychain or environment): {}",
                missing.join(", ")
            )))
        }
    }

    /// Configured channel ID for a team.
    #[must_use]
    pub fn channel_for(&self, team: Team) -> Option<&str> {
        self.team_channels.get(&team).map(String::as_str)
    }

    /// Path of the append-only post history file.
    #[must_use]
    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join("posted_jobs.log")
    }

    /// Path of the retry ledger document.
    #[must_use]
    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join("pending_requests.json")
    }

    /// Fetch timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Pause between resumed requests as a [`Duration`].
    #[must_use]
    pub fn resume_pause(&self) -> Duration {
        Duration::from_millis(self.resume_pause_millis)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(raw) = env::var("JOB_TEAM_CHANNEL_IDS") {
            for (team, channel_id) in parse_team_channel_ids(&raw)? {
                self.channels.insert(team.as_str().to_owned(), channel_id);
            }
        }
        if let Ok(model) = env::var("OPENAI_MODEL") {
            if !model.trim().is_empty() {
                self.openai.model = model.trim().to_owned();
            }
        }
        if let Ok(model) = env::var("OPENAI_IMAGE_MODEL") {
            if !model.trim().is_empty() {
                self.openai.image_model = Some(model.trim().to_owned());
            }
        }
        if let Some(temperature) = env_number("OPENAI_TEMPERATURE")? {
            self.openai.temperature = temperature;
        }
        if let Some(seconds) = env_number("RESPONSE_TIMEOUT")? {
            self.openai.response_timeout_seconds = seconds;
        }
        if let Some(bytes) = env_number("MAX_SCRAPE_BYTES")? {
            self.max_scrape_bytes = bytes;
        }
        if let Some(bytes) = env_number("MAX_IMAGE_BYTES")? {
            self.max_image_bytes = bytes;
        }
        if let Some(seconds) = env_number("REQUEST_TIMEOUT")? {
            self.request_timeout_seconds = seconds;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.command.trim().is_empty() || !self.command.starts_with('/') {
            return Err(AppError::Config(
                "command must be a slash command such as /jobbot".into(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(AppError::Config(
                "max_attempts must be greater than zero".into(),
            ));
        }
        if self.max_scrape_bytes == 0 || self.max_image_bytes == 0 {
            return Err(AppError::Config(
                "max_scrape_bytes and max_image_bytes must be greater than zero".into(),
            ));
        }

        let mut team_channels = BTreeMap::new();
        for (name, channel_id) in &self.channels {
            let team = Team::from_canonical(name).ok_or_else(|| {
                AppError::Config(format!(
                    "unknown team '{name}' in [channels]; expected one of: art, game_design, dev, others"
                ))
            })?;
            let channel_id = channel_id.trim();
            if !channel_id.is_empty() {
                team_channels.insert(team, channel_id.to_owned());
            }
        }

        let missing: Vec<&str> = Team::ALL
            .into_iter()
            .filter(|team| !team_channels.contains_key(team))
            .map(Team::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(AppError::Config(format!(
                "provide channel IDs for all teams via [channels] or JOB_TEAM_CHANNEL_IDS. Missing: {}",
                missing.join(", ")
            )));
        }

        self.team_channels = team_channels;
        Ok(())
    }
}

/// Numeric override from the environment. Unset or blank means no override.
fn env_number<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    let Ok(raw) = env::var(key) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse()
        .map(Some)
        .map_err(|_| AppError::Config(format!("{key} must be a number, got '{raw}'")))
}

/// Parse a `team:channel,team:channel` list.
///
/// Blank items and items with an empty side are skipped.
///
/// # Errors
///
/// Returns `AppError::Config` for an unknown team name.
pub fn parse_team_channel_ids(raw: &str) -> Result<BTreeMap<Team, String>> {
    let mut parsed = BTreeMap::new();
    for item in raw.split(',') {
        let Some((team, channel_id)) = item.split_once(':') else {
            continue;
        };
        let (team, channel_id) = (team.trim(), channel_id.trim());
        if team.is_empty() || channel_id.is_empty() {
            continue;
        }
        let team = Team::from_canonical(team)
            .ok_or_else(|| AppError::Config(format!("unknown team '{team}' in JOB_TEAM_CHANNEL_IDS")))?;
        parsed.insert(team, channel_id.to_owned());
    }
    Ok(parsed)
}

/// Load a single credential from OS keychain with env-var fallback.
///
/// On failure returns the env var name that should have been set.
async fn load_credential(keyring_key: &str, env_key: &'static str) -> std::result::Result<String, &'static str> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await;

    match keychain_result {
        Ok(Ok(value)) if !value.is_empty() => return Ok(value),
        Ok(Ok(_)) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Ok(Err(err)) => {
            warn!(key = keyring_key, ?err, "keychain lookup failed, trying env var");
        }
        Err(err) => {
            warn!(key = keyring_key, %err, "keychain task panicked, trying env var");
        }
    }

    match env::var(env_key) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_owned()),
        _ => Err(env_key),
    }
}
