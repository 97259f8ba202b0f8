//! [`WorkspaceDirectory`] backed by the Slack Web API.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use slack_morphism::errors::SlackClientError;
use slack_morphism::prelude::{
    SlackApiChatPostMessageRequest, SlackApiConversationsInfoRequest,
    SlackApiConversationsListRequest, SlackApiToken, SlackChannelId, SlackChannelInfo,
    SlackClient, SlackClientHyperHttpsConnector, SlackConversationType, SlackMessageContent,
};
use tracing::{debug, info, warn};

use crate::dispatch::{Channel, ChannelLookupError, WorkspaceDirectory};
use crate::models::Job;
use crate::slack::blocks;
use crate::{AppError, Result};

/// Upper bound on `conversations.list` pages read per snapshot.
const MAX_LIST_PAGES: usize = 10;
const LIST_PAGE_SIZE: u16 = 200;

/// A Slack workspace with a snapshot of the channels the bot can see.
pub struct SlackWorkspace {
    client: Arc<SlackClient<SlackClientHyperHttpsConnector>>,
    token: SlackApiToken,
    workspace_id: String,
    channels: HashMap<String, Channel>,
}

impl SlackWorkspace {
    /// Open a workspace and snapshot its channel list.
    ///
    /// A failed listing is logged and leaves the snapshot empty; lookups
    /// then fall back to `conversations.info`.
    pub async fn open(
        client: Arc<SlackClient<SlackClientHyperHttpsConnector>>,
        token: SlackApiToken,
        workspace_id: String,
    ) -> Self {
        let channels = match list_channels(&client, &token).await {
            Ok(channels) => channels,
            Err(err) => {
                warn!(workspace_id, %err, "channel listing failed; relying on lookups");
                HashMap::new()
            }
        };
        debug!(workspace_id, channels = channels.len(), "workspace opened");
        Self {
            client,
            token,
            workspace_id,
            channels,
        }
    }

    async fn lookup(&self, channel_id: String) -> std::result::Result<Channel, ChannelLookupError> {
        let request = SlackApiConversationsInfoRequest::new(SlackChannelId(channel_id));
        let response = self
            .client
            .open_session(&self.token)
            .conversations_info(&request)
            .await
            .map_err(|err| classify_lookup_error(&err))?;
        Ok(to_channel(&response.channel))
    }

    async fn post(&self, channel: Channel, job: Job) -> Result<()> {
        let content = SlackMessageContent {
            text: Some(blocks::job_fallback_text(&job)),
            blocks: Some(blocks::job_blocks(&job)),
            attachments: None,
            upload: None,
            files: None,
            reactions: None,
            metadata: None,
            markdown_text: None,
        };
        let request = SlackApiChatPostMessageRequest {
            channel: SlackChannelId(channel.id.clone()),
            content,
            as_user: None,
            icon_emoji: None,
            icon_url: None,
            link_names: Some(true),
            parse: None,
            thread_ts: None,
            username: None,
            reply_broadcast: None,
            unfurl_links: Some(false),
            unfurl_media: None,
        };
        self.client
            .open_session(&self.token)
            .chat_post_message(&request)
            .await
            .map_err(|err| AppError::Slack(err.to_string()))?;
        info!(channel = %channel.id, title = %job.title, "sent job message");
        Ok(())
    }
}

impl WorkspaceDirectory for SlackWorkspace {
    fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    fn get_channel(&self, channel_id: &str) -> Option<Channel> {
        self.channels.get(channel_id).cloned()
    }

    fn fetch_channel(
        &self,
        channel_id: &str,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<Channel, ChannelLookupError>> + Send + '_>>
    {
        Box::pin(self.lookup(channel_id.to_owned()))
    }

    fn send_job(&self, channel: &Channel, job: &Job) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(self.post(channel.clone(), job.clone()))
    }
}

async fn list_channels(
    client: &SlackClient<SlackClientHyperHttpsConnector>,
    token: &SlackApiToken,
) -> Result<HashMap<String, Channel>> {
    let session = client.open_session(token);
    let mut channels = HashMap::new();
    let mut cursor = None;

    for _ in 0..MAX_LIST_PAGES {
        let request = SlackApiConversationsListRequest::new()
            .with_types(vec![SlackConversationType::Public, SlackConversationType::Private])
            .with_exclude_archived(true)
            .with_limit(LIST_PAGE_SIZE)
            .opt_cursor(cursor.take());
        let response = session
            .conversations_list(&request)
            .await
            .map_err(|err| AppError::Slack(format!("failed to list channels: {err}")))?;

        for info in &response.channels {
            let channel = to_channel(info);
            channels.insert(channel.id.clone(), channel);
        }

        cursor = response
            .response_metadata
            .and_then(|meta| meta.next_cursor)
            .filter(|next| !next.0.is_empty());
        if cursor.is_none() {
            break;
        }
    }

    Ok(channels)
}

fn to_channel(info: &SlackChannelInfo) -> Channel {
    let id = info.id.to_string();
    let name = info.name.clone().unwrap_or_else(|| id.clone());
    Channel { id, name }
}

/// Map a Slack API error code onto a lookup failure.
pub(crate) fn classify_api_code(code: &str) -> ChannelLookupError {
    match code {
        "channel_not_found" => ChannelLookupError::NotFound,
        "missing_scope" | "not_in_channel" | "access_denied" | "not_authed" => {
            ChannelLookupError::Forbidden
        }
        "team_access_not_granted" | "team_not_found" => ChannelLookupError::WrongWorkspace,
        other => ChannelLookupError::Transport(other.to_owned()),
    }
}

fn classify_lookup_error(err: &SlackClientError) -> ChannelLookupError {
    match err {
        SlackClientError::ApiError(api) => classify_api_code(&api.code),
        other => ChannelLookupError::Transport(other.to_string()),
    }
}
