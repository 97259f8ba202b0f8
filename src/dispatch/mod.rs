//! Routing of normalized jobs to per-team destination channels.
//!
//! The router talks to the chat platform only through
//! [`WorkspaceDirectory`], so it can be driven by the Slack client in
//! production and by in-memory fakes in tests.

pub mod channel_cache;
pub mod router;

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

pub use channel_cache::TeamChannelCache;
pub use router::{DispatchReport, DispatchRouter};

use crate::models::Job;
use crate::Result;

/// A destination channel as seen by the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    /// Platform channel ID.
    pub id: String,
    /// Human-readable name, without the leading `#`.
    pub name: String,
}

impl Display for Channel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.name)
    }
}

/// Why a configured channel ID could not be opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelLookupError {
    /// The channel does not exist.
    NotFound,
    /// The bot lacks access to the channel.
    Forbidden,
    /// The channel exists but belongs to another workspace.
    WrongWorkspace,
    /// The lookup request itself failed.
    Transport(String),
}

impl Display for ChannelLookupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => f.write_str("channel not found"),
            Self::Forbidden => f.write_str("missing access to channel"),
            Self::WrongWorkspace => f.write_str("channel belongs to another workspace"),
            Self::Transport(msg) => write!(f, "channel lookup failed: {msg}"),
        }
    }
}

impl std::error::Error for ChannelLookupError {}

/// One workspace's view of the chat platform.
pub trait WorkspaceDirectory: Send + Sync {
    /// Workspace this directory is bound to.
    fn workspace_id(&self) -> &str;

    /// Look a channel up in the locally known channel list.
    fn get_channel(&self, channel_id: &str) -> Option<Channel>;

    /// Look a channel up remotely by ID.
    fn fetch_channel(
        &self,
        channel_id: &str,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<Channel, ChannelLookupError>> + Send + '_>>;

    /// Post a rendered job to a channel.
    fn send_job(
        &self,
        channel: &Channel,
        job: &Job,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}
