//! Per-workspace cache of resolved team channels.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::Channel;
use crate::models::Team;

/// `(workspace, team) → channel` cache owned by the router.
///
/// The lock is held only for map operations, never across an await.
/// Concurrent resolutions of the same key race benignly: the last writer
/// wins and both writers hold an equivalent channel.
#[derive(Debug, Default)]
pub struct TeamChannelCache {
    routes: RwLock<HashMap<(String, Team), Channel>>,
}

impl TeamChannelCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached channel for a team in a workspace.
    #[must_use]
    pub fn get(&self, workspace_id: &str, team: Team) -> Option<Channel> {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(workspace_id.to_owned(), team))
            .cloned()
    }

    /// Remember the channel resolved for a team.
    pub fn insert(&self, workspace_id: &str, team: Team, channel: Channel) {
        self.routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((workspace_id.to_owned(), team), channel);
    }

    /// Drop every entry for a workspace. Returns how many were removed.
    pub fn invalidate_workspace(&self, workspace_id: &str) -> usize {
        let mut routes = self.routes.write().unwrap_or_else(PoisonError::into_inner);
        let before = routes.len();
        routes.retain(|(workspace, _), _| workspace != workspace_id);
        before - routes.len()
    }

    /// Number of cached routes for a workspace.
    #[must_use]
    pub fn count_for(&self, workspace_id: &str) -> usize {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|(workspace, _)| workspace == workspace_id)
            .count()
    }
}
