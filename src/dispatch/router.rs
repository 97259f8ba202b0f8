//! Deduplicate, resolve and send jobs to their team channels.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{Channel, TeamChannelCache, WorkspaceDirectory};
use crate::config::GlobalConfig;
use crate::models::{Job, Team};
use crate::persistence::PostHistory;
use crate::Result;

/// Outcome of dispatching one batch of jobs.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Jobs delivered, with the channel each went to, in processing order.
    pub posted: Vec<(Job, Channel)>,
    /// Human-readable notes for every job that was not delivered.
    pub issues: Vec<String>,
}

/// Routes jobs to the channel configured for their team.
pub struct DispatchRouter {
    config: Arc<GlobalConfig>,
    history: Arc<PostHistory>,
    cache: TeamChannelCache,
    /// Held for a whole batch so the duplicate check, send and history
    /// append of one job never interleave with another batch.
    dispatch_lock: Mutex<()>,
}

impl DispatchRouter {
    /// Create a router over the given history store.
    #[must_use]
    pub fn new(config: Arc<GlobalConfig>, history: Arc<PostHistory>) -> Self {
        Self {
            config,
            history,
            cache: TeamChannelCache::new(),
            dispatch_lock: Mutex::new(()),
        }
    }

    /// Deliver every job that is not a duplicate and has a resolvable
    /// channel.
    ///
    /// Per-job problems become issues and never abort the batch. A job is
    /// recorded in the post history only after its send succeeds; a failed
    /// history append is logged and does not undo the post. Concurrent
    /// batches are delivered one after the other.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Persistence` when the post history cannot be
    /// loaded, since duplicates could no longer be detected.
    pub async fn dispatch(
        &self,
        jobs: Vec<Job>,
        directory: &dyn WorkspaceDirectory,
    ) -> Result<DispatchReport> {
        let _batch = self.dispatch_lock.lock().await;
        let mut report = DispatchReport::default();

        for job in jobs {
            if self.history.is_posted(&job).await? {
                info!(title = %job.title, origin = job.origin().unwrap_or_default(), "skipping duplicate job");
                report.issues.push(format!(
                    "Skipped duplicate `{}` ({}).",
                    job.title,
                    job.origin().unwrap_or("unknown origin")
                ));
                continue;
            }

            let Some(channel) = self.resolve_channel(directory, job.team).await else {
                report.issues.push(format!(
                    "No destination channel mapped for team `{}` (origin: {}).",
                    job.team,
                    job.origin().unwrap_or("unknown")
                ));
                continue;
            };

            if let Err(err) = directory.send_job(&channel, &job).await {
                warn!(title = %job.title, channel = %channel.id, %err, "failed to post job");
                report.issues.push(format!(
                    "Failed to post `{}` to #{}: {err}",
                    job.title, channel.name
                ));
                continue;
            }

            info!(title = %job.title, team = %job.team, channel = %channel.id, "job posted");
            if let Err(err) = self.history.mark_posted(&job).await {
                warn!(title = %job.title, %err, "job posted but history append failed");
            }
            report.posted.push((job, channel));
        }

        Ok(report)
    }

    /// Resolve the destination channel for a team in one workspace.
    ///
    /// Order: cache, then the workspace's channel list, then a remote
    /// lookup by ID. Any lookup failure leaves the team unresolved and
    /// nothing is cached.
    pub async fn resolve_channel(
        &self,
        directory: &dyn WorkspaceDirectory,
        team: Team,
    ) -> Option<Channel> {
        let workspace_id = directory.workspace_id();
        if let Some(channel) = self.cache.get(workspace_id, team) {
            return Some(channel);
        }

        let Some(channel_id) = self.config.channel_for(team) else {
            debug!(%team, "no channel configured for team");
            return None;
        };

        let channel = match directory.get_channel(channel_id) {
            Some(channel) => channel,
            None => match directory.fetch_channel(channel_id).await {
                Ok(channel) => channel,
                Err(err) => {
                    warn!(workspace_id, %team, channel_id, %err, "unable to resolve team channel");
                    return None;
                }
            },
        };

        self.cache.insert(workspace_id, team, channel.clone());
        Some(channel)
    }

    /// Forget every cached route for the directory's workspace and resolve
    /// all teams again. Returns how many teams resolved.
    pub async fn refresh_workspace(&self, directory: &dyn WorkspaceDirectory) -> usize {
        let workspace_id = directory.workspace_id();
        let dropped = self.cache.invalidate_workspace(workspace_id);
        let mut resolved = 0;
        for team in Team::ALL {
            if self.resolve_channel(directory, team).await.is_some() {
                resolved += 1;
            }
        }
        info!(workspace_id, dropped, resolved, "team channel routes refreshed");
        resolved
    }

    /// Number of cached routes for a workspace.
    #[must_use]
    pub fn cached_routes(&self, workspace_id: &str) -> usize {
        self.cache.count_for(workspace_id)
    }

    /// Describe where a job for `team` would be posted, without sending.
    pub async fn preview_target(&self, directory: &dyn WorkspaceDirectory, team: Team) -> String {
        match self.resolve_channel(directory, team).await {
            Some(channel) => channel.to_string(),
            None => "no channel mapped".to_owned(),
        }
    }
}
