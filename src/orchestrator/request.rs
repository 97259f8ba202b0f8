//! Interactive request flows: collect, post and preview.
//!
//! A `post` moves through `started` (ledger entry written), `collecting`
//! (fetch + extract for every URL), `dispatching` (dedup + route + send)
//! and ends `completed` (ledger entry removed) or `failed` (attempt
//! recorded). Problems with individual URLs or jobs never abort the batch;
//! they surface as issues in the outcome.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::GlobalConfig;
use crate::dispatch::{Channel, DispatchRouter, WorkspaceDirectory};
use crate::intake::extract::image_data_url;
use crate::intake::{Fetcher, JobExtractor, ParsedReference};
use crate::models::{Job, PendingRequest, RawJob};
use crate::persistence::RetryLedger;
use crate::Result;

/// Issue reported when a reference contains no URLs at all.
pub const NO_URLS_ISSUE: &str = "No URLs detected in reference text.";

/// Raw jobs gathered from a reference, plus notes about URLs that yielded
/// nothing.
#[derive(Debug, Default)]
pub struct Collection {
    /// Extracted records, page URLs first, then images, each in reference
    /// order.
    pub jobs: Vec<RawJob>,
    /// One entry per URL that could not be fetched or parsed.
    pub issues: Vec<String>,
}

/// Result of an interactive `post`.
#[derive(Debug)]
pub enum PostOutcome {
    /// Collection produced no jobs. The request is not retried.
    NothingFound {
        /// Why nothing was collected.
        issues: Vec<String>,
    },
    /// Jobs were handed to the router.
    Dispatched {
        /// Delivered jobs and their channels.
        posted: Vec<(Job, Channel)>,
        /// Collection and dispatch issues, in that order.
        issues: Vec<String>,
    },
}

/// One job as it would be routed.
#[derive(Debug, Clone)]
pub struct PreviewEntry {
    /// Normalized job.
    pub job: Job,
    /// Display form of the destination.
    pub target: String,
    /// Where the job came from: its URL, else its company.
    pub source: String,
}

/// Result of a read-only `preview`.
#[derive(Debug, Default)]
pub struct PreviewReport {
    /// Every collected job with its routing target.
    pub entries: Vec<PreviewEntry>,
    /// Collection issues.
    pub issues: Vec<String>,
}

/// Drives a reference through collection and dispatch.
pub struct RequestOrchestrator {
    pub(crate) config: Arc<GlobalConfig>,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn JobExtractor>,
    pub(crate) router: Arc<DispatchRouter>,
    pub(crate) ledger: Arc<RetryLedger>,
}

impl RequestOrchestrator {
    /// Wire an orchestrator from its collaborators.
    #[must_use]
    pub fn new(
        config: Arc<GlobalConfig>,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn JobExtractor>,
        router: Arc<DispatchRouter>,
        ledger: Arc<RetryLedger>,
    ) -> Self {
        Self {
            config,
            fetcher,
            extractor,
            router,
            ledger,
        }
    }

    /// Router used for dispatch.
    #[must_use]
    pub fn router(&self) -> &Arc<DispatchRouter> {
        &self.router
    }

    /// Snapshot of the requests currently recorded in the retry ledger.
    ///
    /// Taken once at startup, before any new request can be accepted, and
    /// handed to [`RequestOrchestrator::resume_pending`].
    ///
    /// # Errors
    ///
    /// Returns an error when the ledger file cannot be read.
    pub async fn pending_requests(&self) -> Result<Vec<PendingRequest>> {
        self.ledger.list_pending_requests().await
    }

    /// Fetch and extract every URL in a reference.
    ///
    /// Page URLs are processed before image URLs. Records lacking a
    /// `job_url` or `source_url` are stamped with the URL they came from.
    pub async fn collect(&self, reference: &str) -> Collection {
        let parsed = ParsedReference::parse(reference.trim());
        let mut collection = Collection::default();

        for url in &parsed.page_urls {
            match self.page_jobs(url).await {
                Ok(jobs) => collection.jobs.extend(jobs),
                Err(issue) => collection.issues.push(issue),
            }
        }
        for url in &parsed.image_urls {
            match self.image_jobs(url).await {
                Ok(jobs) => collection.jobs.extend(jobs),
                Err(issue) => collection.issues.push(issue),
            }
        }
        if parsed.is_empty() {
            collection.issues.push(NO_URLS_ISSUE.to_owned());
        }

        collection
    }

    /// Run an interactive `post` for one slash-command invocation.
    ///
    /// # Errors
    ///
    /// Returns an error when the ledger entry cannot be written or when
    /// dispatch fails outright. In the latter case the failure is first
    /// recorded against the ledger entry so the request is resumed later.
    pub async fn post(
        &self,
        request_id: &str,
        user_id: &str,
        reference: &str,
        directory: &dyn WorkspaceDirectory,
    ) -> Result<PostOutcome> {
        let workspace_id = directory.workspace_id().to_owned();
        let span = info_span!("post_request", request_id, workspace_id = %workspace_id);
        async move {
            self.ledger
                .start_request(request_id, &workspace_id, user_id, reference)
                .await?;
            info!(user_id, summary = %summarize(reference), "post requested");

            let Collection { jobs, mut issues } = self.collect(reference).await;
            if jobs.is_empty() {
                if !issues.is_empty() {
                    warn!(issues = %issues.join(" | "), "job parsing produced no results");
                }
                self.complete(request_id).await;
                return Ok(PostOutcome::NothingFound { issues });
            }

            let normalized: Vec<Job> = jobs.iter().map(Job::from_raw).collect();
            let report = match self.router.dispatch(normalized, directory).await {
                Ok(report) => report,
                Err(err) => {
                    if let Err(ledger_err) = self.ledger.fail_request(request_id, &err.to_string()).await {
                        error!(%ledger_err, "failed to record request failure");
                    }
                    return Err(err);
                }
            };

            issues.extend(report.issues);
            info!(posted = report.posted.len(), issues = issues.len(), "post request finished");
            self.complete(request_id).await;
            Ok(PostOutcome::Dispatched {
                posted: report.posted,
                issues,
            })
        }
        .instrument(span)
        .await
    }

    /// Collect and normalize a reference and show where each job would go.
    /// Touches neither the post history nor the ledger, and sends nothing.
    pub async fn preview(&self, reference: &str, directory: &dyn WorkspaceDirectory) -> PreviewReport {
        let span = info_span!("preview_request", workspace_id = directory.workspace_id());
        async move {
            info!(summary = %summarize(reference), "preview requested");
            let Collection { jobs, issues } = self.collect(reference).await;

            let mut entries = Vec::with_capacity(jobs.len());
            for raw in &jobs {
                let job = Job::from_raw(raw);
                let target = self.router.preview_target(directory, job.team).await;
                let source = job.origin().unwrap_or(&job.company).to_owned();
                entries.push(PreviewEntry { job, target, source });
            }

            info!(jobs = entries.len(), issues = issues.len(), "preview finished");
            PreviewReport { entries, issues }
        }
        .instrument(span)
        .await
    }

    async fn page_jobs(&self, url: &str) -> std::result::Result<Vec<RawJob>, String> {
        info!(url, "parsing job page");
        let Some(content) = self.fetcher.fetch_page_text(url).await else {
            return Err(format!("Couldn't fetch content from {url}"));
        };
        let jobs = self.extractor.parse_from_text(&content, url).await;
        if jobs.is_empty() {
            return Err(format!("Couldn't parse job details from {url}"));
        }
        info!(url, count = jobs.len(), "parsed jobs from page");
        Ok(stamp_origin(jobs, url))
    }

    async fn image_jobs(&self, url: &str) -> std::result::Result<Vec<RawJob>, String> {
        info!(url, "parsing job image");
        let Some(bytes) = self.fetcher.fetch_image_bytes(url).await else {
            return Err(format!("Couldn't fetch the image {url}"));
        };
        let jobs = self.extractor.parse_from_image(&image_data_url(&bytes), url).await;
        if jobs.is_empty() {
            return Err(format!("Couldn't parse job details from the image {url}"));
        }
        info!(url, count = jobs.len(), "parsed jobs from image");
        Ok(stamp_origin(jobs, url))
    }

    async fn complete(&self, request_id: &str) {
        if let Err(err) = self.ledger.complete_request(request_id).await {
            error!(request_id, %err, "failed to clear pending request");
        }
    }
}

/// Fill `job_url` and `source_url` with `url` where absent or blank.
fn stamp_origin(mut jobs: Vec<RawJob>, url: &str) -> Vec<RawJob> {
    for job in &mut jobs {
        for key in ["job_url", "source_url"] {
            let blank = match job.get(key) {
                None | Some(Value::Null) => true,
                Some(Value::String(text)) => text.trim().is_empty(),
                Some(_) => false,
            };
            if blank {
                job.insert(key.to_owned(), Value::String(url.to_owned()));
            }
        }
    }
    jobs
}

/// First line of a reference, capped for logging.
pub(crate) fn summarize(reference: &str) -> String {
    reference
        .trim()
        .lines()
        .next()
        .unwrap_or_default()
        .chars()
        .take(200)
        .collect()
}
