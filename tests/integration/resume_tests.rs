//! Integration tests for resuming requests left in the retry ledger.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use job_caster::orchestrator::resume::EMPTY_RETRY_ERROR;
use job_caster::orchestrator::ResumeSummary;

use super::test_helpers::{FakeExtractor, FakeFetcher, FakeOpener, FakeWorkspace, Harness, WORKSPACE};

const PAGE: &str = "https://jobs.example.com/tech-artist";
const OLD_PAGE: &str = "https://jobs.example.com/gameplay-programmer";

fn harness() -> Harness {
    Harness::new(
        FakeFetcher::new().with_page(PAGE, "Technical Artist"),
        FakeExtractor::new().with_jobs(PAGE, vec![json!({"job_title": "Technical Artist", "team": "art"})]),
    )
}

#[tokio::test]
async fn empty_ledger_does_nothing() {
    let h = harness();

    let summary = h.resume(&FakeOpener::new()).await;

    assert_eq!(summary, ResumeSummary::default());
}

#[tokio::test]
async fn pending_request_is_retried_and_cleared() {
    let h = harness();
    let workspace = Arc::new(FakeWorkspace::with_all_channels(WORKSPACE));
    let opener = FakeOpener::new().with(Arc::clone(&workspace));
    h.ledger.start_request("req-1", WORKSPACE, "U1", PAGE).await.unwrap();
    h.ledger.fail_request("req-1", "slack: timeout").await.unwrap();

    let summary = h.resume(&opener).await;

    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 0);
    assert!(h.ledger.list_pending_requests().await.unwrap().is_empty());
    assert_eq!(workspace.sent(), vec![("C_ART".to_owned(), "Technical Artist".to_owned())]);
    assert_eq!(h.history_file(), format!("{PAGE}\n"));
}

#[tokio::test]
async fn already_posted_jobs_still_complete_the_retry() {
    let h = harness();
    let workspace = Arc::new(FakeWorkspace::with_all_channels(WORKSPACE));
    let opener = FakeOpener::new().with(Arc::clone(&workspace));
    h.orchestrator.post("req-0", "U1", PAGE, workspace.as_ref()).await.unwrap();
    h.ledger.start_request("req-1", WORKSPACE, "U1", PAGE).await.unwrap();

    let summary = h.resume(&opener).await;

    assert_eq!(summary.completed, 1);
    assert_eq!(workspace.sent().len(), 1, "duplicate is not re-sent");
    assert!(h.ledger.list_pending_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn exhausted_entries_are_skipped_and_kept() {
    let h = harness();
    let workspace = Arc::new(FakeWorkspace::with_all_channels(WORKSPACE));
    let opener = FakeOpener::new().with(Arc::clone(&workspace));
    h.ledger.start_request("req-1", WORKSPACE, "U1", PAGE).await.unwrap();
    for _ in 0..3 {
        h.ledger.fail_request("req-1", "boom").await.unwrap();
    }

    let summary = h.resume(&opener).await;

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.completed, 0);
    assert!(workspace.sent().is_empty());
    let pending = h.ledger.list_pending_requests().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].attempts, 3);
}

#[tokio::test]
async fn empty_retry_counts_as_failure() {
    let h = harness();
    let opener = FakeOpener::new().with(Arc::new(FakeWorkspace::with_all_channels(WORKSPACE)));
    h.ledger
        .start_request("req-1", WORKSPACE, "U1", "https://jobs.example.com/gone")
        .await
        .unwrap();

    let summary = h.resume(&opener).await;

    assert_eq!(summary.failed, 1);
    let pending = h.ledger.list_pending_requests().await.unwrap();
    assert_eq!(pending[0].attempts, 1);
    assert_eq!(pending[0].last_error.as_deref(), Some(EMPTY_RETRY_ERROR));
}

#[tokio::test]
async fn unreachable_workspace_counts_as_failure() {
    let h = harness();
    h.ledger.start_request("req-1", "T_GONE", "U1", PAGE).await.unwrap();

    let summary = h.resume(&FakeOpener::new()).await;

    assert_eq!(summary.failed, 1);
    let pending = h.ledger.list_pending_requests().await.unwrap();
    assert_eq!(pending[0].last_error.as_deref(), Some("workspace T_GONE unavailable"));
}

#[tokio::test]
async fn dispatch_error_during_retry_is_recorded() {
    let h = harness();
    let opener = FakeOpener::new().with(Arc::new(FakeWorkspace::with_all_channels(WORKSPACE)));
    h.ledger.start_request("req-1", WORKSPACE, "U1", PAGE).await.unwrap();
    std::fs::create_dir_all(h.config.history_path()).unwrap();

    let summary = h.resume(&opener).await;

    assert_eq!(summary.failed, 1);
    let pending = h.ledger.list_pending_requests().await.unwrap();
    assert!(pending[0]
        .last_error
        .as_deref()
        .is_some_and(|err| err.starts_with("persistence:")));
}

#[tokio::test]
async fn mixed_entries_are_processed_in_order() {
    let h = harness();
    let workspace = Arc::new(FakeWorkspace::with_all_channels(WORKSPACE));
    let opener = FakeOpener::new().with(Arc::clone(&workspace));
    h.ledger.start_request("ok", WORKSPACE, "U1", PAGE).await.unwrap();
    h.ledger.start_request("lost", "T_GONE", "U2", PAGE).await.unwrap();
    h.ledger.start_request("done", WORKSPACE, "U3", "no links").await.unwrap();
    for _ in 0..3 {
        h.ledger.fail_request("done", "boom").await.unwrap();
    }

    let summary = h.resume(&opener).await;

    assert_eq!(
        summary,
        ResumeSummary {
            skipped: 1,
            completed: 1,
            failed: 1,
        }
    );
    let remaining: Vec<_> = h
        .ledger
        .list_pending_requests()
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.request_id)
        .collect();
    assert_eq!(remaining, vec!["lost", "done"]);
}

fn two_page_harness() -> Harness {
    Harness::new(
        FakeFetcher::new()
            .with_page(PAGE, "Technical Artist")
            .with_page(OLD_PAGE, "Gameplay Programmer"),
        FakeExtractor::new()
            .with_jobs(PAGE, vec![json!({"job_title": "Technical Artist", "team": "art"})])
            .with_jobs(OLD_PAGE, vec![json!({"job_title": "Gameplay Programmer", "team": "dev"})]),
    )
}

#[tokio::test]
async fn request_accepted_after_snapshot_is_left_to_its_own_run() {
    let h = two_page_harness();
    let workspace = Arc::new(
        FakeWorkspace::with_all_channels(WORKSPACE).with_send_delay(Duration::from_millis(100)),
    );
    let opener = FakeOpener::new().with(Arc::clone(&workspace));
    h.ledger.start_request("req-old", WORKSPACE, "U0", OLD_PAGE).await.unwrap();
    let pending = h.orchestrator.pending_requests().await.unwrap();

    let live = h.orchestrator.post("req-live", "U1", PAGE, workspace.as_ref());
    let resume = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        h.orchestrator.resume_pending(pending, &opener).await
    };
    let (live, summary) = tokio::join!(live, resume);

    live.unwrap();
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 0);
    let mut sent = workspace.sent();
    sent.sort();
    assert_eq!(
        sent,
        vec![
            ("C_ART".to_owned(), "Technical Artist".to_owned()),
            ("C_DEV".to_owned(), "Gameplay Programmer".to_owned()),
        ]
    );
    assert!(h.ledger.list_pending_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_post_and_retry_of_one_job_send_it_once() {
    let h = harness();
    let workspace = Arc::new(
        FakeWorkspace::with_all_channels(WORKSPACE).with_send_delay(Duration::from_millis(100)),
    );
    let opener = FakeOpener::new().with(Arc::clone(&workspace));
    h.ledger.start_request("req-old", WORKSPACE, "U0", PAGE).await.unwrap();
    let pending = h.orchestrator.pending_requests().await.unwrap();

    let live = h.orchestrator.post("req-live", "U1", PAGE, workspace.as_ref());
    let resume = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        h.orchestrator.resume_pending(pending, &opener).await
    };
    let (live, summary) = tokio::join!(live, resume);

    live.unwrap();
    assert_eq!(summary.completed, 1);
    assert_eq!(workspace.sent(), vec![("C_ART".to_owned(), "Technical Artist".to_owned())]);
    assert_eq!(h.history_file(), format!("{PAGE}\n"));
    assert!(h.ledger.list_pending_requests().await.unwrap().is_empty());
}
