//! Integration tests for the HTTP fetcher against a local server.

use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;

use job_caster::intake::{Fetcher, HttpFetcher};

const PAGE: &str = "<html><head><script>track()</script></head>\
    <body><h1>Environment Artist</h1><p>Voxel Labs, Lyon</p></body></html>";

async fn spawn_site() -> String {
    let app = Router::new()
        .route("/job", get(|| async { axum::response::Html(PAGE) }))
        .route("/empty", get(|| async { axum::response::Html("<script>x()</script>") }))
        .route("/accents", get(|| async { axum::response::Html("<p>caf\u{e9} cr\u{e8}me</p>") }))
        .route("/gone", get(|| async { StatusCode::GONE }))
        .route("/forbidden", get(|| async { StatusCode::FORBIDDEN }))
        .route("/small.png", get(|| async { vec![0x89_u8, b'P', b'N', b'G', 1, 2, 3, 4] }))
        .route("/large.png", get(|| async { vec![0_u8; 4096] }));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn fetcher() -> HttpFetcher {
    HttpFetcher::new(Duration::from_secs(5), 600_000, 1024).expect("fetcher")
}

#[tokio::test]
async fn page_text_is_visible_text_only() {
    let base = spawn_site().await;

    let text = fetcher().fetch_page_text(&format!("{base}/job")).await;

    assert_eq!(text.as_deref(), Some("Environment Artist\nVoxel Labs, Lyon"));
}

#[tokio::test]
async fn error_statuses_yield_nothing() {
    let base = spawn_site().await;
    let fetcher = fetcher();

    assert!(fetcher.fetch_page_text(&format!("{base}/gone")).await.is_none());
    assert!(fetcher.fetch_page_text(&format!("{base}/forbidden")).await.is_none());
    assert!(fetcher.fetch_image_bytes(&format!("{base}/gone")).await.is_none());
}

#[tokio::test]
async fn page_without_visible_text_yields_nothing() {
    let base = spawn_site().await;

    assert!(fetcher().fetch_page_text(&format!("{base}/empty")).await.is_none());
}

#[tokio::test]
async fn unreachable_host_yields_nothing() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    assert!(fetcher().fetch_page_text(&format!("http://{addr}/job")).await.is_none());
}

#[tokio::test]
async fn images_within_the_cap_are_returned() {
    let base = spawn_site().await;

    let bytes = fetcher().fetch_image_bytes(&format!("{base}/small.png")).await;

    assert_eq!(bytes.as_deref(), Some(&[0x89_u8, b'P', b'N', b'G', 1, 2, 3, 4][..]));
}

#[tokio::test]
async fn oversized_images_are_rejected() {
    let base = spawn_site().await;

    assert!(fetcher().fetch_image_bytes(&format!("{base}/large.png")).await.is_none());
}

#[tokio::test]
async fn oversized_pages_are_truncated_not_rejected() {
    let base = spawn_site().await;
    let small = HttpFetcher::new(Duration::from_secs(5), 70, 1024).expect("fetcher");

    let text = small.fetch_page_text(&format!("{base}/job")).await;

    assert!(text.is_some_and(|text| !text.contains("Lyon")));
}

#[tokio::test]
async fn cap_inside_a_character_does_not_leave_a_replacement_mark() {
    let base = spawn_site().await;
    // "<p>caf" is 6 bytes; the 7th is the first half of the accented e.
    let tiny = HttpFetcher::new(Duration::from_secs(5), 7, 1024).expect("fetcher");

    let text = tiny.fetch_page_text(&format!("{base}/accents")).await;

    assert_eq!(text.as_deref(), Some("caf"));
}
