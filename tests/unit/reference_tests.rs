//! Unit tests for reference parsing.

use job_caster::intake::ParsedReference;

#[test]
fn splits_page_and_image_urls() {
    let parsed = ParsedReference::parse(
        "New roles: https://jobs.example.com/env and image: https://cdn.example.com/poster.png",
    );

    assert_eq!(parsed.page_urls, vec!["https://jobs.example.com/env"]);
    assert_eq!(parsed.image_urls, vec!["https://cdn.example.com/poster.png"]);
}

#[test]
fn image_marker_is_case_insensitive_with_loose_spacing() {
    let parsed = ParsedReference::parse("IMAGE :   https://cdn.example.com/a.jpg");

    assert_eq!(parsed.image_urls, vec!["https://cdn.example.com/a.jpg"]);
    assert!(parsed.page_urls.is_empty());
}

#[test]
fn duplicates_collapse_in_first_seen_order() {
    let parsed = ParsedReference::parse(
        "https://b.example/2 https://a.example/1 https://b.example/2 HTTP://c.example/3",
    );

    assert_eq!(
        parsed.page_urls,
        vec!["https://b.example/2", "https://a.example/1", "HTTP://c.example/3"]
    );
}

#[test]
fn angle_brackets_end_a_url() {
    let parsed = ParsedReference::parse("<https://jobs.example.com/qa>");

    assert_eq!(parsed.page_urls, vec!["https://jobs.example.com/qa"]);
}

#[test]
fn plain_text_has_no_urls() {
    let parsed = ParsedReference::parse("we are hiring a level designer, ping me");

    assert!(parsed.is_empty());
}
