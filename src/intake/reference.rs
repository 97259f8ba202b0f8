//! Splits a pasted reference into page URLs and image URLs.

use std::sync::LazyLock;

use regex::Regex;

#[allow(clippy::expect_used)]
static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)https?://[^\s<>]+").expect("valid url regex"));

#[allow(clippy::expect_used)]
static IMAGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)image\s*:\s*(https?://[^\s<>]+)").expect("valid image regex")
});

/// URLs found in a reference, each list ordered by first appearance and
/// free of exact duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedReference {
    /// Plain URLs, excluding anything tagged as an image.
    pub page_urls: Vec<String>,
    /// URLs tagged with an `image:` marker.
    pub image_urls: Vec<String>,
}

impl ParsedReference {
    /// Parse raw reference text.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let image_urls = dedup(
            IMAGE_PATTERN
                .captures_iter(text)
                .filter_map(|caps| caps.get(1))
                .map(|m| m.as_str()),
        );
        let page_urls = dedup(
            URL_PATTERN
                .find_iter(text)
                .map(|m| m.as_str())
                .filter(|url| !image_urls.iter().any(|image| image == url)),
        );
        Self {
            page_urls,
            image_urls,
        }
    }

    /// True when neither list has entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.page_urls.is_empty() && self.image_urls.is_empty()
    }
}

fn dedup<'a>(urls: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::new();
    for url in urls {
        if !unique.iter().any(|seen| seen == url) {
            unique.push(url.to_owned());
        }
    }
    unique
}
