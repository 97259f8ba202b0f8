//! HTTP retrieval of job pages and poster images.
//!
//! Every failure (transport error, non-success status, timeout, oversized
//! image) is logged and surfaced as `None`; nothing here propagates an
//! error past the adapter boundary.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use scraper::{Html, Node};
use tracing::{info, warn};

use crate::{AppError, Result};

const USER_AGENT: &str = concat!(
    "job-caster/",
    env!("CARGO_PKG_VERSION"),
    " (+https://github.com/la-commu/job-caster)"
);

/// Elements whose text never reaches the extractor.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "svg", "img", "template"];

/// Retrieves page text and image bytes for the extraction stage.
pub trait Fetcher: Send + Sync {
    /// Fetch a page and return its visible text, or `None` on any failure.
    fn fetch_page_text(&self, url: &str) -> Pin<Box<dyn Future<Output = Option<String>> + Send + '_>>;

    /// Fetch an image, or `None` on failure or when it exceeds the size cap.
    fn fetch_image_bytes(&self, url: &str) -> Pin<Box<dyn Future<Output = Option<Bytes>> + Send + '_>>;
}

/// `reqwest`-backed [`Fetcher`] with a per-request timeout and byte caps.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_page_bytes: usize,
    max_image_bytes: usize,
}

impl HttpFetcher {
    /// Build a fetcher.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Fetch` if the HTTP client cannot be constructed.
    pub fn new(timeout: Duration, max_page_bytes: usize, max_image_bytes: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::Fetch(format!("failed to build http client: {err}")))?;
        Ok(Self {
            client,
            max_page_bytes,
            max_image_bytes,
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self.client.get(url).send().await?;
        Ok(response.error_for_status()?)
    }

    async fn page_text(&self, url: String) -> Option<String> {
        info!(%url, "fetching page");
        let response = match self.get(&url).await {
            Ok(response) => response,
            Err(err) => {
                warn!(%url, %err, "failed to fetch page");
                return None;
            }
        };

        let (body, truncated) = match read_capped(response, self.max_page_bytes).await {
            Ok(read) => read,
            Err(err) => {
                warn!(%url, %err, "failed to read page body");
                return None;
            }
        };
        if truncated {
            info!(%url, max_bytes = self.max_page_bytes, "trimmed page content");
        }

        let body = if truncated { trim_partial_char(&body) } else { &body[..] };
        let html = String::from_utf8_lossy(body);
        let text = extract_visible_text(&html);
        if text.is_empty() {
            warn!(%url, "empty text after parsing page");
            return None;
        }
        info!(%url, chars = text.len(), "extracted page text");
        Some(text)
    }

    async fn image_bytes(&self, url: String) -> Option<Bytes> {
        info!(%url, "fetching image");
        let response = match self.get(&url).await {
            Ok(response) => response,
            Err(err) => {
                warn!(%url, %err, "failed to fetch image");
                return None;
            }
        };

        match read_capped(response, self.max_image_bytes).await {
            Ok((_, true)) => {
                warn!(%url, max_bytes = self.max_image_bytes, "image exceeds size limit");
                None
            }
            Ok((body, false)) => {
                info!(%url, bytes = body.len(), "retrieved image");
                Some(body.freeze())
            }
            Err(err) => {
                warn!(%url, %err, "failed to read image body");
                None
            }
        }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch_page_text(&self, url: &str) -> Pin<Box<dyn Future<Output = Option<String>> + Send + '_>> {
        Box::pin(self.page_text(url.to_owned()))
    }

    fn fetch_image_bytes(&self, url: &str) -> Pin<Box<dyn Future<Output = Option<Bytes>> + Send + '_>> {
        Box::pin(self.image_bytes(url.to_owned()))
    }
}

/// Stream a response body, stopping once `max_bytes` is reached.
///
/// Returns the body (at most `max_bytes` long) and whether anything was
/// cut off.
async fn read_capped(mut response: reqwest::Response, max_bytes: usize) -> Result<(BytesMut, bool)> {
    let mut body = BytesMut::new();
    while let Some(chunk) = response.chunk().await? {
        let remaining = max_bytes.saturating_sub(body.len());
        if chunk.len() > remaining {
            body.extend_from_slice(&chunk[..remaining]);
            return Ok((body, true));
        }
        body.extend_from_slice(&chunk);
    }
    Ok((body, false))
}

/// Drop a trailing multi-byte character left incomplete by the size cap.
fn trim_partial_char(body: &[u8]) -> &[u8] {
    let tail_start = body.len().saturating_sub(3);
    let Some(lead) = body[tail_start..].iter().rposition(|byte| byte & 0xC0 != 0x80) else {
        return body;
    };
    let lead = tail_start + lead;
    match std::str::from_utf8(&body[lead..]) {
        Err(err) if err.error_len().is_none() => &body[..lead],
        _ => body,
    }
}

/// Visible text of an HTML document: script/style/media content removed,
/// each line trimmed, blank lines dropped.
#[must_use]
pub fn extract_visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut lines: Vec<&str> = Vec::new();

    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| match ancestor.value() {
            Node::Element(element) => HIDDEN_ELEMENTS.contains(&element.name()),
            _ => false,
        });
        if hidden {
            continue;
        }
        lines.extend(text.lines().map(str::trim).filter(|line| !line.is_empty()));
    }

    lines.join("\n")
}
