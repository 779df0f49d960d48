//! HTTP article fetcher: reqwest for transport, scraper for extraction.
//!
//! Static HTML only; pages that render their content with JavaScript come
//! back as `NoContent`.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::articles::ArticleFetcher;
use crate::error::{ConfigError, FetchError};

/// Browser-like User-Agent; many news sites reject obvious bots.
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Containers tried in order before falling back to `body`.
const MAIN_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role='main']",
    "#content",
    "#main",
    ".post-content",
    ".entry-content",
    ".article-body",
    ".content",
];

/// Text-bearing elements collected from the main container.
const TEXT_SELECTOR: &str = "h1, h2, h3, p, li, blockquote, pre";

/// Elements whose text never belongs to the article.
const BOILERPLATE_ANCESTORS: &[&str] = &[
    "nav", "header", "footer", "aside", "script", "style", "form",
];

/// HTTP client settings for article fetching.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub timeout: Duration,
    pub max_redirects: usize,
    /// Extracted text shorter than this is treated as no content.
    pub min_chars: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_redirects: 5,
            min_chars: 200,
        }
    }
}

/// Fetches article pages over HTTP and extracts their readable text.
pub struct HttpArticleFetcher {
    client: reqwest::Client,
    config: FetcherConfig,
}

impl HttpArticleFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, ConfigError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static("en-US,en;q=0.5"),
        );

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| ConfigError::Build {
                component: "article fetcher".into(),
                reason: e.to_string(),
            })?;

        Ok(Self { client, config })
    }

    async fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                    timeout: self.config.timeout,
                }
            } else {
                FetchError::Request {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| FetchError::Request {
            url: url.to_string(),
            reason: format!("failed to read body: {e}"),
        })
    }
}

#[async_trait]
impl ArticleFetcher for HttpArticleFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let html = self.fetch_html(url).await?;
        let text = extract_article_text(&html);

        if text.chars().count() < self.config.min_chars {
            return Err(FetchError::NoContent {
                url: url.to_string(),
            });
        }

        debug!(url, chars = text.len(), "Extracted article");
        Ok(text)
    }
}

// ── Extraction ──────────────────────────────────────────────────────

/// Extract readable text from an HTML page.
///
/// Picks the first matching main-content container (falling back to
/// `body`), then joins its headings, paragraphs and list items with blank
/// lines, skipping anything inside navigation or page chrome.
pub fn extract_article_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let container = MAIN_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|sel| document.select(&sel).next())
        .or_else(|| {
            Selector::parse("body")
                .ok()
                .and_then(|sel| document.select(&sel).next())
        });

    let Some(container) = container else {
        return String::new();
    };

    let Ok(text_selector) = Selector::parse(TEXT_SELECTOR) else {
        return String::new();
    };

    let mut blocks: Vec<String> = Vec::new();
    for element in container.select(&text_selector) {
        if in_boilerplate(&element, &container) || has_text_ancestor(&element, &container) {
            continue;
        }
        let text = normalize_whitespace(&element.text().collect::<String>());
        if !text.is_empty() {
            blocks.push(text);
        }
    }

    blocks.join("\n\n")
}

/// Page chrome between `element` and the container. Wrappers above the
/// container (an ASP.NET page-wide `<form>`) do not count.
fn in_boilerplate(element: &ElementRef, container: &ElementRef) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take_while(|a| a.id() != container.id())
        .any(|a| {
            let name = a.value().name();
            BOILERPLATE_ANCESTORS.iter().any(|b| *b == name)
        })
}

/// A `p` inside an `li` (or similar) is already covered by the outer block.
fn has_text_ancestor(element: &ElementRef, container: &ElementRef) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take_while(|a| a.id() != container.id())
        .any(|a| matches!(a.value().name(), "p" | "li" | "blockquote" | "pre"))
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
