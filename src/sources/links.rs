//! Link extraction from newsletter mail.
//!
//! Pure string work on already-parsed messages: pull `href` targets out of
//! the HTML body (or bare URLs out of the text body), drop list-management
//! and tracking links, dedupe while keeping first-seen order.

use std::collections::HashSet;

use mail_parser::Message;
use regex::Regex;
use url::Url;

/// Substrings that mark a link as newsletter plumbing rather than an article.
const SKIP_PATTERNS: &[&str] = &[
    "unsubscribe",
    "list-manage",
    "manage-subscription",
    "preferences",
    "view-in-browser",
    "/track/open",
    "/advertise",
    "/privacy",
];

/// File extensions that are never articles.
const SKIP_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".ico"];

/// Extracts candidate article links from mail bodies.
pub struct LinkExtractor {
    href: Regex,
    bare_url: Regex,
    skip_patterns: Vec<String>,
}

impl LinkExtractor {
    /// Extractor with the built-in skip list.
    pub fn default_rules() -> Self {
        Self {
            href: Regex::new(r#"(?i)href\s*=\s*["']([^"']+)["']"#).unwrap(),
            bare_url: Regex::new(r#"https?://[^\s<>"'\)\]]+"#).unwrap(),
            skip_patterns: SKIP_PATTERNS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Add extra skip substrings (matched case-insensitively).
    pub fn with_skip_patterns(mut self, patterns: impl IntoIterator<Item = String>) -> Self {
        self.skip_patterns
            .extend(patterns.into_iter().map(|p| p.to_lowercase()));
        self
    }

    /// Links from a parsed message: HTML hrefs if there is an HTML body,
    /// otherwise bare URLs from the text body.
    pub fn from_message(&self, message: &Message) -> Vec<String> {
        if let Some(html) = message.body_html(0) {
            let links = self.from_html(html.as_ref());
            if !links.is_empty() {
                return links;
            }
        }
        match message.body_text(0) {
            Some(text) => self.from_text(text.as_ref()),
            None => Vec::new(),
        }
    }

    /// `href` targets in an HTML fragment.
    pub fn from_html(&self, html: &str) -> Vec<String> {
        let candidates = self
            .href
            .captures_iter(html)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().replace("&amp;", "&"));
        self.filter(candidates)
    }

    /// Bare `http(s)://` URLs in plain text.
    pub fn from_text(&self, text: &str) -> Vec<String> {
        let candidates = self.bare_url.find_iter(text).map(|m| {
            m.as_str()
                .trim_end_matches(['.', ',', ';', ':', '!', '?'])
                .to_string()
        });
        self.filter(candidates)
    }

    /// Whether a URL looks like an article worth fetching.
    pub fn is_article_link(&self, link: &str) -> bool {
        let Ok(url) = Url::parse(link) else {
            return false;
        };
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return false;
        }
        let lower = link.to_lowercase();
        if self.skip_patterns.iter().any(|p| lower.contains(p.as_str())) {
            return false;
        }
        let path = url.path().to_lowercase();
        !SKIP_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
    }

    fn filter(&self, candidates: impl Iterator<Item = String>) -> Vec<String> {
        let mut seen = HashSet::new();
        candidates
            .map(|c| c.trim().to_string())
            .filter(|c| self.is_article_link(c))
            .filter(|c| seen.insert(c.clone()))
            .collect()
    }
}

impl Default for LinkExtractor {
    fn default() -> Self {
        Self::default_rules()
    }
}

/// Merge per-message link lists into one run-wide list, first occurrence wins.
pub fn merge_links(per_message: impl IntoIterator<Item = Vec<String>>) -> Vec<String> {
    let mut seen = HashSet::new();
    per_message
        .into_iter()
        .flatten()
        .filter(|link| seen.insert(link.clone()))
        .collect()
}
