//! Article fetching and text extraction.

pub mod http;

pub use http::{FetcherConfig, HttpArticleFetcher};

use async_trait::async_trait;

use crate::error::FetchError;

/// Turns one article URL into extracted plain text.
#[async_trait]
pub trait ArticleFetcher: Send + Sync {
    /// Fetch `url` and return its readable text.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}
