//! Article link sources.
//!
//! A `LinkSource` lists article URLs found in newsletter mail from one
//! sender. The IMAP implementation talks raw IMAP over TLS; link
//! extraction from parsed messages lives in `links`.

pub mod imap;
pub mod links;

pub use imap::{ImapConfig, ImapLinkSource};

use async_trait::async_trait;

use crate::error::SourceError;

/// Produces the ordered article links for a mail source.
#[async_trait]
pub trait LinkSource: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// List article links from mail sent by `source_id`, in mail order.
    async fn links(&self, source_id: &str) -> Result<Vec<String>, SourceError>;
}
