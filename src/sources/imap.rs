//! IMAP link source: raw IMAP over TLS, one session per listing.
//!
//! Searches the inbox for unseen mail from the newsletter sender, parses
//! each message with mail-parser and hands it to the `LinkExtractor`.
//! The blocking socket work runs on `spawn_blocking`.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mail_parser::MessageParser;
use rustls_pki_types::ServerName;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::error::{ConfigError, SourceError};
use crate::sources::LinkSource;
use crate::sources::links::{LinkExtractor, merge_links};

/// Socket read timeout for IMAP responses.
const IMAP_READ_TIMEOUT: Duration = Duration::from_secs(30);

// ── Configuration ───────────────────────────────────────────────────

/// Mailbox connection settings.
#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub mailbox: String,
    /// Flag fetched newsletters `\Seen` so the next run skips them.
    pub mark_seen: bool,
    /// Extra link substrings to ignore on top of the built-in skip list.
    pub link_skip: Vec<String>,
}

impl ImapConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = require_env("EMAIL_IMAP_HOST")?;

        let port = match std::env::var("EMAIL_IMAP_PORT") {
            Ok(raw) => raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
                key: "EMAIL_IMAP_PORT".into(),
                message: format!("{e}"),
            })?,
            Err(_) => 993,
        };

        let username = require_env("EMAIL_USERNAME")?;
        let password = SecretString::from(require_env("EMAIL_PASSWORD")?);

        let mailbox = std::env::var("EMAIL_MAILBOX").unwrap_or_else(|_| "INBOX".to_string());

        let mark_seen = std::env::var("EMAIL_MARK_SEEN")
            .map(|v| !matches!(v.trim().to_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(true);

        let link_skip = std::env::var("EMAIL_LINK_SKIP")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            host,
            port,
            username,
            password,
            mailbox,
            mark_seen,
            link_skip,
        })
    }
}

fn require_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

// ── Link source ─────────────────────────────────────────────────────

/// Lists article links from newsletter mail in an IMAP inbox.
pub struct ImapLinkSource {
    config: ImapConfig,
    extractor: Arc<LinkExtractor>,
}

impl ImapLinkSource {
    pub fn new(config: ImapConfig) -> Self {
        let extractor =
            LinkExtractor::default_rules().with_skip_patterns(config.link_skip.iter().cloned());
        Self {
            config,
            extractor: Arc::new(extractor),
        }
    }
}

#[async_trait]
impl LinkSource for ImapLinkSource {
    fn name(&self) -> &str {
        "imap"
    }

    async fn links(&self, source_id: &str) -> Result<Vec<String>, SourceError> {
        let config = self.config.clone();
        let sender = source_id.to_string();

        let raw_messages =
            tokio::task::spawn_blocking(move || fetch_unseen_from(&config, &sender))
                .await
                .map_err(|e| SourceError::Unavailable {
                    host: self.config.host.clone(),
                    reason: format!("IMAP task panicked: {e}"),
                })??;

        let parser = MessageParser::default();
        let mut per_message = Vec::with_capacity(raw_messages.len());
        for raw in &raw_messages {
            match parser.parse(raw.as_slice()) {
                Some(parsed) => {
                    let links = self.extractor.from_message(&parsed);
                    debug!(
                        subject = parsed.subject().unwrap_or("(no subject)"),
                        links = links.len(),
                        "Extracted links from newsletter"
                    );
                    per_message.push(links);
                }
                None => warn!(bytes = raw.len(), "Skipping unparseable message"),
            }
        }

        let links = merge_links(per_message);
        info!(
            sender = %source_id,
            messages = raw_messages.len(),
            links = links.len(),
            "Listed newsletter links"
        );
        Ok(links)
    }
}

// ── IMAP session ────────────────────────────────────────────────────

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// One tagged command's response: text lines plus any `{n}` literals.
#[derive(Debug, Default)]
struct Response {
    lines: Vec<String>,
    literals: Vec<Vec<u8>>,
}

/// A tagged-command IMAP session (blocking).
struct ImapSession<S> {
    stream: S,
    host: String,
    tag_counter: u32,
}

impl ImapSession<TlsStream> {
    fn connect(config: &ImapConfig) -> Result<Self, SourceError> {
        let unavailable = |reason: String| SourceError::Unavailable {
            host: config.host.clone(),
            reason,
        };

        let tcp = TcpStream::connect((config.host.as_str(), config.port))
            .map_err(|e| unavailable(format!("connect failed: {e}")))?;
        tcp.set_read_timeout(Some(IMAP_READ_TIMEOUT))
            .map_err(|e| unavailable(format!("set timeout failed: {e}")))?;

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );
        let server_name = ServerName::try_from(config.host.clone())
            .map_err(|e| unavailable(format!("invalid server name: {e}")))?;
        let conn = rustls::ClientConnection::new(tls_config, server_name)
            .map_err(|e| unavailable(format!("TLS setup failed: {e}")))?;

        let mut session = Self::new(rustls::StreamOwned::new(conn, tcp), &config.host);

        // Greeting
        session.read_line()?;
        Ok(session)
    }
}

impl<S: Read + Write> ImapSession<S> {
    fn new(stream: S, host: &str) -> Self {
        Self {
            stream,
            host: host.to_string(),
            tag_counter: 0,
        }
    }

    fn read_line(&mut self) -> Result<String, SourceError> {
        let mut buf = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            match self.stream.read(&mut byte) {
                Ok(0) => return Err(self.unavailable("connection closed".into())),
                Ok(_) => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        return Ok(String::from_utf8_lossy(&buf).to_string());
                    }
                }
                Err(e) => return Err(self.unavailable(format!("read failed: {e}"))),
            }
        }
    }

    fn read_literal(&mut self, len: usize) -> Result<Vec<u8>, SourceError> {
        let mut buf = vec![0u8; len];
        if let Err(e) = self.stream.read_exact(&mut buf) {
            return Err(self.unavailable(format!("literal read failed: {e}")));
        }
        Ok(buf)
    }

    /// Send a command and collect its response up to the tagged status line.
    ///
    /// A line ending in `{n}` announces an `n`-byte literal, which is read
    /// verbatim so message content never reaches the tag matcher.
    fn command(&mut self, cmd: &str) -> Result<Response, SourceError> {
        self.tag_counter += 1;
        let tag = format!("A{} ", self.tag_counter);
        let full = format!("{tag}{cmd}\r\n");
        if let Err(e) = self.stream.write_all(full.as_bytes()) {
            return Err(self.unavailable(format!("write failed: {e}")));
        }
        if let Err(e) = self.stream.flush() {
            return Err(self.unavailable(format!("flush failed: {e}")));
        }

        let mut response = Response::default();
        loop {
            let line = self.read_line()?;
            if let Some(len) = literal_len(&line) {
                let literal = self.read_literal(len)?;
                response.literals.push(literal);
                response.lines.push(line);
                continue;
            }
            let done = line.starts_with(&tag);
            response.lines.push(line);
            if done {
                return Ok(response);
            }
        }
    }

    /// Like `command`, but the tagged status line must be `OK`.
    fn command_ok(&mut self, cmd: &str) -> Result<Response, SourceError> {
        let response = self.command(cmd)?;
        if tagged_ok(&response.lines) {
            Ok(response)
        } else {
            let status = response
                .lines
                .last()
                .map(|l| l.trim().to_string())
                .unwrap_or_default();
            Err(SourceError::Protocol(format!(
                "{} rejected: {status}",
                cmd.split_whitespace().next().unwrap_or(cmd)
            )))
        }
    }

    fn unavailable(&self, reason: String) -> SourceError {
        SourceError::Unavailable {
            host: self.host.clone(),
            reason,
        }
    }
}

/// Byte count of a literal announced at the end of `line` (`... {42}\r\n`).
fn literal_len(line: &str) -> Option<usize> {
    let rest = line.trim_end_matches("\r\n").strip_suffix('}')?;
    let open = rest.rfind('{')?;
    rest[open + 1..].trim_end_matches('+').parse().ok()
}

/// Whether the final (tagged) response line reports `OK`.
fn tagged_ok(lines: &[String]) -> bool {
    lines
        .last()
        .and_then(|l| l.split_whitespace().nth(1))
        .is_some_and(|status| status.eq_ignore_ascii_case("OK"))
}

/// Parse message sequence numbers out of `* SEARCH` response lines.
fn parse_search(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter(|l| l.starts_with("* SEARCH"))
        .flat_map(|l| l.split_whitespace().skip(2).map(str::to_string))
        .collect()
}

/// Quote a string for an IMAP command argument.
fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Fetch unseen messages from `sender` as raw RFC822 bytes, oldest first.
fn fetch_unseen_from(config: &ImapConfig, sender: &str) -> Result<Vec<Vec<u8>>, SourceError> {
    let mut session = ImapSession::connect(config)?;
    fetch_unseen(&mut session, config, sender)
}

/// The mailbox conversation after the greeting.
///
/// Bodies are fetched with `BODY.PEEK[]` so the server leaves `\Seen`
/// alone; only the explicit `STORE` marks mail read.
fn fetch_unseen<S: Read + Write>(
    session: &mut ImapSession<S>,
    config: &ImapConfig,
    sender: &str,
) -> Result<Vec<Vec<u8>>, SourceError> {
    let login = session.command(&format!(
        "LOGIN {} {}",
        quote(&config.username),
        quote(config.password.expose_secret())
    ))?;
    if !tagged_ok(&login.lines) {
        return Err(SourceError::LoginFailed {
            username: config.username.clone(),
        });
    }

    session.command_ok(&format!("SELECT {}", quote(&config.mailbox)))?;

    let search = session.command_ok(&format!("SEARCH UNSEEN FROM {}", quote(sender)))?;
    let ids = parse_search(&search.lines);
    debug!(count = ids.len(), sender, "Found unseen newsletters");

    let mut messages = Vec::with_capacity(ids.len());
    for id in &ids {
        let fetched = session.command_ok(&format!("FETCH {id} BODY.PEEK[]"))?;
        let Some(body) = fetched.literals.into_iter().next() else {
            warn!(id = %id, "FETCH returned no message body");
            continue;
        };
        messages.push(body);

        if config.mark_seen
            && let Err(e) = session.command_ok(&format!("STORE {id} +FLAGS (\\Seen)"))
        {
            warn!(id = %id, error = %e, "Failed to mark newsletter seen");
        }
    }

    let _ = session.command("LOGOUT");
    Ok(messages)
}
