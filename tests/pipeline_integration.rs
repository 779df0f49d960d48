//! End-to-end digest runs against a local HTTP server.
//!
//! Each test serves article pages from a throwaway listener on a random
//! port, so the real `HttpArticleFetcher` and `LlmSummarizer` are exercised.
//! Only the mailbox, the model and the chat transport are stubbed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::timeout;

use tidal_digest::articles::{FetcherConfig, HttpArticleFetcher};
use tidal_digest::channels::Notifier;
use tidal_digest::config::PipelineConfig;
use tidal_digest::error::{DeliveryError, LlmError, SourceError};
use tidal_digest::llm::{LlmProvider, LlmSummarizer};
use tidal_digest::pipeline::{DigestOutcome, FatalPolicy, Orchestrator, PipelineDeps, RunStage};
use tidal_digest::sources::LinkSource;

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

fn article_page(title: &str, body: &str) -> String {
    format!(
        "<html><head><title>{title}</title></head><body>\
         <nav><a href=\"/\">Home</a> <a href=\"/about\">About</a></nav>\
         <article><h1>{title}</h1><p>{body}</p></article>\
         <footer>Copyright newsroom</footer></body></html>"
    )
}

/// Serve `path -> html` over plain HTTP/1.1; unknown paths get a 404.
async fn serve(pages: HashMap<&'static str, String>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let pages = Arc::new(pages);

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let pages = pages.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let mut read = 0;
                loop {
                    let Ok(n) = socket.read(&mut buf[read..]).await else {
                        return;
                    };
                    read += n;
                    if n == 0 || buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                let request = String::from_utf8_lossy(&buf[..read]);
                let path = request.split_whitespace().nth(1).unwrap_or("/");

                let (status, body) = match pages.get(path) {
                    Some(html) => ("200 OK", html.clone()),
                    None => ("404 Not Found", "not found".to_string()),
                };
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{addr}")
}

struct StaticLinks(Vec<String>);

#[async_trait]
impl LinkSource for StaticLinks {
    fn name(&self) -> &str {
        "static"
    }

    async fn links(&self, _source_id: &str) -> Result<Vec<String>, SourceError> {
        Ok(self.0.clone())
    }
}

struct DownSource;

#[async_trait]
impl LinkSource for DownSource {
    fn name(&self) -> &str {
        "down"
    }

    async fn links(&self, _source_id: &str) -> Result<Vec<String>, SourceError> {
        Err(SourceError::LoginFailed {
            username: "digest@example.com".into(),
        })
    }
}

/// Echoes the first line of the article body back as its summary.
struct HeadlineLlm;

#[async_trait]
impl LlmProvider for HeadlineLlm {
    fn provider_name(&self) -> &str {
        "stub"
    }

    fn model_name(&self) -> &str {
        "headline"
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let headline = prompt
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty() && !l.starts_with("Summarize"))
            .unwrap_or_default();
        Ok(format!("Summary: {headline}"))
    }
}

#[derive(Default)]
struct ChatLog {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Notifier for ChatLog {
    fn name(&self) -> &str {
        "chat-log"
    }

    async fn send(&self, channel: &str, message: &str) -> Result<(), DeliveryError> {
        self.sent
            .lock()
            .unwrap()
            .push((channel.to_string(), message.to_string()));
        Ok(())
    }
}

impl ChatLog {
    fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, m)| m.clone()).collect()
    }
}

fn pipeline_config() -> PipelineConfig {
    PipelineConfig {
        channel: "#tech".into(),
        lead_in: "Good morning! Today's tech digest:".into(),
        nothing_found: "Nothing today.".into(),
        failure_notice: "Digest failed.".into(),
        ..PipelineConfig::default()
    }
}

fn orchestrator(
    config: PipelineConfig,
    links: Arc<dyn LinkSource>,
    notifier: Arc<ChatLog>,
) -> Orchestrator {
    let fetcher = HttpArticleFetcher::new(FetcherConfig {
        timeout: Duration::from_secs(5),
        ..FetcherConfig::default()
    })
    .unwrap();

    Orchestrator::new(
        config,
        PipelineDeps {
            links,
            fetcher: Arc::new(fetcher),
            summarizer: Arc::new(LlmSummarizer::new(Arc::new(HeadlineLlm))),
            notifier,
        },
    )
}

#[tokio::test]
async fn full_run_delivers_digest_in_link_order() {
    let filler = "The release ships a faster compiler and a new borrow checker. ".repeat(6);
    let base = serve(HashMap::from([
        ("/rust", article_page("Rust 2.0 released", &filler)),
        ("/gpu", article_page("GPU prices fall", &filler)),
    ]))
    .await;

    let links = Arc::new(StaticLinks(vec![
        format!("{base}/rust"),
        format!("{base}/gone"),
        format!("{base}/gpu"),
    ]));
    let chat = Arc::new(ChatLog::default());
    let orch = orchestrator(
        PipelineConfig {
            fetch_concurrency: 2,
            ..pipeline_config()
        },
        links,
        chat.clone(),
    );

    let report = timeout(TEST_TIMEOUT, orch.run()).await.unwrap().unwrap();

    assert_eq!(
        chat.messages(),
        vec![
            "Good morning! Today's tech digest:".to_string(),
            "Summary: Rust 2.0 released".to_string(),
            "Summary: GPU prices fall".to_string(),
        ]
    );
    assert!(chat.sent.lock().unwrap().iter().all(|(c, _)| c == "#tech"));
    assert_eq!(report.links_found, 3);
    assert_eq!(report.articles_fetched, 2);
    assert_eq!(report.fetch_failures.len(), 1);
    assert!(report.fetch_failures[0].url.ends_with("/gone"));
    assert_eq!(report.outcome, Some(DigestOutcome::Delivered { summaries: 2 }));
}

#[tokio::test]
async fn thin_pages_yield_nothing_found() {
    let base = serve(HashMap::from([(
        "/stub",
        article_page("Teaser", "Subscribe to read more."),
    )]))
    .await;

    let chat = Arc::new(ChatLog::default());
    let orch = orchestrator(
        pipeline_config(),
        Arc::new(StaticLinks(vec![format!("{base}/stub")])),
        chat.clone(),
    );

    let report = timeout(TEST_TIMEOUT, orch.run()).await.unwrap().unwrap();
    assert_eq!(chat.messages(), vec!["Nothing today.".to_string()]);
    assert_eq!(report.outcome, Some(DigestOutcome::NothingFound));
    assert_eq!(report.fetch_failures.len(), 1);
}

#[tokio::test]
async fn source_outage_sends_failure_notice_when_enabled() {
    let chat = Arc::new(ChatLog::default());
    let orch = orchestrator(
        PipelineConfig {
            on_fatal: FatalPolicy::Notify,
            ..pipeline_config()
        },
        Arc::new(DownSource),
        chat.clone(),
    );

    let err = timeout(TEST_TIMEOUT, orch.run()).await.unwrap().unwrap_err();
    assert_eq!(err.stage, RunStage::FetchLinks);
    assert!(err.to_string().contains("digest@example.com"));
    assert_eq!(chat.messages(), vec!["Digest failed.".to_string()]);
}

#[tokio::test]
async fn oversized_batch_is_trimmed_from_the_tail() {
    // ~3000 estimated tokens per article; only one fits the default budget
    let long = "Benchmarks show steady gains across workloads. ".repeat(260);
    let base = serve(HashMap::from([
        ("/first", article_page("First story", &long)),
        ("/second", article_page("Second story", &long)),
    ]))
    .await;

    let chat = Arc::new(ChatLog::default());
    let orch = orchestrator(
        pipeline_config(),
        Arc::new(StaticLinks(vec![
            format!("{base}/first"),
            format!("{base}/second"),
        ])),
        chat.clone(),
    );

    let report = timeout(TEST_TIMEOUT, orch.run()).await.unwrap().unwrap();
    assert_eq!(report.articles_fetched, 2);
    assert_eq!(report.articles_kept, 1);
    assert_eq!(report.articles_dropped, 1);
    assert_eq!(
        chat.messages(),
        vec![
            "Good morning! Today's tech digest:".to_string(),
            "Summary: First story".to_string(),
        ]
    );
}
