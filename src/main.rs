use std::sync::Arc;

use anyhow::Context;
use tidal_digest::articles::{FetcherConfig, HttpArticleFetcher};
use tidal_digest::channels::create_notifier;
use tidal_digest::config::DigestConfig;
use tidal_digest::llm::{LlmSummarizer, create_provider};
use tidal_digest::pipeline::{Orchestrator, PipelineDeps, RunReport};
use tidal_digest::scheduler;
use tidal_digest::sources::ImapLinkSource;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    let config = DigestConfig::from_env().context("failed to load configuration")?;

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = init_tracing(config.log_dir.as_deref())?;

    eprintln!("📰 T.I.D.A.L v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Source: {}", config.pipeline.source_id);
    eprintln!("   Model: {}", config.llm.model);
    eprintln!(
        "   Notifier: {:?} → {}",
        config.notifier.kind(),
        config.pipeline.channel
    );
    match &config.schedule {
        Some(expr) => eprintln!("   Schedule: {expr}\n"),
        None => eprintln!("   Schedule: run once\n"),
    }

    // ── Collaborators ────────────────────────────────────────────────
    let links = Arc::new(ImapLinkSource::new(config.imap.clone()));
    let fetcher = Arc::new(
        HttpArticleFetcher::new(FetcherConfig::default())
            .context("failed to build article fetcher")?,
    );
    let llm = create_provider(&config.llm).context("failed to create LLM provider")?;
    let summarizer = Arc::new(LlmSummarizer::new(llm));
    let notifier = create_notifier(&config.notifier);

    let orchestrator = Orchestrator::new(
        config.pipeline.clone(),
        PipelineDeps {
            links,
            fetcher,
            summarizer,
            notifier,
        },
    );

    match config.schedule.as_deref() {
        Some(expr) => {
            let schedule = scheduler::parse_schedule(expr)?;
            scheduler::run_on_schedule(&orchestrator, &schedule, log_report).await?;
        }
        None => {
            let report = scheduler::run_once(&orchestrator).await?;
            log_report(&report);
        }
    }

    Ok(())
}

/// Console logging, plus a daily-rolling file when `log_dir` is set.
fn init_tracing(
    log_dir: Option<&std::path::Path>,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log dir {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "tidal-digest.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    Ok(guard)
}

fn log_report(report: &RunReport) {
    match serde_json::to_string(report) {
        Ok(json) => tracing::info!(report = %json, "Run report"),
        Err(e) => tracing::warn!(error = %e, "Failed to serialize run report"),
    }
}
