//! Cron-driven repeat runs.
//!
//! Without a schedule the binary runs the pipeline once and exits. With one,
//! it sleeps until each upcoming fire time and runs again. Runs never
//! overlap: the next fire time is computed after the previous run returns.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::pipeline::{Orchestrator, RunReport};

/// Parse a cron expression (seconds field first, as the `cron` crate expects).
pub fn parse_schedule(expr: &str) -> Result<cron::Schedule> {
    cron::Schedule::from_str(expr.trim())
        .map_err(|e| Error::Schedule(format!("invalid cron '{expr}': {e}")))
}

/// Next fire time strictly after `after`.
pub fn next_fire_after(schedule: &cron::Schedule, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.after(&after).next()
}

/// One run, with a fatal stage failure surfaced as `Error::Run`.
pub async fn run_once(orchestrator: &Orchestrator) -> Result<RunReport> {
    Ok(orchestrator.run().await?)
}

/// Run the orchestrator on every fire of `schedule`, forever.
///
/// Failed runs are logged and the loop keeps going. Returns only if the
/// schedule has no further fire times.
pub async fn run_on_schedule<F>(
    orchestrator: &Orchestrator,
    schedule: &cron::Schedule,
    mut on_report: F,
) -> Result<()>
where
    F: FnMut(&RunReport),
{
    loop {
        let now = Utc::now();
        let Some(next) = next_fire_after(schedule, now) else {
            info!("Schedule has no upcoming fire times; stopping");
            return Ok(());
        };

        let wait = (next - now).to_std().unwrap_or_default();
        info!(next = %next, wait_secs = wait.as_secs(), "Waiting for next digest run");
        tokio::time::sleep(wait).await;

        match run_once(orchestrator).await {
            Ok(report) => on_report(&report),
            Err(e) => error!(error = %e, "Scheduled digest run failed"),
        }
    }
}
