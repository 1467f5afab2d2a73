//! Daily sync and the periodic scheduler.
//!
//! The daily path fetches one date, writes its note, and commits
//! immediately (one commit per date, unlike the batched bulk import).
//! The scheduler wakes once a minute and fires the daily sync at the
//! configured local time, running until the process is terminated.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{error, info};

use crate::config::Config;
use crate::format::ImportMode;
use crate::import::{DateOutcome, Importer, Pacing};
use crate::provider::{Fetcher, LimitlessClient, TranscriptSource};
use crate::repo::GitRepo;

/// How often the scheduler loop checks whether the next run is due.
const POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Delay between requests during a historical back-sync.
const HISTORICAL_DELAY: Duration = Duration::from_secs(1);

/// Sync a single date: fetch, format, write, and commit.
///
/// The existing-file skip is bypassed so that re-running during the day
/// refreshes today's note.
pub async fn sync_date<S: TranscriptSource + 'static>(
    config: &Config,
    source: S,
    date: NaiveDate,
) -> Result<DateOutcome> {
    let repo = GitRepo::new(&config.repo_path, config.clone_url());
    repo.ensure_ready()
        .await
        .context("Failed to prepare notes repository")?;

    let fetcher = Fetcher::from_config(source, config);
    let importer = Importer::new(fetcher, config.repo_path.clone(), ImportMode::Daily);

    let outcome = importer.process_date(date, false).await;

    if outcome == DateOutcome::Imported {
        let message = format!("Add daily notes for {}", date.format("%Y-%m-%d"));
        if let Err(e) = repo.commit_and_push(&message).await {
            error!(error = %e, "Git error");
        }
    } else {
        info!(%date, "No data received, nothing to commit");
    }

    Ok(outcome)
}

/// Sync the past `days_back` days, newest first, committing per date.
pub async fn sync_historical<S: TranscriptSource + 'static>(
    config: &Config,
    source: S,
    days_back: u32,
) -> Result<Vec<(NaiveDate, DateOutcome)>> {
    let repo = GitRepo::new(&config.repo_path, config.clone_url());
    repo.ensure_ready()
        .await
        .context("Failed to prepare notes repository")?;

    info!(days_back, "Syncing historical data");

    let fetcher = Fetcher::from_config(source, config);
    let importer = Importer::new(fetcher, config.repo_path.clone(), ImportMode::Daily)
        .with_pacing(Pacing::none());

    let today = Local::now().date_naive();
    let mut outcomes = Vec::new();

    for offset in 0..days_back {
        let Some(date) = today.checked_sub_days(chrono::Days::new(offset as u64)) else {
            break;
        };

        let outcome = importer.process_date(date, false).await;

        if outcome == DateOutcome::Imported {
            let message = format!("Add daily notes for {}", date.format("%Y-%m-%d"));
            if let Err(e) = repo.commit_and_push(&message).await {
                error!(error = %e, "Git error");
            }
        }

        outcomes.push((date, outcome));
        tokio::time::sleep(HISTORICAL_DELAY).await;
    }

    Ok(outcomes)
}

/// Run the daily sync now, then keep firing it at the configured time.
///
/// Stopped only by process termination (Ctrl+C is handled for a clean
/// exit message).
pub async fn run_scheduler(config: &Config) -> Result<()> {
    // First run immediately, matching the original behavior
    let source = LimitlessClient::new(config);
    if let Err(e) = sync_date(config, source, Local::now().date_naive()).await {
        error!(error = %e, "Daily sync failed");
    }

    let mut next_run = next_occurrence(Local::now().naive_local(), config.daily_at);
    info!(%next_run, "Scheduler started, press Ctrl+C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Scheduler stopped");
                return Ok(());
            }
            _ = tokio::time::sleep(POLL_INTERVAL) => {
                if Local::now().naive_local() >= next_run {
                    info!("Scheduled daily sync firing");
                    let source = LimitlessClient::new(config);
                    if let Err(e) = sync_date(config, source, Local::now().date_naive()).await {
                        error!(error = %e, "Daily sync failed");
                    }
                    next_run = next_occurrence(Local::now().naive_local(), config.daily_at);
                    info!(%next_run, "Next sync scheduled");
                }
            }
        }
    }
}

/// The next wall-clock moment at `at`, strictly after `now`.
fn next_occurrence(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today_at = now.date().and_time(at);
    if today_at > now {
        today_at
    } else {
        today_at + chrono::Duration::days(1)
    }
}
