//! Bulk import orchestration across a date range.
//!
//! Each date runs an independent pipeline: skip-if-present, fetch, format,
//! write. Per-date errors are downgraded to recorded failures; the run
//! always completes, commits whatever succeeded in a single batched
//! commit, and persists the failure list for later retry.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::format::{format_note, ImportMode};
use crate::notes;
use crate::provider::{Fetcher, TranscriptSource};
use crate::repo::GitRepo;

/// Ranges longer than this run in parallel unless sequential mode is forced.
pub const PARALLEL_THRESHOLD: usize = 5;

/// A pacing pause is inserted after every this many completions.
const PACING_INTERVAL: usize = 10;

/// Outcome of one date's pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOutcome {
    /// File already present, fetch skipped
    Skipped,
    /// Fetched, formatted, and written
    Imported,
    /// No data from the provider, or the fetch/write failed
    Failed,
}

/// Aggregate over one orchestration invocation
#[derive(Debug, Clone, Default)]
pub struct ImportRun {
    /// Dates that ended in success (imported or skipped), in completion order
    pub successful: Vec<NaiveDate>,
    /// Dates that ended in failure, in completion order
    pub failed: Vec<NaiveDate>,
    /// Wall-clock time of the run
    pub elapsed: Duration,
}

impl ImportRun {
    fn record(&mut self, date: NaiveDate, outcome: DateOutcome) {
        match outcome {
            DateOutcome::Skipped | DateOutcome::Imported => self.successful.push(date),
            DateOutcome::Failed => self.failed.push(date),
        }
    }

    pub fn total(&self) -> usize {
        self.successful.len() + self.failed.len()
    }
}

/// Inter-request pacing, configurable so tests run without real sleeps.
#[derive(Debug, Clone)]
pub struct Pacing {
    /// Delay between sequential requests
    pub request_delay: Duration,
    /// Longer pause after every [`PACING_INTERVAL`]th request
    pub interval_pause: Duration,
    /// Pause after every [`PACING_INTERVAL`]th completion in parallel mode
    pub parallel_pause: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            request_delay: Duration::from_millis(500),
            interval_pause: Duration::from_secs(2),
            parallel_pause: Duration::from_secs(1),
        }
    }
}

impl Pacing {
    pub fn none() -> Self {
        Self {
            request_delay: Duration::ZERO,
            interval_pause: Duration::ZERO,
            parallel_pause: Duration::ZERO,
        }
    }
}

/// Drives the per-date pipeline over a set of dates.
pub struct Importer<S> {
    fetcher: Fetcher<S>,
    root: PathBuf,
    mode: ImportMode,
    pacing: Pacing,
}

impl<S: TranscriptSource + 'static> Importer<S> {
    pub fn new(fetcher: Fetcher<S>, root: PathBuf, mode: ImportMode) -> Self {
        Self {
            fetcher,
            root,
            mode,
            pacing: Pacing::default(),
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Run the per-date pipeline once.
    ///
    /// `skip_existing` is disabled on retry runs, where failed dates by
    /// definition have no file yet.
    pub async fn process_date(&self, date: NaiveDate, skip_existing: bool) -> DateOutcome {
        if skip_existing && notes::note_exists(&self.root, date) {
            info!(%date, "Note already exists, skipping");
            return DateOutcome::Skipped;
        }

        let record = match self.fetcher.fetch(date).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                info!(%date, "No data for date");
                return DateOutcome::Failed;
            }
            Err(e) => {
                warn!(%date, error = %e, "Fetch failed");
                return DateOutcome::Failed;
            }
        };

        let note = format_note(&record, date, self.mode, Local::now());

        match notes::write_note(&self.root, date, &note).await {
            Ok(path) => {
                info!(%date, path = %path.display(), "Saved note");
                DateOutcome::Imported
            }
            Err(e) => {
                error!(%date, error = %e, "Failed to write note");
                DateOutcome::Failed
            }
        }
    }

    /// Process a set of dates, choosing parallel mode for large ranges.
    pub async fn run(
        self: &Arc<Self>,
        dates: Vec<NaiveDate>,
        parallel: bool,
        workers: usize,
        skip_existing: bool,
    ) -> ImportRun {
        let started = Instant::now();

        let mut run = if parallel && dates.len() > PARALLEL_THRESHOLD {
            self.run_parallel(dates, workers, skip_existing).await
        } else {
            self.run_sequential(dates, skip_existing).await
        };

        run.elapsed = started.elapsed();
        run
    }

    async fn run_sequential(&self, dates: Vec<NaiveDate>, skip_existing: bool) -> ImportRun {
        let total = dates.len();
        let mut run = ImportRun::default();

        for (idx, date) in dates.into_iter().enumerate() {
            let outcome = self.process_date(date, skip_existing).await;
            run.record(date, outcome);

            let done = idx + 1;
            info!(progress = format!("{}/{}", done, total), "Processed date");

            if done < total {
                if done % PACING_INTERVAL == 0 {
                    tokio::time::sleep(self.pacing.interval_pause).await;
                } else {
                    tokio::time::sleep(self.pacing.request_delay).await;
                }
            }
        }

        run
    }

    /// Fixed-size worker pool pulling dates from a shared queue.
    ///
    /// No per-date ordering guarantee; the success/failure aggregate is
    /// appended behind a mutex since workers complete asynchronously.
    async fn run_parallel(
        self: &Arc<Self>,
        dates: Vec<NaiveDate>,
        workers: usize,
        skip_existing: bool,
    ) -> ImportRun {
        let queue = Arc::new(Mutex::new(VecDeque::from(dates)));
        let results = Arc::new(Mutex::new(ImportRun::default()));
        let completed = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..workers.max(1) {
            let importer = Arc::clone(self);
            let queue = Arc::clone(&queue);
            let results = Arc::clone(&results);
            let completed = Arc::clone(&completed);

            handles.push(tokio::spawn(async move {
                loop {
                    let date = { queue.lock().await.pop_front() };
                    let Some(date) = date else { break };

                    let outcome = importer.process_date(date, skip_existing).await;
                    results.lock().await.record(date, outcome);

                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    if done % PACING_INTERVAL == 0 {
                        tokio::time::sleep(importer.pacing.parallel_pause).await;
                    }
                }
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Import worker panicked");
            }
        }

        let run = results.lock().await.clone();
        run
    }
}

/// Expand an inclusive date range into one entry per calendar day.
pub fn expand_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = start;
    while current <= end {
        dates.push(current);
        match current.succ_opt() {
            Some(next) => current = next,
            None => break,
        }
    }
    dates
}

/// Commit message summarizing a bulk run.
fn commit_message(run: &ImportRun, start: NaiveDate, end: NaiveDate) -> String {
    format!(
        "Bulk import of Limitless data\n\n\
         Imported: {} days\n\
         Failed: {} days\n\
         Date Range: {} to {}\n\
         Duration: {:.1} seconds\n",
        run.successful.len(),
        run.failed.len(),
        start.format("%Y-%m-%d"),
        end.format("%Y-%m-%d"),
        run.elapsed.as_secs_f64(),
    )
}

/// Write the failure list (one date per line), or remove it when empty.
pub async fn persist_failures(path: &Path, failed: &[NaiveDate]) -> Result<()> {
    if failed.is_empty() {
        if path.exists() {
            tokio::fs::remove_file(path)
                .await
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
        return Ok(());
    }

    let lines: Vec<String> = failed
        .iter()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .collect();

    tokio::fs::write(path, lines.join("\n"))
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!(path = %path.display(), count = failed.len(), "Saved failed dates for retry");
    Ok(())
}

/// Read the persisted failure list. Missing file means nothing to retry.
pub async fn read_failures(path: &Path) -> Result<Vec<NaiveDate>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut dates = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match NaiveDate::parse_from_str(line, "%Y-%m-%d") {
            Ok(date) => dates.push(date),
            Err(_) => warn!(line, "Skipping unparseable entry in failure list"),
        }
    }

    Ok(dates)
}

/// Run a bulk import: ensure the repo is ready, process the range, commit
/// once, and persist any failures.
pub async fn bulk_import<S: TranscriptSource + 'static>(
    config: &Config,
    source: S,
    start: NaiveDate,
    end: NaiveDate,
    parallel: bool,
    workers: usize,
) -> Result<ImportRun> {
    let repo = GitRepo::new(&config.repo_path, config.clone_url());
    repo.ensure_ready()
        .await
        .context("Failed to prepare notes repository")?;

    let fetcher = Fetcher::from_config(source, config);
    let importer = Arc::new(Importer::new(
        fetcher,
        config.repo_path.clone(),
        ImportMode::Bulk,
    ));

    let dates = expand_range(start, end);
    info!(
        total = dates.len(),
        %start,
        %end,
        mode = if parallel { "parallel" } else { "sequential" },
        "Starting bulk import"
    );

    let run = importer.run(dates, parallel, workers, true).await;

    // Git errors are logged, never raised: the summary still prints.
    let message = commit_message(&run, start, end);
    if let Err(e) = repo.commit_and_push(&message).await {
        error!(error = %e, "Git error");
    }

    if let Err(e) = persist_failures(&config.failed_imports_path(), &run.failed).await {
        error!(error = %e, "Failed to persist failure list");
    }

    Ok(run)
}

/// Re-run the pipeline for every date in the persisted failure list,
/// then rewrite or remove the list based on the new outcome.
pub async fn retry_failed<S: TranscriptSource + 'static>(
    config: &Config,
    source: S,
) -> Result<ImportRun> {
    let path = config.failed_imports_path();
    let dates = read_failures(&path).await?;

    if dates.is_empty() {
        info!("No failed imports to retry");
        return Ok(ImportRun::default());
    }

    let repo = GitRepo::new(&config.repo_path, config.clone_url());
    repo.ensure_ready()
        .await
        .context("Failed to prepare notes repository")?;

    info!(count = dates.len(), "Retrying failed imports");

    let fetcher = Fetcher::from_config(source, config);
    let importer = Arc::new(Importer::new(
        fetcher,
        config.repo_path.clone(),
        ImportMode::Retry,
    ));

    // Failed dates have no file, so the skip check is bypassed
    let start = dates[0];
    let end = *dates.last().unwrap_or(&start);
    let run = importer.run(dates, false, 1, false).await;

    let message = commit_message(&run, start, end);
    if let Err(e) = repo.commit_and_push(&message).await {
        error!(error = %e, "Git error");
    }

    persist_failures(&path, &run.failed).await?;

    if run.failed.is_empty() {
        info!("All retries successful");
    }

    Ok(run)
}
