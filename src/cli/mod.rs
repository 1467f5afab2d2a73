//! Command-line interface for lifelog-sync.
//!
//! Provides commands for bulk-importing historical date ranges, running
//! the daily sync (once, historically, or on the daily schedule), and
//! inspecting the resolved configuration.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};

use crate::config::{Config, PLACEHOLDER_API_KEY, PLACEHOLDER_GITHUB_TOKEN};
use crate::import::{self, ImportRun};
use crate::provider::LimitlessClient;
use crate::sync;

/// Default import window when no range is given (original fallback:
/// the provider's available-dates endpoint is unreliable).
const DEFAULT_DAYS_BACK: u32 = 365;

/// lifelog-sync - Limitless transcripts to a date-organized git notes archive
#[derive(Parser, Debug)]
#[command(name = "lifelog-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bulk import a historical date range
    Import {
        /// Start date (YYYY-MM-DD). Default: one year back
        #[arg(long)]
        start_date: Option<String>,

        /// End date (YYYY-MM-DD). Default: today
        #[arg(long)]
        end_date: Option<String>,

        /// Alternative: import the last N days
        #[arg(long, conflicts_with_all = ["start_date", "end_date"])]
        days_back: Option<u32>,

        /// Use sequential processing instead of parallel
        #[arg(long)]
        sequential: bool,

        /// Number of parallel workers (defaults to the configured pool size)
        #[arg(long)]
        workers: Option<usize>,

        /// Retry previously failed imports instead of a fresh range
        #[arg(long)]
        retry_failed: bool,
    },

    /// Daily sync: run once, back-fill, or stay on the daily schedule
    Sync {
        /// Run once and exit
        #[arg(long)]
        once: bool,

        /// Sync the past N days, then exit
        #[arg(long, conflicts_with = "once")]
        historical: Option<u32>,
    },

    /// Show resolved configuration (secrets redacted)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self, config: &Config) -> Result<()> {
        match self.command {
            Commands::Import {
                start_date,
                end_date,
                days_back,
                sequential,
                workers,
                retry_failed,
            } => {
                if retry_failed {
                    run_retry(config).await
                } else {
                    run_import(config, start_date, end_date, days_back, sequential, workers).await
                }
            }
            Commands::Sync { once, historical } => {
                if let Some(days) = historical {
                    run_historical(config, days).await
                } else if once {
                    run_sync_once(config).await
                } else {
                    sync::run_scheduler(config).await
                }
            }
            Commands::Config => show_config(config),
        }
    }
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", value))
}

/// Resolve the import range from the flags.
fn resolve_range(
    start_date: Option<String>,
    end_date: Option<String>,
    days_back: Option<u32>,
) -> Result<(NaiveDate, NaiveDate)> {
    let today = Local::now().date_naive();

    if let Some(days) = days_back {
        let start = today
            .checked_sub_days(chrono::Days::new(days as u64))
            .context("days-back is out of range")?;
        return Ok((start, today));
    }

    let end = match end_date {
        Some(value) => parse_date(&value)?,
        None => today,
    };
    let start = match start_date {
        Some(value) => parse_date(&value)?,
        None => end
            .checked_sub_days(chrono::Days::new(DEFAULT_DAYS_BACK as u64))
            .context("default range is out of range")?,
    };

    if start > end {
        anyhow::bail!("Start date {} is after end date {}", start, end);
    }

    Ok((start, end))
}

/// Run a bulk import over the resolved range
async fn run_import(
    config: &Config,
    start_date: Option<String>,
    end_date: Option<String>,
    days_back: Option<u32>,
    sequential: bool,
    workers: Option<usize>,
) -> Result<()> {
    let (start, end) = resolve_range(start_date, end_date, days_back)?;
    let workers = workers.unwrap_or(config.workers);

    println!("Date range: {} to {}", start, end);
    println!(
        "Mode: {}",
        if sequential {
            "sequential".to_string()
        } else {
            format!("parallel ({} workers)", workers)
        }
    );

    let source = LimitlessClient::new(config);
    let run = import::bulk_import(config, source, start, end, !sequential, workers).await?;

    print_summary(config, &run);
    Ok(())
}

/// Retry previously failed imports
async fn run_retry(config: &Config) -> Result<()> {
    let source = LimitlessClient::new(config);
    let run = import::retry_failed(config, source).await?;

    if run.total() == 0 {
        println!("No failed imports to retry");
        return Ok(());
    }

    print_summary(config, &run);
    if run.failed.is_empty() {
        println!("All retries successful!");
    }
    Ok(())
}

/// Sync today's transcript once
async fn run_sync_once(config: &Config) -> Result<()> {
    let today = Local::now().date_naive();
    println!("Syncing daily notes for {}", today);

    let source = LimitlessClient::new(config);
    let outcome = sync::sync_date(config, source, today).await?;

    match outcome {
        crate::import::DateOutcome::Imported => println!("✓ Synced {}", today),
        _ => println!("No data received from Limitless API"),
    }
    Ok(())
}

/// Back-fill the past N days
async fn run_historical(config: &Config, days: u32) -> Result<()> {
    println!("Running historical sync for last {} days...", days);

    let source = LimitlessClient::new(config);
    let outcomes = sync::sync_historical(config, source, days).await?;

    let imported = outcomes
        .iter()
        .filter(|(_, o)| *o == crate::import::DateOutcome::Imported)
        .count();
    println!(
        "✓ Synced {} of {} day(s)",
        imported,
        outcomes.len()
    );
    Ok(())
}

fn print_summary(config: &Config, run: &ImportRun) {
    println!();
    println!("{}", "=".repeat(60));
    println!("IMPORT COMPLETE");
    println!("{}", "=".repeat(60));
    println!("✓ Successfully imported: {} days", run.successful.len());
    println!("✗ Failed/No data: {} days", run.failed.len());
    println!("⏱ Time elapsed: {:.1} seconds", run.elapsed.as_secs_f64());
    println!("📁 Repository: {}", config.repo_path.display());

    if !run.failed.is_empty() {
        println!();
        println!(
            "Failed dates saved to: {}",
            config.failed_imports_path().display()
        );
        println!("Retry them with: lifelog-sync import --retry-failed");
    }
}

/// Show the resolved configuration (for debugging)
fn show_config(config: &Config) -> Result<()> {
    println!("lifelog-sync configuration");
    println!("{}", "=".repeat(60));
    println!(
        "Config file:    {}",
        config
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!("Provider URL:   {}", config.base_url);
    println!("Auth scheme:    {:?}", config.auth);
    println!("API key:        {}", redact(&config.api_key, PLACEHOLDER_API_KEY));
    println!(
        "GitHub token:   {}",
        redact(&config.github_token, PLACEHOLDER_GITHUB_TOKEN)
    );
    println!("GitHub user:    {}", config.github_username);
    println!("Repository:     {}", config.repo_name);
    println!("Working copy:   {}", config.repo_path.display());
    println!("Timezone:       {}", config.timezone);
    println!("Daily sync at:  {}", config.daily_at.format("%H:%M"));
    println!("Workers:        {}", config.workers);

    Ok(())
}

fn redact(value: &str, placeholder: &str) -> String {
    if value == placeholder {
        "(placeholder - NOT SET)".to_string()
    } else if value.chars().count() > 4 {
        format!("{}…", value.chars().take(4).collect::<String>())
    } else {
        "····".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_range_explicit() {
        let (start, end) = resolve_range(
            Some("2024-01-01".to_string()),
            Some("2024-01-31".to_string()),
            None,
        )
        .unwrap();

        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
    }

    #[test]
    fn test_resolve_range_days_back() {
        let today = Local::now().date_naive();
        let (start, end) = resolve_range(None, None, Some(7)).unwrap();

        assert_eq!(end, today);
        assert_eq!(start, today - chrono::Duration::days(7));
    }

    #[test]
    fn test_resolve_range_default_is_a_year() {
        let (start, end) = resolve_range(None, None, None).unwrap();
        assert_eq!(end - start, chrono::Duration::days(365));
    }

    #[test]
    fn test_resolve_range_rejects_inverted() {
        let result = resolve_range(
            Some("2024-02-01".to_string()),
            Some("2024-01-01".to_string()),
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert!(parse_date("not-a-date").is_err());
        assert!(parse_date("2024-13-01").is_err());
    }

    #[test]
    fn test_redact_never_echoes_secret() {
        let secret = "sk-live-abcdef123456";
        let shown = redact(secret, PLACEHOLDER_API_KEY);
        assert!(!shown.contains("abcdef"));
        assert!(shown.starts_with("sk-l"));

        assert_eq!(
            redact(PLACEHOLDER_API_KEY, PLACEHOLDER_API_KEY),
            "(placeholder - NOT SET)"
        );
    }

    #[test]
    fn test_cli_parses_import_flags() {
        let cli = Cli::try_parse_from([
            "lifelog-sync",
            "import",
            "--start-date",
            "2024-01-01",
            "--end-date",
            "2024-01-31",
            "--sequential",
            "--workers",
            "5",
        ])
        .unwrap();

        match cli.command {
            Commands::Import {
                start_date,
                end_date,
                sequential,
                workers,
                retry_failed,
                ..
            } => {
                assert_eq!(start_date.as_deref(), Some("2024-01-01"));
                assert_eq!(end_date.as_deref(), Some("2024-01-31"));
                assert!(sequential);
                assert_eq!(workers, Some(5));
                assert!(!retry_failed);
            }
            other => panic!("Unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_rejects_days_back_with_explicit_range() {
        let result = Cli::try_parse_from([
            "lifelog-sync",
            "import",
            "--days-back",
            "7",
            "--start-date",
            "2024-01-01",
        ]);
        assert!(result.is_err());
    }
}
