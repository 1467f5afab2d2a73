//! lifelog-sync - Limitless transcripts to a version-controlled notes archive
//!
//! Fetches daily voice transcripts from the Limitless API, renders them
//! as structured markdown, writes them into a date-organized directory
//! tree, and commits the result to a GitHub repository.
//!
//! # Pipeline
//!
//! Every date flows through the same four stages:
//! - Fetch the day's transcript from the provider
//! - Format it as markdown (shape-aware rendering)
//! - Write it to `<repo>/<YYYY>/<MM-Month>/<YYYY-MM-DD>-notes.md`
//! - Commit and push the working copy
//!
//! # Modules
//!
//! - `provider`: Limitless API client with bounded rate-limit retry
//! - `format`: Pure transcript-to-markdown rendering
//! - `notes`: Date-organized file layout
//! - `repo`: Git working-copy operations (clone, pull, commit, push)
//! - `import`: Bulk import orchestration and failure tracking
//! - `sync`: Daily sync and the built-in scheduler
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Import the last 30 days
//! lifelog-sync import --days-back 30
//!
//! # Retry anything that failed
//! lifelog-sync import --retry-failed
//!
//! # Run the daily scheduler
//! lifelog-sync sync
//! ```

pub mod cli;
pub mod config;
pub mod format;
pub mod import;
pub mod notes;
pub mod provider;
pub mod repo;
pub mod sync;

// Re-export main types at crate root for convenience
pub use config::Config;
pub use format::ImportMode;
pub use import::{DateOutcome, ImportRun, Importer};
pub use provider::{Fetcher, LimitlessClient, TranscriptSource};
pub use repo::GitRepo;
