//! Date-partitioned note storage inside the working copy.
//!
//! Layout: `<root>/<YYYY>/<MM-MonthName>/<YYYY-MM-DD>-notes.md`.
//! Path derivation is a pure function of the date; existence checks and
//! the skip-if-present policy belong to the caller.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tokio::fs;

/// Compute the note path for a date. Pure.
pub fn note_path(root: &Path, date: NaiveDate) -> PathBuf {
    root.join(date.format("%Y").to_string())
        .join(date.format("%m-%B").to_string())
        .join(format!("{}-notes.md", date.format("%Y-%m-%d")))
}

/// Whether a note already exists for this date.
pub fn note_exists(root: &Path, date: NaiveDate) -> bool {
    note_path(root, date).exists()
}

/// Write a note document, creating parent directories as needed.
/// Overwrites any existing file at the derived path.
pub async fn write_note(root: &Path, date: NaiveDate, content: &str) -> Result<PathBuf> {
    let path = note_path(root, date);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create note directory: {}", parent.display()))?;
    }

    fs::write(&path, content)
        .await
        .with_context(|| format!("Failed to write note: {}", path.display()))?;

    Ok(path)
}
