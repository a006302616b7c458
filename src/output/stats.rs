//! Statistics over the result CSV
//!
//! This module provides functionality for summarizing what a harvest has
//! written so far, used by `--stats` and at the end of a run.

use super::traits::OutputResult;
use std::path::Path;

/// Harvest statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvSummary {
    /// Number of data rows (header excluded)
    pub total_rows: u64,

    /// Rows with a non-empty follower count
    pub with_followers: u64,

    /// Rows with at least one email
    pub with_emails: u64,

    /// Rows with a website link
    pub with_website: u64,

    /// Rows carrying a non-empty error
    pub with_error: u64,
}

impl CsvSummary {
    /// Returns the share of rows with a follower count as a percentage
    pub fn follower_rate(&self) -> f64 {
        if self.total_rows == 0 {
            return 0.0;
        }
        (self.with_followers as f64 / self.total_rows as f64) * 100.0
    }
}

/// Loads statistics from a result CSV
///
/// # Arguments
///
/// * `path` - The CSV file to scan
///
/// # Returns
///
/// * `Ok(CsvSummary)` - Counts; a missing file yields an empty summary
/// * `Err(OutputError)` - The file exists but could not be read
pub fn load_summary(path: &Path) -> OutputResult<CsvSummary> {
    if !path.exists() {
        return Ok(CsvSummary::default());
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h == name);
    let followers = column("followers");
    let emails = column("emails");
    let website = column("website");
    let error = column("error");

    let filled = |record: &csv::StringRecord, idx: Option<usize>| {
        idx.and_then(|i| record.get(i))
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false)
    };

    let mut summary = CsvSummary::default();
    for result in reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Skipping unreadable row in {}: {}", path.display(), e);
                continue;
            }
        };
        summary.total_rows += 1;
        summary.with_followers += u64::from(filled(&record, followers));
        summary.with_emails += u64::from(filled(&record, emails));
        summary.with_website += u64::from(filled(&record, website));
        summary.with_error += u64::from(filled(&record, error));
    }

    Ok(summary)
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `path` - The CSV the summary was computed from
/// * `summary` - The statistics to display
pub fn print_summary(path: &Path, summary: &CsvSummary) {
    println!("=== Harvest Statistics ===\n");
    println!("File: {}", path.display());
    println!("  Rows written: {}", summary.total_rows);
    println!(
        "  With followers: {} ({:.1}%)",
        summary.with_followers,
        summary.follower_rate()
    );
    println!("  With emails: {}", summary.with_emails);
    println!("  With website: {}", summary.with_website);
    if summary.with_error > 0 {
        println!("  With error: {}", summary.with_error);
    }
}
