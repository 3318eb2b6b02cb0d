//! End-of-run summary
//!
//! Collects one outcome or failure per source and renders them for the
//! terminal or as a Markdown report.

use crate::harvester::{HarvestOutcome, HarvestStatus};
use crate::output::traits::OutputResult;
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A source whose harvest was aborted
#[derive(Debug, Clone)]
pub struct SourceFailure {
    pub url: String,
    pub message: String,
}

/// Per-source results of one run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcomes: Vec<HarvestOutcome>,
    pub failures: Vec<SourceFailure>,
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}

impl RunSummary {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            outcomes: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: HarvestOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn record_failure(&mut self, url: &str, error: &dyn std::fmt::Display) {
        self.failures.push(SourceFailure {
            url: url.to_string(),
            message: error.to_string(),
        });
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    fn count(&self, status: HarvestStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn added(&self) -> usize {
        self.count(HarvestStatus::Added)
    }

    pub fn updated(&self) -> usize {
        self.count(HarvestStatus::Updated)
    }

    pub fn up_to_date(&self) -> usize {
        self.count(HarvestStatus::UpToDate)
    }

    pub fn chapters_fetched(&self) -> usize {
        self.outcomes.iter().map(|o| o.chapters_fetched).sum()
    }

    /// Chapter URLs whose body was the missing-content marker
    pub fn missing_content(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .flat_map(|o| o.missing_content.iter().map(String::as_str))
            .collect()
    }

    /// Chapter URLs that exhausted their fetch attempts
    pub fn failed_chapters(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .flat_map(|o| o.failed_chapters.iter().map(String::as_str))
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_seconds())
    }
}

/// Prints a run summary to stdout
pub fn print_summary(summary: &RunSummary) {
    println!("=== Harvest Summary ===\n");

    println!("Sources:");
    println!("  Added: {}", summary.added());
    println!("  Updated: {}", summary.updated());
    println!("  Up to date: {}", summary.up_to_date());
    println!("  Failed: {}", summary.failures.len());
    println!();

    println!("Chapters fetched: {}", summary.chapters_fetched());

    let failed = summary.failed_chapters();
    if !failed.is_empty() {
        println!("\nChapters that could not be retrieved ({}):", failed.len());
        for url in failed {
            println!("  - {}", url);
        }
    }

    let missing = summary.missing_content();
    if !missing.is_empty() {
        println!("\nChapters with no content found ({}):", missing.len());
        for url in missing {
            println!("  - {}", url);
        }
    }

    if summary.has_failures() {
        println!("\nFailed sources:");
        for failure in &summary.failures {
            println!("  - {}: {}", failure.url, failure.message);
        }
    }
}

/// Writes a Markdown report of a run
///
/// # Arguments
///
/// * `summary` - The run summary
/// * `output_path` - Path where the markdown file should be written
pub fn write_summary(summary: &RunSummary, output_path: &Path) -> OutputResult<()> {
    let markdown = format_summary(summary);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run summary as markdown
pub fn format_summary(summary: &RunSummary) -> String {
    let mut md = String::new();

    md.push_str("# Serial-Harvest Run Summary\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Started**: {}\n", summary.started_at.to_rfc3339()));
    if let Some(finished) = &summary.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished.to_rfc3339()));
    }
    if let Some(duration) = summary.duration_seconds() {
        md.push_str(&format!("- **Duration**: {} seconds\n", duration));
    }
    md.push_str(&format!(
        "- **Chapters Fetched**: {}\n\n",
        summary.chapters_fetched()
    ));

    md.push_str("## Sources\n\n");
    md.push_str("| Source | Title | Result | Chapters |\n");
    md.push_str("|--------|-------|--------|----------|\n");
    for outcome in &summary.outcomes {
        md.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            outcome.url, outcome.title, outcome.status, outcome.chapters_fetched
        ));
    }
    for failure in &summary.failures {
        md.push_str(&format!("| {} | | failed | 0 |\n", failure.url));
    }
    md.push('\n');

    let failed = summary.failed_chapters();
    if !failed.is_empty() {
        md.push_str("## Chapters Not Retrieved\n\n");
        for url in failed {
            md.push_str(&format!("- {}\n", url));
        }
        md.push('\n');
    }

    let missing = summary.missing_content();
    if !missing.is_empty() {
        md.push_str("## Chapters Without Content\n\n");
        for url in missing {
            md.push_str(&format!("- {}\n", url));
        }
        md.push('\n');
    }

    if summary.has_failures() {
        md.push_str("## Errors\n\n");
        for failure in &summary.failures {
            md.push_str(&format!("- **{}**: {}\n", failure.url, failure.message));
        }
        md.push('\n');
    }

    md
}
