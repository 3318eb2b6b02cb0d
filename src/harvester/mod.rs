//! Source harvesting orchestration
//!
//! This module ties the pipeline together for each source URL:
//! - Dispatching to the site's strategy
//! - Full acquisition of new sources
//! - Checkpoint-based incremental updates of known sources
//! - Output hand-off, persistence and the per-run summary

mod coordinator;

pub use coordinator::Harvester;

use crate::model::ChapterRecord;
use std::fmt;
use std::path::PathBuf;

/// What a harvest did to a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestStatus {
    /// First harvest; every chapter was fetched
    Added,

    /// New chapters were appended
    Updated,

    /// Nothing new; only the last-modified time changed
    UpToDate,
}

impl fmt::Display for HarvestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Added => "added",
            Self::Updated => "updated",
            Self::UpToDate => "up to date",
        };
        f.write_str(label)
    }
}

/// Result of harvesting one source
#[derive(Debug, Clone)]
pub struct HarvestOutcome {
    pub url: String,
    pub title: String,
    pub status: HarvestStatus,
    pub chapters_fetched: usize,

    /// Chapters that exhausted their fetch attempts
    pub failed_chapters: Vec<String>,

    /// Chapters fetched without usable content
    pub missing_content: Vec<String>,

    /// Document written or appended to
    pub document: Option<PathBuf>,
}

impl HarvestOutcome {
    pub(crate) fn new(
        url: &str,
        title: &str,
        status: HarvestStatus,
        chapters: &[ChapterRecord],
        document: Option<PathBuf>,
    ) -> Self {
        let failed_chapters = chapters
            .iter()
            .filter(|c| c.is_failed())
            .map(|c| c.url.clone())
            .collect();
        let missing_content = chapters
            .iter()
            .filter(|c| c.is_missing_content() && !c.is_failed())
            .map(|c| c.url.clone())
            .collect();

        Self {
            url: url.to_string(),
            title: title.to_string(),
            status,
            chapters_fetched: chapters.len(),
            failed_chapters,
            missing_content,
            document,
        }
    }
}
