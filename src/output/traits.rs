//! Output generator trait and error types

use crate::model::{ChapterRecord, NovelRecord};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Output document missing for update: {0}")]
    MissingDocument(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Receives fetched chapters for delivery
///
/// Chapters arrive in sequence order. Image files referenced by the records
/// only live until the harvester releases their scratch directories, so
/// implementations must copy what they keep.
pub trait OutputGenerator: Send + Sync {
    /// Creates the document for a newly added source
    fn generate(&self, novel: &NovelRecord, chapters: &[ChapterRecord]) -> OutputResult<PathBuf>;

    /// Adds newly fetched chapters to an existing source's document
    fn update(&self, novel: &NovelRecord, chapters: &[ChapterRecord]) -> OutputResult<PathBuf>;
}
