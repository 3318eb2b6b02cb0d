//! Repository trait and error types

use crate::model::NovelRecord;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt value in column {column}: {message}")]
    Corrupt { column: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Store of persisted sources, keyed by the URL the source was added under
///
/// The harvester reads a record before an update and writes the merged
/// record back; records are never deleted from here.
pub trait NovelRepository: Send {
    /// Gets a source by URL
    fn get_by_url(&self, url: &str) -> StorageResult<Option<NovelRecord>>;

    /// Inserts or replaces a source and appends chapters not yet stored
    fn save(&mut self, record: &NovelRecord) -> StorageResult<()>;

    /// URLs of every stored source, sorted
    fn list_urls(&self) -> StorageResult<Vec<String>>;
}
