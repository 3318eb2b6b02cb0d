//! Persistence of per-source state
//!
//! This module stores the aggregate for every harvested source:
//! - Novel metadata and the last table-of-contents position
//! - The current-chapter checkpoint used for delta resolution
//! - The ordered list of chapters already delivered to output
//!
//! [`SqliteRepository`] is the default backend; [`InMemoryRepository`]
//! serves dry runs and tests.

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::InMemoryRepository;
pub use sqlite::SqliteRepository;
pub use traits::{NovelRepository, StorageError, StorageResult};

use std::path::Path;

/// Opens (creating if needed) the SQLite repository at `path`
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteRepository)` - Successfully opened repository
/// * `Err(StorageError)` - Failed to open the database or create its schema
pub fn open_repository(path: &Path) -> StorageResult<SqliteRepository> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    SqliteRepository::new(path)
}
