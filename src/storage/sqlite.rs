//! SQLite repository implementation

use crate::model::{NovelRecord, SavedChapter};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{NovelRepository, StorageError, StorageResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteRepository {
    conn: Connection,
}

impl SqliteRepository {
    /// Opens or creates the database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn load_chapters(&self, novel_url: &str) -> StorageResult<Vec<SavedChapter>> {
        let mut stmt = self.conn.prepare(
            "SELECT url, title, sequence FROM chapters WHERE novel_url = ?1 ORDER BY sequence, id",
        )?;

        let chapters = stmt
            .query_map(params![novel_url], |row| {
                Ok(SavedChapter {
                    url: row.get(0)?,
                    title: row.get(1)?,
                    sequence: row.get::<_, i64>(2)? as usize,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(chapters)
    }
}

/// Novel columns as stored, before timestamp parsing
struct NovelRow {
    url: String,
    title: String,
    author: Option<String>,
    genres: String,
    description: String,
    thumbnail: Option<Vec<u8>>,
    status: Option<String>,
    completed: bool,
    last_toc_url: String,
    last_toc_page: u32,
    current_chapter_url: Option<String>,
    current_chapter_title: Option<String>,
    created_at: String,
    last_modified: String,
}

impl NovelRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            url: row.get(0)?,
            title: row.get(1)?,
            author: row.get(2)?,
            genres: row.get(3)?,
            description: row.get(4)?,
            thumbnail: row.get(5)?,
            status: row.get(6)?,
            completed: row.get(7)?,
            last_toc_url: row.get(8)?,
            last_toc_page: row.get(9)?,
            current_chapter_url: row.get(10)?,
            current_chapter_title: row.get(11)?,
            created_at: row.get(12)?,
            last_modified: row.get(13)?,
        })
    }

    fn into_record(self, chapters: Vec<SavedChapter>) -> StorageResult<NovelRecord> {
        Ok(NovelRecord {
            url: self.url,
            title: self.title,
            author: self.author,
            genres: split_lines(&self.genres),
            description: split_lines(&self.description),
            thumbnail: self.thumbnail,
            status: self.status,
            completed: self.completed,
            last_toc_url: self.last_toc_url,
            last_toc_page: self.last_toc_page,
            current_chapter_url: self.current_chapter_url,
            current_chapter_title: self.current_chapter_title,
            chapters,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            last_modified: parse_timestamp("last_modified", &self.last_modified)?,
        })
    }
}

impl NovelRepository for SqliteRepository {
    fn get_by_url(&self, url: &str) -> StorageResult<Option<NovelRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT url, title, author, genres, description, thumbnail, status, completed,
                        last_toc_url, last_toc_page, current_chapter_url, current_chapter_title,
                        created_at, last_modified
                 FROM novels WHERE url = ?1",
                params![url],
                NovelRow::from_row,
            )
            .optional()?;

        match row {
            Some(row) => {
                let chapters = self.load_chapters(url)?;
                Ok(Some(row.into_record(chapters)?))
            }
            None => Ok(None),
        }
    }

    fn save(&mut self, record: &NovelRecord) -> StorageResult<()> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO novels (url, title, author, genres, description, thumbnail, status,
                                 completed, last_toc_url, last_toc_page, current_chapter_url,
                                 current_chapter_title, created_at, last_modified)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(url) DO UPDATE SET
                title = excluded.title,
                author = excluded.author,
                genres = excluded.genres,
                description = excluded.description,
                thumbnail = excluded.thumbnail,
                status = excluded.status,
                completed = excluded.completed,
                last_toc_url = excluded.last_toc_url,
                last_toc_page = excluded.last_toc_page,
                current_chapter_url = excluded.current_chapter_url,
                current_chapter_title = excluded.current_chapter_title,
                last_modified = excluded.last_modified",
            params![
                record.url,
                record.title,
                record.author,
                record.genres.join("\n"),
                record.description.join("\n"),
                record.thumbnail,
                record.status,
                record.completed,
                record.last_toc_url,
                record.last_toc_page,
                record.current_chapter_url,
                record.current_chapter_title,
                record.created_at.to_rfc3339(),
                record.last_modified.to_rfc3339(),
            ],
        )?;

        {
            let mut insert = tx.prepare(
                "INSERT OR IGNORE INTO chapters (novel_url, url, title, sequence)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for chapter in &record.chapters {
                insert.execute(params![
                    record.url,
                    chapter.url,
                    chapter.title,
                    chapter.sequence as i64
                ])?;
            }
        }

        tx.commit()?;
        tracing::debug!("Saved {} ({} chapters)", record.url, record.total_chapters());
        Ok(())
    }

    fn list_urls(&self) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT url FROM novels ORDER BY url")?;
        let urls = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(urls)
    }
}

fn split_lines(value: &str) -> Vec<String> {
    value
        .lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_timestamp(column: &str, value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt {
            column: column.to_string(),
            message: e.to_string(),
        })
}
