use crate::model::ChapterRecord;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// A chapter link as listed in the table of contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterLink {
    pub url: String,
    pub title: String,
}

/// Everything one table-of-contents walk observed about a source
#[derive(Debug, Clone, Default)]
pub struct NovelSnapshot {
    /// Novel URL after canonical-link resolution
    pub url: String,
    pub title: String,
    pub author: Option<String>,
    pub genres: Vec<String>,
    pub description: Vec<String>,
    pub thumbnail: Option<Vec<u8>>,
    pub status: Option<String>,
    pub completed: bool,

    /// Chapter links in reading order, unique by URL
    pub chapters: Vec<ChapterLink>,

    /// Last table-of-contents page visited
    pub last_toc_url: String,
    pub last_toc_page: u32,
}

impl NovelSnapshot {
    /// Appends links in order, skipping URLs already present
    pub fn push_chapters(&mut self, links: impl IntoIterator<Item = ChapterLink>) {
        let mut seen: HashSet<String> = self.chapters.iter().map(|c| c.url.clone()).collect();
        for link in links {
            if seen.insert(link.url.clone()) {
                self.chapters.push(link);
            }
        }
    }

    pub fn chapter_urls(&self) -> Vec<String> {
        self.chapters.iter().map(|c| c.url.clone()).collect()
    }

    /// Most recent chapter in reading order
    pub fn latest_chapter(&self) -> Option<&ChapterLink> {
        self.chapters.last()
    }
}

/// A chapter already delivered to output for a persisted novel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedChapter {
    pub url: String,
    pub title: String,
    pub sequence: usize,
}

/// Persisted aggregate for one source
#[derive(Debug, Clone)]
pub struct NovelRecord {
    pub url: String,
    pub title: String,
    pub author: Option<String>,
    pub genres: Vec<String>,
    pub description: Vec<String>,
    pub thumbnail: Option<Vec<u8>>,
    pub status: Option<String>,
    pub completed: bool,
    pub last_toc_url: String,
    pub last_toc_page: u32,
    pub current_chapter_url: Option<String>,
    pub current_chapter_title: Option<String>,
    pub chapters: Vec<SavedChapter>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl NovelRecord {
    /// Builds the aggregate for a source seen for the first time
    ///
    /// `source_url` is the URL the user registered; lookups on later runs use it.
    pub fn from_snapshot(source_url: &str, snapshot: &NovelSnapshot, chapters: &[ChapterRecord]) -> Self {
        let now = Utc::now();
        let mut record = Self {
            url: source_url.to_string(),
            title: snapshot.title.clone(),
            author: snapshot.author.clone(),
            genres: snapshot.genres.clone(),
            description: snapshot.description.clone(),
            thumbnail: snapshot.thumbnail.clone(),
            status: snapshot.status.clone(),
            completed: snapshot.completed,
            last_toc_url: snapshot.last_toc_url.clone(),
            last_toc_page: snapshot.last_toc_page,
            current_chapter_url: None,
            current_chapter_title: None,
            chapters: Vec::new(),
            created_at: now,
            last_modified: now,
        };
        record.append_chapters(snapshot, chapters);
        record
    }

    /// Merges an update: appends the new chapters and refreshes status fields
    pub fn merge_update(&mut self, snapshot: &NovelSnapshot, chapters: &[ChapterRecord]) {
        self.status = snapshot.status.clone();
        self.completed = snapshot.completed;
        self.last_toc_url = snapshot.last_toc_url.clone();
        self.last_toc_page = snapshot.last_toc_page;
        if snapshot.thumbnail.is_some() {
            self.thumbnail = snapshot.thumbnail.clone();
        }
        self.append_chapters(snapshot, chapters);
        self.last_modified = Utc::now();
    }

    /// Marks the record as checked without content changes
    pub fn touch(&mut self) {
        self.last_modified = Utc::now();
    }

    pub fn total_chapters(&self) -> usize {
        self.chapters.len()
    }

    pub fn last_saved_chapter(&self) -> Option<&SavedChapter> {
        self.chapters.last()
    }

    fn append_chapters(&mut self, snapshot: &NovelSnapshot, chapters: &[ChapterRecord]) {
        let offset = self.chapters.len();
        let mut known: HashSet<String> = self.chapters.iter().map(|c| c.url.clone()).collect();

        for chapter in chapters {
            if known.insert(chapter.url.clone()) {
                self.chapters.push(SavedChapter {
                    url: chapter.url.clone(),
                    title: chapter.title.clone(),
                    sequence: offset + chapter.sequence,
                });
            }
        }

        if let Some(latest) = snapshot.latest_chapter() {
            self.current_chapter_url = Some(latest.url.clone());
            self.current_chapter_title = Some(latest.title.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(n: usize) -> ChapterLink {
        ChapterLink {
            url: format!("https://example.com/c/{}", n),
            title: format!("Chapter {}", n),
        }
    }

    fn snapshot(count: usize) -> NovelSnapshot {
        let mut snapshot = NovelSnapshot {
            url: "https://example.com/novel".to_string(),
            title: "Novel".to_string(),
            status: Some("Ongoing".to_string()),
            last_toc_url: "https://example.com/novel?page=1".to_string(),
            last_toc_page: 1,
            ..Default::default()
        };
        snapshot.push_chapters((1..=count).map(link));
        snapshot
    }

    fn records(range: std::ops::RangeInclusive<usize>) -> Vec<ChapterRecord> {
        range
            .enumerate()
            .map(|(i, n)| {
                let mut r = ChapterRecord::text(link(n).url, link(n).title, "body");
                r.sequence = i + 1;
                r
            })
            .collect()
    }

    #[test]
    fn test_push_chapters_drops_duplicates() {
        let mut s = snapshot(2);
        s.push_chapters(vec![link(2), link(3), link(3)]);
        assert_eq!(s.chapters.len(), 3);
        assert_eq!(s.latest_chapter(), Some(&link(3)));
    }

    #[test]
    fn test_from_snapshot_sets_checkpoint() {
        let s = snapshot(3);
        let record = NovelRecord::from_snapshot("https://example.com/novel", &s, &records(1..=3));
        assert_eq!(record.total_chapters(), 3);
        assert_eq!(record.current_chapter_url.as_deref(), Some("https://example.com/c/3"));
        assert_eq!(record.current_chapter_title.as_deref(), Some("Chapter 3"));
    }

    #[test]
    fn test_merge_update_offsets_sequences() {
        let mut record = NovelRecord::from_snapshot("https://example.com/novel", &snapshot(3), &records(1..=3));

        let mut update = snapshot(5);
        update.status = Some("Completed".to_string());
        update.completed = true;
        update.last_toc_page = 2;
        record.merge_update(&update, &records(4..=5));

        assert_eq!(record.total_chapters(), 5);
        assert_eq!(record.chapters[3].sequence, 4);
        assert_eq!(record.chapters[4].sequence, 5);
        assert!(record.completed);
        assert_eq!(record.last_toc_page, 2);
        assert_eq!(record.current_chapter_url.as_deref(), Some("https://example.com/c/5"));
    }
}
