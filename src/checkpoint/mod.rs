//! Checkpoint-based delta resolution
//!
//! A persisted source remembers the most recent chapter it has seen. A fresh
//! snapshot is compared against that checkpoint: matching latest chapters
//! mean nothing to fetch, otherwise the delta is every chapter after the
//! checkpoint in reading order. A checkpoint missing from the fresh listing
//! is reported, never papered over with a full or empty delta.

use crate::model::{ChapterLink, NovelRecord, NovelSnapshot};
use crate::HarvestError;

/// Last known position of a persisted source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checkpoint {
    pub current_chapter_url: Option<String>,
    pub current_chapter_title: Option<String>,
    pub last_saved_chapter_url: Option<String>,
}

impl Checkpoint {
    pub fn from_record(record: &NovelRecord) -> Self {
        Self {
            current_chapter_url: record.current_chapter_url.clone(),
            current_chapter_title: record.current_chapter_title.clone(),
            last_saved_chapter_url: record.last_saved_chapter().map(|c| c.url.clone()),
        }
    }

    /// True when the snapshot's latest chapter is the checkpoint, by URL or title
    pub fn is_up_to_date(&self, latest: Option<&ChapterLink>) -> bool {
        let Some(latest) = latest else {
            return false;
        };

        if self.current_chapter_url.as_deref() == Some(latest.url.as_str()) {
            return true;
        }

        match self.current_chapter_title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => title == latest.title.trim(),
            _ => false,
        }
    }

    /// True for a source persisted before any chapter was seen
    pub fn is_empty(&self) -> bool {
        self.current_chapter_url.is_none() && self.last_saved_chapter_url.is_none()
    }

    /// Chapter URLs strictly after the checkpoint, in reading order
    ///
    /// An empty checkpoint yields every URL. Returns None when neither the
    /// current nor the last saved chapter is listed.
    pub fn delta(&self, urls: &[String]) -> Option<Vec<String>> {
        if self.is_empty() {
            return Some(urls.to_vec());
        }

        let position = |target: &Option<String>| {
            target
                .as_deref()
                .and_then(|t| urls.iter().position(|u| u == t))
        };

        let index = position(&self.current_chapter_url).or_else(|| position(&self.last_saved_chapter_url))?;
        Some(urls[index + 1..].to_vec())
    }
}

/// Outcome of comparing a snapshot with a checkpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    UpToDate,
    Delta(Vec<String>),
}

/// Resolves what to fetch for a persisted source
///
/// # Errors
///
/// * `HarvestError::CheckpointInconsistency` - Neither the current chapter
///   nor the last saved chapter appears in the snapshot
pub fn resolve(
    source_url: &str,
    checkpoint: &Checkpoint,
    snapshot: &NovelSnapshot,
) -> Result<Resolution, HarvestError> {
    if checkpoint.is_up_to_date(snapshot.latest_chapter()) {
        return Ok(Resolution::UpToDate);
    }

    let urls = snapshot.chapter_urls();
    match checkpoint.delta(&urls) {
        Some(delta) => {
            tracing::debug!("{} chapters after checkpoint for {}", delta.len(), source_url);
            Ok(Resolution::Delta(delta))
        }
        None => Err(HarvestError::CheckpointInconsistency {
            url: source_url.to_string(),
            current: checkpoint.current_chapter_url.clone(),
            last_saved: checkpoint.last_saved_chapter_url.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(count: usize) -> NovelSnapshot {
        let mut snapshot = NovelSnapshot {
            url: "https://example.com/novel".to_string(),
            ..Default::default()
        };
        snapshot.push_chapters((0..count).map(|i| ChapterLink {
            url: format!("https://example.com/c/{}", i),
            title: format!("Chapter {}", i),
        }));
        snapshot
    }

    fn at(index: usize) -> Checkpoint {
        Checkpoint {
            current_chapter_url: Some(format!("https://example.com/c/{}", index)),
            current_chapter_title: Some(format!("Chapter {}", index)),
            last_saved_chapter_url: Some(format!("https://example.com/c/{}", index)),
        }
    }

    #[test]
    fn test_delta_after_current_chapter() {
        let resolution = resolve("https://example.com/novel", &at(37), &snapshot(50)).unwrap();
        let Resolution::Delta(delta) = resolution else {
            panic!("expected a delta");
        };
        assert_eq!(delta.len(), 12);
        assert_eq!(delta[0], "https://example.com/c/38");
        assert_eq!(delta[11], "https://example.com/c/49");
    }

    #[test]
    fn test_up_to_date_by_url() {
        let checkpoint = Checkpoint {
            current_chapter_title: None,
            ..at(49)
        };
        assert_eq!(
            resolve("https://example.com/novel", &checkpoint, &snapshot(50)).unwrap(),
            Resolution::UpToDate
        );
    }

    #[test]
    fn test_up_to_date_by_title_when_url_changed() {
        let checkpoint = Checkpoint {
            current_chapter_url: Some("https://old.example.com/c/49".to_string()),
            current_chapter_title: Some(" Chapter 49 ".to_string()),
            last_saved_chapter_url: None,
        };
        assert_eq!(
            resolve("https://example.com/novel", &checkpoint, &snapshot(50)).unwrap(),
            Resolution::UpToDate
        );
    }

    #[test]
    fn test_empty_title_never_matches() {
        let checkpoint = Checkpoint {
            current_chapter_url: None,
            current_chapter_title: Some(String::new()),
            last_saved_chapter_url: None,
        };
        let mut fresh = snapshot(1);
        fresh.chapters[0].title = String::new();
        assert!(!checkpoint.is_up_to_date(fresh.latest_chapter()));
    }

    #[test]
    fn test_falls_back_to_last_saved_chapter() {
        let checkpoint = Checkpoint {
            current_chapter_url: Some("https://example.com/c/removed".to_string()),
            current_chapter_title: Some("Removed".to_string()),
            last_saved_chapter_url: Some("https://example.com/c/7".to_string()),
        };
        let Resolution::Delta(delta) =
            resolve("https://example.com/novel", &checkpoint, &snapshot(10)).unwrap()
        else {
            panic!("expected a delta");
        };
        assert_eq!(delta, vec!["https://example.com/c/8", "https://example.com/c/9"]);
    }

    #[test]
    fn test_missing_checkpoint_is_inconsistency() {
        let checkpoint = Checkpoint {
            current_chapter_url: Some("https://example.com/c/gone".to_string()),
            current_chapter_title: Some("Gone".to_string()),
            last_saved_chapter_url: Some("https://example.com/c/also-gone".to_string()),
        };
        let err = resolve("https://example.com/novel", &checkpoint, &snapshot(10)).unwrap_err();
        assert!(matches!(err, HarvestError::CheckpointInconsistency { .. }));
    }

    #[test]
    fn test_empty_snapshot_is_inconsistency() {
        let err = resolve("https://example.com/novel", &at(3), &snapshot(0)).unwrap_err();
        assert!(matches!(err, HarvestError::CheckpointInconsistency { .. }));
    }

    #[test]
    fn test_empty_checkpoint_takes_whole_listing() {
        let checkpoint = Checkpoint::default();
        assert!(checkpoint.is_empty());

        let Resolution::Delta(delta) =
            resolve("https://example.com/novel", &checkpoint, &snapshot(3)).unwrap()
        else {
            panic!("expected a delta");
        };
        assert_eq!(delta.len(), 3);
        assert_eq!(delta[0], "https://example.com/c/0");

        assert_eq!(
            resolve("https://example.com/novel", &checkpoint, &snapshot(0)).unwrap(),
            Resolution::Delta(Vec::new())
        );
    }
}
