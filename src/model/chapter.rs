use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tempfile::TempDir;

/// Title given to a chapter whose every fetch attempt failed
pub const FAILED_TITLE: &str = "Failed to retrieve content";

/// Body given to a chapter with no usable content
pub const NO_CONTENT: &str = "No content found";

/// One fetched chapter
///
/// Image-bearing chapters own a scratch directory holding their downloaded
/// pages; it is deleted when the record is dropped or released.
#[derive(Debug)]
pub struct ChapterRecord {
    /// Chapter URL, unique within a novel
    pub url: String,

    pub title: String,

    /// Paragraphs joined with newlines (empty for image chapters)
    pub body: String,

    /// Downloaded page images in reading order
    pub images: Vec<PathBuf>,

    /// 1 + position of the URL in the requested list
    pub sequence: usize,

    pub last_modified: DateTime<Utc>,

    scratch: Option<TempDir>,
}

impl ChapterRecord {
    /// Creates a text chapter
    pub fn text(url: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            body: body.into(),
            images: Vec::new(),
            sequence: 0,
            last_modified: Utc::now(),
            scratch: None,
        }
    }

    /// Creates an image chapter owning the directory its images live in
    pub fn images(
        url: impl Into<String>,
        title: impl Into<String>,
        images: Vec<PathBuf>,
        scratch: TempDir,
    ) -> Self {
        let body = if images.is_empty() { NO_CONTENT } else { "" };
        Self {
            url: url.into(),
            title: title.into(),
            body: body.to_string(),
            images,
            sequence: 0,
            last_modified: Utc::now(),
            scratch: Some(scratch),
        }
    }

    /// Placeholder for a chapter that could not be fetched
    pub fn sentinel(url: impl Into<String>) -> Self {
        Self::text(url, FAILED_TITLE, NO_CONTENT)
    }

    /// True when the body is the missing-content marker
    pub fn is_missing_content(&self) -> bool {
        self.body == NO_CONTENT
    }

    /// True for records produced after fetch attempts were exhausted
    pub fn is_failed(&self) -> bool {
        self.title == FAILED_TITLE && self.is_missing_content()
    }

    /// Deletes the scratch directory once output generation consumed it
    pub fn release_scratch(&mut self) {
        if let Some(dir) = self.scratch.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                tracing::warn!("Failed to remove scratch dir {}: {}", path.display(), e);
            }
        }
        self.images.clear();
    }
}
