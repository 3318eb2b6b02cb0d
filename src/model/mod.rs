//! Data model shared by the scraping pipeline and its collaborators
//!
//! - [`NovelSnapshot`]: what one table-of-contents walk observed
//! - [`ChapterRecord`]: one fetched chapter, ready for output generation
//! - [`NovelRecord`]: the persisted aggregate a snapshot is merged into
//! - [`ScratchSpace`]: run-wide temp root for image-bearing chapters

mod chapter;
mod novel;
mod scratch;

pub use chapter::{ChapterRecord, FAILED_TITLE, NO_CONTENT};
pub use novel::{ChapterLink, NovelRecord, NovelSnapshot, SavedChapter};
pub use scratch::ScratchSpace;
