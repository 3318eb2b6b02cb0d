//! Output generation and run reporting
//!
//! This module turns harvested chapters into documents and reports:
//! - The [`OutputGenerator`] trait used by the harvester
//! - A Markdown document per novel, appended to on update
//! - The end-of-run summary printed to stdout or written as Markdown

mod markdown;
mod summary;
mod traits;

pub use markdown::{slugify, MarkdownOutput};
pub use summary::{format_summary, print_summary, write_summary, RunSummary, SourceFailure};
pub use traits::{OutputError, OutputGenerator, OutputResult};
