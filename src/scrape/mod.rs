//! Scraping pipeline for table-of-contents walks and chapter fetches
//!
//! This module contains the per-site machinery:
//! - Field extractors for novel metadata and chapter links
//! - The sequential pagination walker
//! - Chapter content extraction with selector fallback
//! - The concurrent chapter fetcher with per-chapter retry
//! - Scrape strategies and the host-keyed registry that dispatches them

mod context;
mod extractor;
mod fetcher;
mod fields;
mod pagination;
mod registry;
mod strategy;

pub use context::{effective_concurrency, ScrapeContext};
pub use extractor::{
    choose_paragraphs, extract_chapter, finalize_body, ChapterContent, ExtractedChapter,
    MIN_PARAGRAPHS,
};
pub use fetcher::{resequence, ChapterFetcher, FetchSettings};
pub use fields::FieldExtractors;
pub use pagination::{resolve_stop_page, PaginationWalker, WalkRequest, WalkResult};
pub use registry::{Dispatch, StrategyRegistry};
pub use strategy::{ProfileStrategy, ScrapeStrategy, SnapshotRequest};

use crate::ConfigError;
use scraper::{ElementRef, Selector};

/// Parses a configured selector, naming the field on failure
pub(crate) fn parse_selector(field: &str, selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|_| ConfigError::InvalidSelector {
        field: field.to_string(),
        selector: selector.to_string(),
    })
}

/// Element text with whitespace runs collapsed to single spaces
pub(crate) fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
