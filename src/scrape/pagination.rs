//! Sequential table-of-contents walker
//!
//! Pages are requested strictly in order: page i+1 is only requested after
//! page i has been loaded and its links extracted. A page that cannot be
//! loaded is logged and skipped; the walk never aborts for one bad page.

use crate::config::SiteProfile;
use crate::loader::{ContentLoader, LoadedPage, LoaderMode};
use crate::model::ChapterLink;
use crate::scrape::FieldExtractors;
use crate::url::format_page_url;
use crate::HarvestError;

/// Pages to visit for one novel
#[derive(Debug, Clone)]
pub struct WalkRequest {
    pub novel_url: String,
    pub start_page: u32,
    pub stop_page: u32,
}

/// Links gathered by a walk, in visiting order
#[derive(Debug, Clone, Default)]
pub struct WalkResult {
    pub chapters: Vec<ChapterLink>,
    pub last_toc_url: String,
    pub last_toc_page: u32,
    pub pages_loaded: u32,
    pub pages_failed: u32,
}

/// Resolves the final page to visit
///
/// The offset is added exactly once to the parsed last page. Without a
/// last-page marker the table of contents is a single page and the walk
/// stops where it starts.
pub fn resolve_stop_page(last_page: Option<u32>, offset: u32, start_page: u32) -> u32 {
    match last_page {
        Some(last) => last.saturating_add(offset).max(1),
        None => start_page.max(1),
    }
}

/// Walks pagination template pages through a loader
pub struct PaginationWalker<'a> {
    loader: &'a ContentLoader,
    profile: &'a SiteProfile,
    extractors: &'a FieldExtractors,
    mode: LoaderMode,
}

impl<'a> PaginationWalker<'a> {
    pub fn new(
        loader: &'a ContentLoader,
        profile: &'a SiteProfile,
        extractors: &'a FieldExtractors,
        mode: LoaderMode,
    ) -> Self {
        Self {
            loader,
            profile,
            extractors,
            mode,
        }
    }

    /// Visits every page from start to stop inclusive
    ///
    /// A start beyond the stop page (a shrunken table of contents) is clamped
    /// to the stop page.
    pub async fn walk(&self, request: &WalkRequest) -> Result<WalkResult, HarvestError> {
        let stop = request.stop_page.max(1);
        let start = request.start_page.clamp(1, stop);
        let mut result = WalkResult::default();

        tracing::debug!(
            "Walking table of contents of {} from page {} to {}",
            request.novel_url,
            start,
            stop
        );

        for page in start..=stop {
            let url = format_page_url(&self.profile.pagination, &request.novel_url, page);
            let loaded = self
                .loader
                .try_load(&url, self.mode, self.profile.wait_selector.as_deref())
                .await;

            match loaded {
                Some(loaded) => {
                    let links = self.links(&loaded)?;
                    tracing::debug!("Page {} of {} listed {} chapters", page, request.novel_url, links.len());
                    result.chapters.extend(links);
                    result.pages_loaded += 1;
                }
                None => {
                    tracing::warn!("Skipping table-of-contents page {} ({})", page, url);
                    result.pages_failed += 1;
                }
            }

            result.last_toc_url = url;
            result.last_toc_page = page;
        }

        Ok(result)
    }

    /// Extracts links synchronously so the parsed document never crosses an await
    fn links(&self, page: &LoadedPage) -> Result<Vec<ChapterLink>, HarvestError> {
        let base = page.base_url()?;
        let document = page.document();
        Ok((self.extractors.chapter_links)(&document, &base, self.profile)?)
    }
}
