use crate::config::SiteProfile;
use crate::loader::{ContentLoader, LoaderMode};
use crate::model::ScratchSpace;
use crate::scrape::{ChapterFetcher, FetchSettings};
use std::sync::Arc;

/// Everything a strategy needs for one source
#[derive(Clone)]
pub struct ScrapeContext {
    /// Authority key the source was dispatched on
    pub authority: String,
    pub profile: Arc<SiteProfile>,
    pub loader: ContentLoader,
    pub fetch: FetchSettings,

    /// Concurrent plain-HTTP chapter fetches, already clamped
    pub concurrency: usize,

    pub scratch: ScratchSpace,
}

impl ScrapeContext {
    pub fn new(
        authority: String,
        profile: Arc<SiteProfile>,
        loader: ContentLoader,
        fetch: FetchSettings,
        global_concurrency: usize,
        scratch: ScratchSpace,
    ) -> Self {
        let requested = profile.concurrency.unwrap_or(global_concurrency);
        let available = std::thread::available_parallelism().map_or(1, |n| n.get());
        Self {
            authority,
            concurrency: effective_concurrency(requested, available),
            profile,
            loader,
            fetch,
            scratch,
        }
    }

    /// Chapter fetcher using the given load mode
    pub fn fetcher(&self, mode: LoaderMode) -> ChapterFetcher {
        ChapterFetcher::new(
            self.loader.clone(),
            Arc::clone(&self.profile),
            self.fetch.clone(),
            mode,
            self.concurrency,
            self.scratch.clone(),
        )
    }
}

/// Clamps a configured concurrency limit to [1, available parallelism]
pub fn effective_concurrency(requested: usize, available: usize) -> usize {
    requested.clamp(1, available.max(1))
}
