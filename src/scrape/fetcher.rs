//! Concurrent chapter fetching
//!
//! Every chapter runs as its own task, bounded by a semaphore: a fresh one
//! sized to the HTTP concurrency limit, or the page pool's permits when pages
//! are rendered in a browser. A chapter that keeps failing becomes a sentinel
//! record instead of failing the batch; sequence numbers follow the position
//! of each URL in the request, not completion order.

use crate::config::{HarvesterConfig, SiteProfile};
use crate::loader::{chapter_backoff, random_jitter, ContentLoader, Jitter, LoaderMode, Sleeper};
use crate::model::{ChapterRecord, ScratchSpace};
use crate::scrape::{extract_chapter, ChapterContent};
use crate::HarvestError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Per-chapter retry policy
#[derive(Clone)]
pub struct FetchSettings {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub jitter: Jitter,
    pub sleeper: Arc<dyn Sleeper>,
}

impl FetchSettings {
    pub fn from_config(config: &HarvesterConfig, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            max_attempts: config.chapter_max_attempts.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            jitter: random_jitter(),
            sleeper,
        }
    }
}

impl std::fmt::Debug for FetchSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchSettings")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .finish_non_exhaustive()
    }
}

/// Fetches chapter batches for one site
#[derive(Clone)]
pub struct ChapterFetcher {
    loader: ContentLoader,
    profile: Arc<SiteProfile>,
    settings: FetchSettings,
    mode: LoaderMode,
    concurrency: usize,
    scratch: ScratchSpace,
}

impl ChapterFetcher {
    pub fn new(
        loader: ContentLoader,
        profile: Arc<SiteProfile>,
        settings: FetchSettings,
        mode: LoaderMode,
        concurrency: usize,
        scratch: ScratchSpace,
    ) -> Self {
        Self {
            loader,
            profile,
            settings,
            mode,
            concurrency: concurrency.max(1),
            scratch,
        }
    }

    fn semaphore(&self) -> Arc<Semaphore> {
        match (self.mode, self.loader.pool()) {
            (LoaderMode::Browser, Some(pool)) => pool.permits(),
            _ => Arc::new(Semaphore::new(self.concurrency)),
        }
    }

    /// Fetches every URL concurrently, one record per URL in request order
    pub async fn fetch_all(&self, urls: &[String]) -> Vec<ChapterRecord> {
        if urls.is_empty() {
            return Vec::new();
        }

        let semaphore = self.semaphore();
        let mut tasks = JoinSet::new();

        tracing::info!(
            "Fetching {} chapters ({:?}, up to {} at a time)",
            urls.len(),
            self.mode,
            semaphore.available_permits()
        );

        for (index, url) in urls.iter().enumerate() {
            let fetcher = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let url = url.clone();

            tasks.spawn(async move {
                let record = match semaphore.acquire_owned().await {
                    Ok(_permit) => fetcher.fetch_with_retry(&url).await,
                    Err(_) => {
                        tracing::warn!("Fetch permits closed before {} started", url);
                        ChapterRecord::sentinel(&url)
                    }
                };
                (index, record)
            });
        }

        let mut slots: Vec<Option<ChapterRecord>> = urls.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, record)) => slots[index] = Some(record),
                Err(e) => tracing::error!("Chapter task failed: {}", e),
            }
        }

        let records = slots
            .into_iter()
            .zip(urls)
            .map(|(slot, url)| slot.unwrap_or_else(|| ChapterRecord::sentinel(url)))
            .collect();

        resequence(records, urls)
    }

    /// Fetches one chapter, retrying any failure with jittered backoff
    async fn fetch_with_retry(&self, url: &str) -> ChapterRecord {
        let max_attempts = self.settings.max_attempts;

        for attempt in 1..=max_attempts {
            match self.fetch_one(url).await {
                Ok(record) => return record,
                Err(e) if attempt < max_attempts => {
                    let delay = chapter_backoff(self.settings.base_delay, attempt, (self.settings.jitter)());
                    tracing::warn!(
                        "Chapter {} attempt {}/{} failed: {}; retrying in {:?}",
                        url,
                        attempt,
                        max_attempts,
                        e,
                        delay
                    );
                    self.settings.sleeper.sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!("Chapter {} failed after {} attempts: {}", url, max_attempts, e);
                }
            }
        }

        ChapterRecord::sentinel(url)
    }

    async fn fetch_one(&self, url: &str) -> Result<ChapterRecord, HarvestError> {
        let page = self
            .loader
            .load(url, self.mode, self.profile.wait_selector.as_deref())
            .await?;
        let extracted = extract_chapter(&page.html, &page.requested_url, &self.profile)?;

        match extracted.content {
            ChapterContent::Text(body) => Ok(ChapterRecord::text(url, extracted.title, body)),
            ChapterContent::Images(sources) => {
                let dir = self.scratch.chapter_dir()?;
                let mut images = Vec::with_capacity(sources.len());

                for (index, source) in sources.iter().enumerate() {
                    match self.loader.fetch_bytes(source).await {
                        Ok(bytes) => {
                            let path = dir.path().join(image_file_name(index, source));
                            tokio::fs::write(&path, bytes).await?;
                            images.push(path);
                        }
                        Err(e) => tracing::warn!("Skipping image {} of {}: {}", source, url, e),
                    }
                }

                Ok(ChapterRecord::images(url, extracted.title, images, dir))
            }
        }
    }
}

/// Numbers records by the position of their URL in `urls` and sorts them
pub fn resequence(mut records: Vec<ChapterRecord>, urls: &[String]) -> Vec<ChapterRecord> {
    for record in &mut records {
        if let Some(position) = urls.iter().position(|u| *u == record.url) {
            record.sequence = position + 1;
        }
    }
    records.sort_by_key(|r| r.sequence);
    records
}

/// Zero-padded file name keeping the source extension when it looks sane
fn image_file_name(index: usize, source: &str) -> PathBuf {
    let extension = url::Url::parse(source)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .and_then(|name| name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()))
        .filter(|ext| (1..=5).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "jpg".to_string());

    PathBuf::from(format!("{:04}.{}", index + 1, extension))
}
