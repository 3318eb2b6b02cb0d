//! Harvester coordinator - per-source orchestration
//!
//! For a new source the whole table of contents is walked and every chapter
//! fetched. For a known source the fresh snapshot is compared with the
//! stored checkpoint and only the delta is fetched, merged and appended.

use crate::browser::{ChromiumProvider, PagePool, PoolSettings};
use crate::checkpoint::{self, Checkpoint, Resolution};
use crate::config::Config;
use crate::harvester::{HarvestOutcome, HarvestStatus};
use crate::loader::{ContentLoader, Jitter, Sleeper, TokioSleeper};
use crate::model::{ChapterRecord, NovelRecord, ScratchSpace};
use crate::output::{MarkdownOutput, OutputGenerator, RunSummary};
use crate::scrape::{Dispatch, FetchSettings, ScrapeContext, SnapshotRequest, StrategyRegistry};
use crate::storage::NovelRepository;
use crate::HarvestError;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Main harvester structure
pub struct Harvester {
    config: Arc<Config>,
    registry: StrategyRegistry,
    repository: Arc<Mutex<dyn NovelRepository>>,
    output: Arc<dyn OutputGenerator>,
    loader: ContentLoader,
    fetch: FetchSettings,
    scratch: ScratchSpace,
}

impl Harvester {
    /// Creates a harvester sleeping on the tokio timer
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `repository` - Store of previously harvested sources
    ///
    /// # Returns
    ///
    /// * `Ok(Harvester)` - Ready to harvest
    /// * `Err(HarvestError)` - Failed to build the HTTP client, registry or scratch space
    pub fn new<R>(config: Config, repository: R) -> Result<Self, HarvestError>
    where
        R: NovelRepository + 'static,
    {
        Self::with_sleeper(config, repository, Arc::new(TokioSleeper))
    }

    /// Creates a harvester whose retry and polling delays go through `sleeper`
    pub fn with_sleeper<R>(
        config: Config,
        repository: R,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self, HarvestError>
    where
        R: NovelRepository + 'static,
    {
        let registry = StrategyRegistry::from_profiles(&config.sites)?;
        let mut loader =
            ContentLoader::from_config(&config.harvester, &config.browser, Arc::clone(&sleeper))?;

        if config.sites.iter().any(|site| site.requires_browser) {
            let provider = Arc::new(ChromiumProvider::new(config.browser.clone()));
            let pool = PagePool::new(
                provider,
                PoolSettings {
                    capacity: config.browser.pool_capacity,
                    poll_interval: Duration::from_millis(config.browser.poll_interval_ms),
                    user_agent: loader.user_agents().primary().to_string(),
                },
                Arc::clone(&sleeper),
            );
            loader = loader.with_pool(Arc::new(pool));
        }

        let repository: Arc<Mutex<dyn NovelRepository>> = Arc::new(Mutex::new(repository));
        let output = Arc::new(MarkdownOutput::new(&config.output.output_dir));
        let fetch = FetchSettings::from_config(&config.harvester, sleeper);

        Ok(Self {
            config: Arc::new(config),
            registry,
            repository,
            output,
            loader,
            fetch,
            scratch: ScratchSpace::new()?,
        })
    }

    /// Replaces the per-chapter backoff jitter source
    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.fetch.jitter = jitter;
        self
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Registry for installing site-specific strategies
    pub fn registry_mut(&mut self) -> &mut StrategyRegistry {
        &mut self.registry
    }

    pub fn repository(&self) -> Arc<Mutex<dyn NovelRepository>> {
        Arc::clone(&self.repository)
    }

    /// Run-wide scratch root for image chapters
    pub fn scratch(&self) -> &ScratchSpace {
        &self.scratch
    }

    /// Harvests every source in order; one failure never stops the batch
    pub async fn harvest_all(&self, uris: &[String]) -> RunSummary {
        let mut summary = RunSummary::new();

        for uri in uris {
            match self.harvest(uri).await {
                Ok(outcome) => {
                    tracing::info!(
                        "{}: {} ({} chapters fetched)",
                        uri,
                        outcome.status,
                        outcome.chapters_fetched
                    );
                    summary.record(outcome);
                }
                Err(e) => {
                    tracing::error!("Harvest of {} failed: {}", uri, e);
                    summary.record_failure(uri, &e);
                }
            }
        }

        summary.finish();
        summary
    }

    /// Harvests one source: a full acquisition when unknown, an update otherwise
    ///
    /// # Errors
    ///
    /// * `HarvestError::NoStrategy` - No site profile for the URL's authority
    /// * `HarvestError::CheckpointInconsistency` - The stored checkpoint is no
    ///   longer listed by the site
    /// * Loader, storage and output errors for this source
    pub async fn harvest(&self, uri: &str) -> Result<HarvestOutcome, HarvestError> {
        let dispatch = self.registry.dispatch(uri)?;
        let ctx = ScrapeContext::new(
            dispatch.authority.clone(),
            Arc::clone(&dispatch.profile),
            self.loader.clone(),
            self.fetch.clone(),
            self.config.harvester.concurrency,
            self.scratch.clone(),
        );

        let existing = self
            .repository
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_by_url(uri)?;

        match existing {
            None => self.add_source(uri, &dispatch, &ctx).await,
            Some(record) => self.update_source(uri, record, &dispatch, &ctx).await,
        }
    }

    async fn add_source(
        &self,
        uri: &str,
        dispatch: &Dispatch,
        ctx: &ScrapeContext,
    ) -> Result<HarvestOutcome, HarvestError> {
        tracing::info!("Adding new source {}", uri);

        let snapshot = dispatch
            .strategy
            .scrape(ctx, &SnapshotRequest::full(uri))
            .await?;
        let mut chapters = dispatch
            .strategy
            .fetch_chapters(ctx, &snapshot.chapter_urls())
            .await;

        let record = NovelRecord::from_snapshot(uri, &snapshot, &chapters);
        let document = self.output.generate(&record, &chapters)?;
        let outcome = HarvestOutcome::new(
            uri,
            &record.title,
            HarvestStatus::Added,
            &chapters,
            Some(document),
        );

        release_scratch(&mut chapters);
        self.save(&record)?;
        Ok(outcome)
    }

    async fn update_source(
        &self,
        uri: &str,
        mut record: NovelRecord,
        dispatch: &Dispatch,
        ctx: &ScrapeContext,
    ) -> Result<HarvestOutcome, HarvestError> {
        let checkpoint = Checkpoint::from_record(&record);
        let resume_page = if checkpoint.is_empty() {
            None
        } else {
            self.resume_page(&record, dispatch)
        };

        tracing::info!(
            "Checking {} for updates ({} chapters saved, starting at page {})",
            uri,
            record.total_chapters(),
            resume_page.unwrap_or(1)
        );

        let request = SnapshotRequest::resume(uri, resume_page.unwrap_or(1));
        let mut snapshot = dispatch.strategy.scrape(ctx, &request).await?;
        let mut resolution = checkpoint::resolve(uri, &checkpoint, &snapshot);

        if resume_page.is_some()
            && matches!(resolution, Err(HarvestError::CheckpointInconsistency { .. }))
        {
            tracing::warn!(
                "Checkpoint for {} not found from page {}, re-walking from page 1",
                uri,
                request.start_page
            );
            snapshot = dispatch
                .strategy
                .scrape(ctx, &SnapshotRequest::full(uri))
                .await?;
            resolution = checkpoint::resolve(uri, &checkpoint, &snapshot);
        }

        let delta = match resolution? {
            Resolution::UpToDate => return self.mark_up_to_date(uri, record),
            Resolution::Delta(delta) => delta,
        };

        if delta.is_empty() {
            // Checkpoint found through the last saved chapter only
            record.merge_update(&snapshot, &[]);
            self.save(&record)?;
            return Ok(HarvestOutcome::new(uri, &record.title, HarvestStatus::UpToDate, &[], None));
        }

        tracing::info!("{} new chapters for {}", delta.len(), uri);
        let mut chapters = dispatch.strategy.fetch_chapters(ctx, &delta).await;

        record.merge_update(&snapshot, &chapters);
        let document = self.output.update(&record, &chapters)?;
        let outcome = HarvestOutcome::new(
            uri,
            &record.title,
            HarvestStatus::Updated,
            &chapters,
            Some(document),
        );

        release_scratch(&mut chapters);
        self.save(&record)?;
        Ok(outcome)
    }

    /// Page to resume the walk from, if resuming applies to this source
    fn resume_page(&self, record: &NovelRecord, dispatch: &Dispatch) -> Option<u32> {
        let resumable = self.config.harvester.resume_from_last_toc_page
            && !dispatch.profile.toc_newest_first
            && record.last_toc_page > 1;
        resumable.then_some(record.last_toc_page)
    }

    fn mark_up_to_date(&self, uri: &str, mut record: NovelRecord) -> Result<HarvestOutcome, HarvestError> {
        tracing::info!("{} is up to date", uri);
        record.touch();
        self.save(&record)?;
        Ok(HarvestOutcome::new(uri, &record.title, HarvestStatus::UpToDate, &[], None))
    }

    fn save(&self, record: &NovelRecord) -> Result<(), HarvestError> {
        self.repository
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .save(record)?;
        Ok(())
    }

    /// Resolves each URL to its site without fetching anything
    pub fn plan(&self, uris: &[String]) -> Vec<(String, Result<Dispatch, HarvestError>)> {
        uris.iter()
            .map(|uri| (uri.clone(), self.registry.dispatch(uri)))
            .collect()
    }

    /// Closes the shared browser, if one was started
    pub async fn shutdown(&self) {
        if let Some(pool) = self.loader.pool() {
            pool.dispose().await;
        }
    }
}

fn release_scratch(chapters: &mut [ChapterRecord]) {
    for chapter in chapters {
        chapter.release_scratch();
    }
}
