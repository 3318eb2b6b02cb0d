//! Per-site scraping strategies
//!
//! A strategy turns a novel URL into a [`NovelSnapshot`] and fetches chapter
//! batches. [`ProfileStrategy`] drives everything from a [`SiteProfile`];
//! sites needing custom behaviour implement [`ScrapeStrategy`] directly or
//! swap individual [`FieldExtractors`].

use crate::config::SiteProfile;
use crate::loader::{LoadedPage, LoaderMode};
use crate::model::{ChapterLink, ChapterRecord, NovelSnapshot};
use crate::scrape::{
    resolve_stop_page, FieldExtractors, PaginationWalker, ScrapeContext, WalkRequest,
};
use crate::HarvestError;
use async_trait::async_trait;

/// What to walk for one snapshot
#[derive(Debug, Clone)]
pub struct SnapshotRequest {
    pub novel_url: String,

    /// Walk through the last page; otherwise only `start_page` is visited
    pub get_all: bool,

    pub start_page: u32,
}

impl SnapshotRequest {
    /// Full walk from the first page
    pub fn full(novel_url: impl Into<String>) -> Self {
        Self {
            novel_url: novel_url.into(),
            get_all: true,
            start_page: 1,
        }
    }

    /// Full walk starting at a previously recorded page
    pub fn resume(novel_url: impl Into<String>, start_page: u32) -> Self {
        Self {
            start_page: start_page.max(1),
            ..Self::full(novel_url)
        }
    }
}

#[async_trait]
pub trait ScrapeStrategy: Send + Sync {
    /// Whether pages must be rendered in the headless browser
    fn requires_browser(&self) -> bool;

    fn mode(&self) -> LoaderMode {
        LoaderMode::for_site(self.requires_browser())
    }

    /// Loads metadata and walks the table of contents
    async fn scrape(
        &self,
        ctx: &ScrapeContext,
        request: &SnapshotRequest,
    ) -> Result<NovelSnapshot, HarvestError>;

    /// Fetches chapters; failures become sentinel records
    async fn fetch_chapters(&self, ctx: &ScrapeContext, urls: &[String]) -> Vec<ChapterRecord> {
        ctx.fetcher(self.mode()).fetch_all(urls).await
    }
}

/// Strategy configured entirely by a site profile
#[derive(Debug, Clone)]
pub struct ProfileStrategy {
    extractors: FieldExtractors,
    requires_browser: bool,
}

impl ProfileStrategy {
    pub fn new(profile: &SiteProfile) -> Self {
        Self {
            extractors: FieldExtractors::default(),
            requires_browser: profile.requires_browser,
        }
    }

    pub fn with_extractors(mut self, extractors: FieldExtractors) -> Self {
        self.extractors = extractors;
        self
    }
}

/// Metadata read from the landing page
struct Landing {
    title: String,
    author: Option<String>,
    genres: Vec<String>,
    description: Vec<String>,
    status: Option<String>,
    thumbnail_url: Option<String>,
    last_page: Option<u32>,
}

impl ProfileStrategy {
    fn read_landing(&self, page: &LoadedPage, profile: &SiteProfile) -> Result<Landing, HarvestError> {
        let base = page.base_url()?;
        let document = page.document();
        let fields = &self.extractors;

        let title = (fields.title)(&document, profile)?.ok_or_else(|| HarvestError::Extraction {
            url: page.url.clone(),
            message: format!("no novel title at '{}'", profile.selectors.title),
        })?;

        Ok(Landing {
            title,
            author: (fields.author)(&document, profile)?,
            genres: (fields.genres)(&document, profile)?,
            description: (fields.description)(&document, profile)?,
            status: (fields.status)(&document, profile)?,
            thumbnail_url: (fields.thumbnail_url)(&document, &base, profile)?,
            last_page: (fields.last_page)(&document, &base, profile)?,
        })
    }
}

#[async_trait]
impl ScrapeStrategy for ProfileStrategy {
    fn requires_browser(&self) -> bool {
        self.requires_browser
    }

    async fn scrape(
        &self,
        ctx: &ScrapeContext,
        request: &SnapshotRequest,
    ) -> Result<NovelSnapshot, HarvestError> {
        let profile = ctx.profile.as_ref();
        let mode = self.mode();

        let landing_page = ctx
            .loader
            .load(&request.novel_url, mode, profile.wait_selector.as_deref())
            .await?;
        let landing = self.read_landing(&landing_page, profile)?;
        let novel_url = landing_page.url;

        let stop_page = if request.get_all {
            resolve_stop_page(landing.last_page, profile.page_offset, request.start_page)
        } else {
            request.start_page
        };

        let walker = PaginationWalker::new(&ctx.loader, profile, &self.extractors, mode);
        let walk = walker
            .walk(&WalkRequest {
                novel_url: novel_url.clone(),
                start_page: request.start_page,
                stop_page,
            })
            .await?;

        let thumbnail = match &landing.thumbnail_url {
            Some(url) => match ctx.loader.fetch_bytes(url).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    tracing::warn!("Could not download thumbnail {}: {}", url, e);
                    None
                }
            },
            None => None,
        };

        let completed = is_completed(landing.status.as_deref(), &profile.completed_marker);

        let mut snapshot = NovelSnapshot {
            url: novel_url,
            title: landing.title,
            author: landing.author,
            genres: landing.genres,
            description: landing.description,
            thumbnail,
            status: landing.status,
            completed,
            chapters: Vec::new(),
            last_toc_url: walk.last_toc_url,
            last_toc_page: walk.last_toc_page,
        };
        snapshot.push_chapters(reading_order(walk.chapters, profile.toc_newest_first));

        tracing::info!(
            "Scraped '{}': {} chapters across pages {}..={}",
            snapshot.title,
            snapshot.chapters.len(),
            request.start_page.min(stop_page),
            stop_page
        );

        Ok(snapshot)
    }
}

/// Case-insensitive match of the completed-status marker
pub(crate) fn is_completed(status: Option<&str>, marker: &str) -> bool {
    let marker = marker.trim().to_lowercase();
    !marker.is_empty()
        && status.map_or(false, |s| s.to_lowercase().contains(&marker))
}

/// Puts newest-first listings into reading order
fn reading_order(mut links: Vec<ChapterLink>, newest_first: bool) -> Vec<ChapterLink> {
    if newest_first {
        links.reverse();
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{fixed_jitter, test_loader, RecordingSleeper};
    use crate::model::ScratchSpace;
    use crate::scrape::{fixtures, FetchSettings};
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn context(profile: SiteProfile) -> ScrapeContext {
        let sleeper = Arc::new(RecordingSleeper::default());
        ScrapeContext::new(
            profile.authority.clone(),
            Arc::new(profile),
            test_loader(1, Arc::clone(&sleeper)),
            FetchSettings {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
                jitter: fixed_jitter(1.0),
                sleeper,
            },
            4,
            ScratchSpace::new().unwrap(),
        )
    }

    async fn mount_novel(server: &MockServer, status: &str) {
        Mock::given(method("GET"))
            .and(path("/novel"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<ul class="chapters"><a href="/c/3">Three</a><a href="/c/2">Two</a></ul>"#,
            ))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/novel"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<ul class="chapters"><a href="/c/2">Two</a><a href="/c/1">One</a></ul>"#,
            ))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/novel"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"<h1>Tale</h1><div class="author">Someone</div>
                <div class="status">{}</div><a class="last" href="/novel?page=2">Last</a>"#,
                status
            )))
            .mount(server)
            .await;
    }

    #[test]
    fn test_is_completed_case_insensitive() {
        assert!(is_completed(Some("Status: COMPLETED"), "Completed"));
        assert!(!is_completed(Some("Ongoing"), "Completed"));
        assert!(!is_completed(None, "Completed"));
        assert!(!is_completed(Some("anything"), "  "));
    }

    #[tokio::test]
    async fn test_scrape_builds_snapshot_in_reading_order() {
        let server = MockServer::start().await;
        mount_novel(&server, "completed").await;

        let mut profile = fixtures::profile(&server.uri());
        profile.toc_newest_first = true;
        let strategy = ProfileStrategy::new(&profile);
        let ctx = context(profile);

        let snapshot = strategy
            .scrape(&ctx, &SnapshotRequest::full(format!("{}/novel", server.uri())))
            .await
            .unwrap();

        assert_eq!(snapshot.title, "Tale");
        assert_eq!(snapshot.author.as_deref(), Some("Someone"));
        assert!(snapshot.completed);
        assert_eq!(snapshot.last_toc_page, 2);

        let titles: Vec<_> = snapshot.chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["One", "Two", "Three"]);
    }

    #[tokio::test]
    async fn test_scrape_without_get_all_visits_start_page_only() {
        let server = MockServer::start().await;
        mount_novel(&server, "Ongoing").await;

        let profile = fixtures::profile(&server.uri());
        let strategy = ProfileStrategy::new(&profile);
        let ctx = context(profile);

        let request = SnapshotRequest {
            get_all: false,
            ..SnapshotRequest::full(format!("{}/novel", server.uri()))
        };
        let snapshot = strategy.scrape(&ctx, &request).await.unwrap();

        assert!(!snapshot.completed);
        assert_eq!(snapshot.chapters.len(), 2);
        assert_eq!(snapshot.last_toc_page, 1);
    }

    #[tokio::test]
    async fn test_missing_title_fails_scrape() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>maintenance</p>"))
            .mount(&server)
            .await;

        let profile = fixtures::profile(&server.uri());
        let strategy = ProfileStrategy::new(&profile);
        let ctx = context(profile);

        let err = strategy
            .scrape(&ctx, &SnapshotRequest::full(format!("{}/novel", server.uri())))
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::Extraction { .. }));
    }
}
