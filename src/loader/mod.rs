//! Retrying content loader
//!
//! This module performs single page loads for the scraping pipeline:
//! - Plain HTTP or browser-rendered loads, chosen per site
//! - Round-robin user-agent rotation per loader context
//! - Exponential backoff (2^attempt seconds) on transient failures
//! - Canonical-link resolution of the loaded URL

mod backoff;
mod http;
mod user_agents;

pub use backoff::{
    chapter_backoff, fixed_jitter, loader_backoff, random_jitter, Jitter, RecordingSleeper,
    Sleeper, TokioSleeper,
};
pub use http::build_http_client;
pub use user_agents::{UserAgentRotator, DEFAULT_USER_AGENTS};

use crate::browser::{BrowserError, PagePool, RenderedPage};
use crate::config::{BrowserConfig, HarvesterConfig};
use crate::url::resolve_link;
use crate::HarvestError;
use reqwest::Client;
use scraper::{Html, Selector};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// How a page is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderMode {
    Http,
    Browser,
}

impl LoaderMode {
    pub fn for_site(requires_browser: bool) -> Self {
        if requires_browser {
            Self::Browser
        } else {
            Self::Http
        }
    }
}

/// A loaded document
#[derive(Debug, Clone)]
pub struct LoadedPage {
    /// URL that was asked for
    pub requested_url: String,

    /// Canonical URL when the document declares one, else the final URL
    pub url: String,

    pub html: String,
}

impl LoadedPage {
    fn new(requested_url: &str, final_url: String, html: String) -> Self {
        let url = canonical_url(&html, &final_url).unwrap_or(final_url);
        if url != requested_url {
            tracing::debug!("Resolved {} to {}", requested_url, url);
        }
        Self {
            requested_url: requested_url.to_string(),
            url,
            html,
        }
    }

    pub fn document(&self) -> Html {
        Html::parse_document(&self.html)
    }

    /// Base for resolving relative links found in this page
    pub fn base_url(&self) -> Result<Url, HarvestError> {
        Ok(Url::parse(&self.requested_url)?)
    }
}

/// Timeouts and attempt cap for one loader context
#[derive(Debug, Clone)]
pub struct LoaderSettings {
    pub request_timeout: Duration,
    pub navigation_timeout: Duration,
    pub max_attempts: u32,
}

impl LoaderSettings {
    pub fn from_config(harvester: &HarvesterConfig, browser: &BrowserConfig) -> Self {
        Self {
            request_timeout: Duration::from_secs(harvester.request_timeout_secs),
            navigation_timeout: Duration::from_secs(browser.navigation_timeout_secs),
            max_attempts: harvester.loader_max_attempts.max(1),
        }
    }
}

struct LoaderContext {
    client: Client,
    user_agents: UserAgentRotator,
    settings: LoaderSettings,
    sleeper: Arc<dyn Sleeper>,
}

/// Page loader with its own client, rotation state and optional page pool
#[derive(Clone)]
pub struct ContentLoader {
    context: Arc<LoaderContext>,
    pool: Option<Arc<PagePool>>,
}

impl ContentLoader {
    pub fn new(
        client: Client,
        user_agents: UserAgentRotator,
        settings: LoaderSettings,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            context: Arc::new(LoaderContext {
                client,
                user_agents,
                settings,
                sleeper,
            }),
            pool: None,
        }
    }

    /// Builds a loader from configuration with a fresh HTTP client
    pub fn from_config(
        harvester: &HarvesterConfig,
        browser: &BrowserConfig,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self, HarvestError> {
        let settings = LoaderSettings::from_config(harvester, browser);
        let client = build_http_client(settings.request_timeout).map_err(|e| HarvestError::Http {
            url: String::new(),
            source: e,
        })?;
        Ok(Self::new(
            client,
            UserAgentRotator::new(&harvester.user_agents),
            settings,
            sleeper,
        ))
    }

    /// Attaches the page pool used for browser-rendered loads
    pub fn with_pool(mut self, pool: Arc<PagePool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn pool(&self) -> Option<&Arc<PagePool>> {
        self.pool.as_ref()
    }

    pub fn user_agents(&self) -> &UserAgentRotator {
        &self.context.user_agents
    }

    pub fn settings(&self) -> &LoaderSettings {
        &self.context.settings
    }

    /// Loads a page, borrowing a pooled browser page in browser mode
    pub async fn load(
        &self,
        url: &str,
        mode: LoaderMode,
        wait_selector: Option<&str>,
    ) -> Result<LoadedPage, HarvestError> {
        match mode {
            LoaderMode::Http => self.load_http(url).await,
            LoaderMode::Browser => {
                let pool = self.pool.as_ref().ok_or(BrowserError::Unavailable)?;
                let mut page = pool.acquire().await?;
                let result = self.load_rendered(page.as_mut(), url, wait_selector).await;
                pool.release(page).await;
                result
            }
        }
    }

    /// Like [`ContentLoader::load`], but logs and returns None when unavailable
    pub async fn try_load(
        &self,
        url: &str,
        mode: LoaderMode,
        wait_selector: Option<&str>,
    ) -> Option<LoadedPage> {
        match self.load(url, mode, wait_selector).await {
            Ok(page) => Some(page),
            Err(e) => {
                tracing::warn!("Giving up on {}: {}", url, e);
                None
            }
        }
    }

    /// Loads a page over plain HTTP
    pub async fn load_http(&self, url: &str) -> Result<LoadedPage, HarvestError> {
        let ctx = &self.context;
        let body = self
            .retry(url, || {
                http::fetch_text(
                    &ctx.client,
                    url,
                    ctx.user_agents.next(),
                    ctx.settings.request_timeout,
                )
            })
            .await?;
        Ok(LoadedPage::new(url, body.final_url, body.body))
    }

    /// Downloads a binary resource over plain HTTP
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, HarvestError> {
        let ctx = &self.context;
        let body = self
            .retry(url, || {
                http::fetch_bytes(
                    &ctx.client,
                    url,
                    ctx.user_agents.next(),
                    ctx.settings.request_timeout,
                )
            })
            .await?;
        Ok(body.body)
    }

    /// Loads a page in a browser tab the caller already holds
    pub async fn load_rendered(
        &self,
        page: &mut dyn RenderedPage,
        url: &str,
        wait_selector: Option<&str>,
    ) -> Result<LoadedPage, HarvestError> {
        let max_attempts = self.context.settings.max_attempts;

        for attempt in 0..max_attempts {
            match self.render_once(page, url, wait_selector).await {
                Ok(loaded) => return Ok(loaded),
                Err(e) if e.is_transient() => self.backoff(url, attempt, &e).await,
                Err(e) => return Err(e),
            }
        }

        Err(HarvestError::Transient {
            url: url.to_string(),
            attempts: max_attempts,
        })
    }

    async fn render_once(
        &self,
        page: &mut dyn RenderedPage,
        url: &str,
        wait_selector: Option<&str>,
    ) -> Result<LoadedPage, HarvestError> {
        let timeout = self.context.settings.navigation_timeout;
        page.navigate(url, timeout).await?;
        if let Some(selector) = wait_selector {
            page.wait_for_selector(selector, timeout).await?;
        }
        let html = page.content().await?;
        let final_url = page
            .current_url()
            .await?
            .unwrap_or_else(|| url.to_string());
        Ok(LoadedPage::new(url, final_url, html))
    }

    async fn retry<T, F, Fut>(&self, url: &str, mut op: F) -> Result<T, HarvestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, HarvestError>>,
    {
        let max_attempts = self.context.settings.max_attempts;

        for attempt in 0..max_attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => self.backoff(url, attempt, &e).await,
                Err(e) => return Err(e),
            }
        }

        Err(HarvestError::Transient {
            url: url.to_string(),
            attempts: max_attempts,
        })
    }

    /// Sleeps before the next attempt; no sleep after the last one
    async fn backoff(&self, url: &str, attempt: u32, error: &HarvestError) {
        let max_attempts = self.context.settings.max_attempts;
        if attempt + 1 >= max_attempts {
            tracing::warn!("Attempt {}/{} for {} failed: {}", attempt + 1, max_attempts, url, error);
            return;
        }

        let delay = loader_backoff(attempt);
        tracing::warn!(
            "Attempt {}/{} for {} failed: {}; retrying in {:?}",
            attempt + 1,
            max_attempts,
            url,
            error,
            delay
        );
        self.context.sleeper.sleep(delay).await;
    }
}

/// Finds a canonical link differing from `page_url`
fn canonical_url(html: &str, page_url: &str) -> Option<String> {
    let base = Url::parse(page_url).ok()?;
    let document = Html::parse_document(html);
    let selector = Selector::parse("link[rel='canonical'][href]").ok()?;

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .find_map(|href| resolve_link(href, &base))
        .filter(|canonical| canonical != page_url)
}

#[cfg(test)]
pub(crate) use tests::loader as test_loader;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::browser::{pool_with, FakeProvider};
    use std::collections::HashMap;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) fn loader(max_attempts: u32, sleeper: Arc<RecordingSleeper>) -> ContentLoader {
        ContentLoader::new(
            build_http_client(Duration::from_secs(5)).unwrap(),
            UserAgentRotator::default(),
            LoaderSettings {
                request_timeout: Duration::from_secs(5),
                navigation_timeout: Duration::from_secs(5),
                max_attempts,
            },
            sleeper,
        )
    }

    #[test]
    fn test_canonical_url_detected() {
        let html = r#"<html><head><link rel="canonical" href="/novel/real"></head></html>"#;
        assert_eq!(
            canonical_url(html, "https://example.com/novel/alias"),
            Some("https://example.com/novel/real".to_string())
        );
    }

    #[test]
    fn test_canonical_same_as_page_ignored() {
        let html = r#"<link rel="canonical" href="https://example.com/novel">"#;
        assert_eq!(canonical_url(html, "https://example.com/novel"), None);
    }

    #[test]
    fn test_loader_mode_for_site() {
        assert_eq!(LoaderMode::for_site(true), LoaderMode::Browser);
        assert_eq!(LoaderMode::for_site(false), LoaderMode::Http);
    }

    #[tokio::test]
    async fn test_load_http_resolves_canonical() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alias"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><head><link rel="canonical" href="/novel"></head></html>"#,
            ))
            .mount(&server)
            .await;

        let sleeper = Arc::new(RecordingSleeper::default());
        let page = loader(3, sleeper)
            .load_http(&format!("{}/alias", server.uri()))
            .await
            .unwrap();

        assert_eq!(page.url, format!("{}/novel", server.uri()));
        assert_eq!(page.requested_url, format!("{}/alias", server.uri()));
    }

    #[tokio::test]
    async fn test_rate_limit_retried_with_exponential_backoff() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/busy"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/busy"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>ok</p>"))
            .mount(&server)
            .await;

        let sleeper = Arc::new(RecordingSleeper::default());
        let page = loader(3, Arc::clone(&sleeper))
            .load_http(&format!("{}/busy", server.uri()))
            .await
            .unwrap();

        assert!(page.html.contains("ok"));
        assert_eq!(
            sleeper.recorded(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[tokio::test]
    async fn test_exhaustion_reports_transient_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(6)
            .mount(&server)
            .await;

        let sleeper = Arc::new(RecordingSleeper::default());
        let loader = loader(3, Arc::clone(&sleeper));
        let url = format!("{}/down", server.uri());

        let err = loader.load_http(&url).await.unwrap_err();
        assert!(matches!(err, HarvestError::Transient { attempts: 3, .. }));
        assert_eq!(sleeper.recorded().len(), 2);

        assert!(loader.try_load(&url, LoaderMode::Http, None).await.is_none());
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let sleeper = Arc::new(RecordingSleeper::default());
        let err = loader(3, Arc::clone(&sleeper))
            .load_http(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, HarvestError::HttpStatus { status: 404, .. }));
        assert!(sleeper.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_user_agents_rotate_per_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let loader = loader(1, Arc::new(RecordingSleeper::default()));
        loader.load_http(&server.uri()).await.unwrap();
        loader.load_http(&server.uri()).await.unwrap();

        let agents: Vec<String> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| {
                r.headers
                    .get("user-agent")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string()
            })
            .collect();
        assert_eq!(agents, vec![DEFAULT_USER_AGENTS[0], DEFAULT_USER_AGENTS[1]]);
    }

    #[tokio::test]
    async fn test_browser_load_uses_pool() {
        let mut pages = HashMap::new();
        pages.insert(
            "https://example.com/toc".to_string(),
            "<html><body><h1>Rendered</h1></body></html>".to_string(),
        );
        let provider = Arc::new(FakeProvider::new(pages));
        let pool = Arc::new(pool_with(provider, 1));

        let loader = loader(2, Arc::new(RecordingSleeper::default())).with_pool(Arc::clone(&pool));
        let page = loader
            .load("https://example.com/toc", LoaderMode::Browser, Some("h1"))
            .await
            .unwrap();

        assert!(page.html.contains("Rendered"));
        assert_eq!(pool.idle_pages(), 1);
    }

    #[tokio::test]
    async fn test_browser_mode_without_pool_fails() {
        let loader = loader(1, Arc::new(RecordingSleeper::default()));
        let err = loader
            .load("https://example.com/toc", LoaderMode::Browser, None)
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::Browser(BrowserError::Unavailable)));
    }
}
