use serde::Deserialize;

/// Main configuration structure for Serial-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub harvester: HarvesterConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "site")]
    pub sites: Vec<SiteProfile>,
}

/// Fetch behaviour shared by every source
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HarvesterConfig {
    /// Global default for concurrent chapter fetches over plain HTTP
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Attempts for a single page load before it is reported unavailable
    #[serde(default = "default_loader_attempts")]
    pub loader_max_attempts: u32,

    /// Attempts per chapter before a sentinel record is produced
    #[serde(default = "default_chapter_attempts")]
    pub chapter_max_attempts: u32,

    /// Base delay for jittered per-chapter backoff (milliseconds)
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    /// Replaces the built-in user-agent rotation pool when non-empty
    #[serde(default)]
    pub user_agents: Vec<String>,

    /// Start update walks at the last recorded table-of-contents page
    #[serde(default = "default_true")]
    pub resume_from_last_toc_page: bool,
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            request_timeout_secs: default_request_timeout(),
            loader_max_attempts: default_loader_attempts(),
            chapter_max_attempts: default_chapter_attempts(),
            retry_base_delay_ms: default_retry_base_delay(),
            user_agents: Vec::new(),
            resume_from_last_toc_page: true,
        }
    }
}

/// Headless browser and page pool settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BrowserConfig {
    /// Maximum number of live browser pages
    #[serde(default = "default_pool_capacity")]
    pub pool_capacity: usize,

    /// Interval between pool checks while at capacity (milliseconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Timeout for each navigation and selector wait (seconds)
    #[serde(default = "default_request_timeout")]
    pub navigation_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub headless: bool,

    /// Explicit Chromium binary; searched on PATH otherwise
    #[serde(default)]
    pub executable: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            pool_capacity: default_pool_capacity(),
            poll_interval_ms: default_poll_interval(),
            navigation_timeout_secs: default_request_timeout(),
            headless: true,
            executable: None,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database file
    pub database_path: String,

    /// Directory receiving generated documents
    pub output_dir: String,

    /// Optional markdown run report
    #[serde(default)]
    pub summary_path: Option<String>,
}

/// Per-host scraping profile
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SiteProfile {
    /// Scheme and host this profile answers for (e.g. "https://www.example.com")
    pub authority: String,

    /// Table-of-contents page template with `{url}` and `{page}` placeholders
    #[serde(default = "default_pagination")]
    pub pagination: String,

    pub selectors: SiteSelectors,

    /// Overrides the global concurrency default
    #[serde(default)]
    pub concurrency: Option<usize>,

    #[serde(default)]
    pub requires_browser: bool,

    #[serde(default)]
    pub has_images_for_content: bool,

    /// Status text marking a finished work
    #[serde(default = "default_completed_marker")]
    pub completed_marker: String,

    /// Table of contents lists the newest chapter first
    #[serde(default)]
    pub toc_newest_first: bool,

    /// Added once to the parsed last page number
    #[serde(default)]
    pub page_offset: u32,

    /// Attribute of the last-page node holding the page number (text if unset)
    #[serde(default)]
    pub last_page_attribute: Option<String>,

    /// Query parameter carrying the page number inside the attribute value
    #[serde(default)]
    pub last_page_query_param: Option<String>,

    /// Selector awaited after browser navigation
    #[serde(default)]
    pub wait_selector: Option<String>,
}

/// CSS selectors for each extracted field
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SiteSelectors {
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub genres: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    pub chapter_links: String,
    pub chapter_title: String,
    pub content: String,
    #[serde(default)]
    pub alternate_content: Option<String>,
    #[serde(default)]
    pub last_page: Option<String>,
}

impl SiteSelectors {
    /// Every configured selector paired with its field name
    pub fn named(&self) -> Vec<(&'static str, &str)> {
        let mut all = vec![
            ("title", self.title.as_str()),
            ("chapter-links", self.chapter_links.as_str()),
            ("chapter-title", self.chapter_title.as_str()),
            ("content", self.content.as_str()),
        ];
        let optional = [
            ("author", &self.author),
            ("genres", &self.genres),
            ("description", &self.description),
            ("thumbnail", &self.thumbnail),
            ("status", &self.status),
            ("alternate-content", &self.alternate_content),
            ("last-page", &self.last_page),
        ];
        for (name, value) in optional {
            if let Some(selector) = value {
                all.push((name, selector.as_str()));
            }
        }
        all
    }
}

fn default_concurrency() -> usize {
    8
}

fn default_request_timeout() -> u64 {
    30
}

fn default_loader_attempts() -> u32 {
    3
}

fn default_chapter_attempts() -> u32 {
    6
}

fn default_retry_base_delay() -> u64 {
    1000
}

fn default_pool_capacity() -> usize {
    1
}

fn default_poll_interval() -> u64 {
    500
}

fn default_pagination() -> String {
    "{url}?page={page}".to_string()
}

fn default_completed_marker() -> String {
    "Completed".to_string()
}

fn default_true() -> bool {
    true
}
