//! Serial-Harvest: incremental acquisition of serialized fiction and comics
//!
//! This crate walks paginated tables of contents, fetches chapters
//! concurrently over plain HTTP or a pooled headless browser, and tracks a
//! per-source checkpoint so later runs only fetch what is new.

pub mod browser;
pub mod checkpoint;
pub mod config;
pub mod harvester;
pub mod loader;
pub mod model;
pub mod output;
pub mod scrape;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Serial-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No site profile or strategy registered for {authority}")]
    NoStrategy { authority: String },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP status {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("{url} still unavailable after {attempts} attempts")]
    Transient { url: String, attempts: u32 },

    #[error("Extraction failed for {url}: {message}")]
    Extraction { url: String, message: String },

    #[error(
        "Checkpoint for {url} not found in the table of contents \
         (current chapter: {current:?}, last saved chapter: {last_saved:?}); \
         the site may have been restructured, remove and re-add the source"
    )]
    CheckpointInconsistency {
        url: String,
        current: Option<String>,
        last_saved: Option<String>,
    },

    #[error("Browser error: {0}")]
    Browser(#[from] browser::BrowserError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// Returns true for failures worth retrying (timeouts, rate limits,
    /// server errors, dropped connections, browser hiccups)
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transient { .. } => true,
            Self::Browser(e) => !matches!(
                e,
                browser::BrowserError::PoolClosed | browser::BrowserError::Unavailable
            ),
            Self::Http { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector '{selector}' for {field}")]
    InvalidSelector { field: String, selector: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL: {0}")]
    MissingHost(String),
}

/// Result type alias for Serial-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{Config, SiteProfile};
pub use harvester::{Harvester, HarvestOutcome};
pub use model::{ChapterRecord, NovelSnapshot};
pub use url::authority_key;
