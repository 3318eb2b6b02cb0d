//! Browser-rendered page access
//!
//! The headless browser is an external capability hidden behind three traits
//! so the pool, loader and fetcher can run against a fake in tests:
//!
//! - [`RenderedPageProvider`] launches a shared [`BrowserSession`]
//! - [`BrowserSession`] opens [`RenderedPage`] handles
//! - [`PagePool`] keeps a bounded set of stealth pages for reuse

mod chromium;
mod pool;

pub use chromium::{find_chromium, ChromiumProvider};
pub use pool::{PagePool, PoolSettings};

#[cfg(test)]
pub(crate) use pool::tests::{pool_with, FakeProvider};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during browser operations
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Page creation failed: {0}")]
    PageCreation(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Content extraction error: {0}")]
    Content(String),

    #[error("Page pool is closed")]
    PoolClosed,

    #[error("No browser pool configured for browser-rendered loads")]
    Unavailable,
}

/// Launches the shared browser process
#[async_trait]
pub trait RenderedPageProvider: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn BrowserSession>, BrowserError>;
}

/// A running browser able to open pages
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn RenderedPage>, BrowserError>;

    /// False once the underlying process has gone away
    fn is_connected(&self) -> bool;

    async fn close(&self) -> Result<(), BrowserError>;
}

/// A single browser tab
#[async_trait]
pub trait RenderedPage: Send + Sync {
    /// Hides automation markers and sets a realistic user agent
    async fn apply_stealth(&mut self, user_agent: &str) -> Result<(), BrowserError>;

    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration)
        -> Result<(), BrowserError>;

    /// Rendered document HTML
    async fn content(&mut self) -> Result<String, BrowserError>;

    async fn current_url(&mut self) -> Result<Option<String>, BrowserError>;

    fn is_closed(&self) -> bool;

    async fn close(self: Box<Self>) -> Result<(), BrowserError>;
}
