//! Bounded pool of reusable stealth pages over one lazily launched browser

use crate::browser::{BrowserError, BrowserSession, RenderedPage, RenderedPageProvider};
use crate::loader::Sleeper;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Pool sizing and page setup
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Maximum number of live pages
    pub capacity: usize,

    /// Wait between checks while every page is in use
    pub poll_interval: Duration,

    /// User agent applied to every new page
    pub user_agent: String,
}

/// Pool of browser pages
///
/// Exhaustion is backpressure, not an error: `acquire` polls until a page is
/// released. Invalid pages are discarded and a dead browser is relaunched on
/// the next page creation.
pub struct PagePool {
    provider: Arc<dyn RenderedPageProvider>,
    browser: tokio::sync::Mutex<Option<Arc<dyn BrowserSession>>>,
    idle: Mutex<Vec<Box<dyn RenderedPage>>>,
    live: AtomicUsize,
    permits: Arc<Semaphore>,
    settings: PoolSettings,
    sleeper: Arc<dyn Sleeper>,
    disposed: AtomicBool,
}

impl PagePool {
    pub fn new(
        provider: Arc<dyn RenderedPageProvider>,
        settings: PoolSettings,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        let capacity = settings.capacity.max(1);
        Self {
            provider,
            browser: tokio::sync::Mutex::new(None),
            idle: Mutex::new(Vec::new()),
            live: AtomicUsize::new(0),
            permits: Arc::new(Semaphore::new(capacity)),
            settings: PoolSettings {
                capacity,
                ..settings
            },
            sleeper,
            disposed: AtomicBool::new(false),
        }
    }

    pub fn capacity(&self) -> usize {
        self.settings.capacity
    }

    /// Pages currently alive (idle or checked out)
    pub fn live_pages(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn idle_pages(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Semaphore sized to the pool, bounding concurrent browser work
    pub fn permits(&self) -> Arc<Semaphore> {
        Arc::clone(&self.permits)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Takes a valid idle page, opens a new one below capacity, or waits
    pub async fn acquire(&self) -> Result<Box<dyn RenderedPage>, BrowserError> {
        loop {
            if self.is_disposed() {
                return Err(BrowserError::PoolClosed);
            }

            let candidate = self
                .idle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop();

            if let Some(mut page) = candidate {
                if Self::is_usable(page.as_mut()).await {
                    return Ok(page);
                }
                self.discard(page).await;
                continue;
            }

            let reserved = self
                .live
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                    (n < self.settings.capacity).then_some(n + 1)
                })
                .is_ok();

            if reserved {
                return match self.open_page().await {
                    Ok(page) => Ok(page),
                    Err(e) => {
                        self.live.fetch_sub(1, Ordering::SeqCst);
                        Err(e)
                    }
                };
            }

            tracing::trace!(
                "Page pool at capacity ({}), waiting {:?}",
                self.settings.capacity,
                self.settings.poll_interval
            );
            self.sleeper.sleep(self.settings.poll_interval).await;
        }
    }

    /// Returns a page for reuse; closed pages are dropped
    pub async fn release(&self, page: Box<dyn RenderedPage>) {
        if page.is_closed() {
            self.live.fetch_sub(1, Ordering::SeqCst);
            tracing::debug!("Dropped closed page on release");
            return;
        }

        if self.is_disposed() {
            self.live.fetch_sub(1, Ordering::SeqCst);
            let _ = page.close().await;
            return;
        }

        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(page);
    }

    /// Closes idle pages, then the shared browser; later calls are no-ops
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let idle: Vec<_> = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        for page in idle {
            self.live.fetch_sub(1, Ordering::SeqCst);
            if let Err(e) = page.close().await {
                tracing::debug!("Error closing idle page: {}", e);
            }
        }

        if let Some(browser) = self.browser.lock().await.take() {
            if let Err(e) = browser.close().await {
                tracing::warn!("Error closing browser: {}", e);
            }
        }

        self.permits.close();
        tracing::debug!("Page pool disposed");
    }

    async fn is_usable(page: &mut dyn RenderedPage) -> bool {
        !page.is_closed() && matches!(page.current_url().await, Ok(Some(_)))
    }

    async fn discard(&self, page: Box<dyn RenderedPage>) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        let close_result = page.close().await;

        let mut browser = self.browser.lock().await;
        let dead = browser.as_ref().map_or(false, |b| !b.is_connected());
        if close_result.is_err() || dead {
            tracing::warn!("Discarded page belonged to a dead browser, relaunching on next use");
            if let Some(old) = browser.take() {
                let _ = old.close().await;
            }
        } else {
            tracing::debug!("Discarded invalid page");
        }
    }

    async fn session(&self) -> Result<Arc<dyn BrowserSession>, BrowserError> {
        let mut browser = self.browser.lock().await;
        if let Some(existing) = browser.as_ref() {
            if existing.is_connected() {
                return Ok(Arc::clone(existing));
            }
            tracing::warn!("Browser disconnected, relaunching");
        }

        let session = self.provider.launch().await?;
        tracing::info!("Launched shared browser");
        *browser = Some(Arc::clone(&session));
        Ok(session)
    }

    async fn open_page(&self) -> Result<Box<dyn RenderedPage>, BrowserError> {
        let session = self.session().await?;
        let mut page = session.new_page().await?;

        if let Err(e) = page.apply_stealth(&self.settings.user_agent).await {
            let _ = page.close().await;
            return Err(e);
        }

        tracing::debug!(
            "Opened browser page ({}/{})",
            self.live_pages(),
            self.settings.capacity
        );
        Ok(page)
    }
}
