//! Chromium-backed page provider using chromiumoxide.

use crate::browser::{BrowserError, BrowserSession, RenderedPage, RenderedPageProvider};
use crate::config::BrowserConfig;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as LaunchConfig};
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Interval between selector checks while waiting for rendered content
const SELECTOR_POLL: Duration = Duration::from_millis(250);

/// Find the Chromium binary path.
pub fn find_chromium(configured: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = configured.map(PathBuf::from) {
        if path.exists() {
            return Some(path);
        }
    }

    if let Ok(p) = std::env::var("SERIAL_HARVEST_CHROMIUM") {
        let path = PathBuf::from(p);
        if path.exists() {
            return Some(path);
        }
    }

    ["google-chrome", "chromium", "chromium-browser"]
        .iter()
        .find_map(|name| which_on_path(name))
}

fn which_on_path(name: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Launches headless Chromium on demand.
pub struct ChromiumProvider {
    config: BrowserConfig,
}

impl ChromiumProvider {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    fn launch_config(&self) -> Result<LaunchConfig, BrowserError> {
        let chrome_path = find_chromium(self.config.executable.as_deref())
            .ok_or_else(|| BrowserError::Launch("Chromium not found".to_string()))?;

        let mut builder = LaunchConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-extensions");

        if !self.config.headless {
            builder = builder.with_head();
        }

        builder.build().map_err(BrowserError::Launch)
    }
}

#[async_trait]
impl RenderedPageProvider for ChromiumProvider {
    async fn launch(&self) -> Result<Arc<dyn BrowserSession>, BrowserError> {
        let (browser, mut handler) = Browser::launch(self.launch_config()?)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let connected = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&connected);

        // The handler stream ends when the browser connection drops
        tokio::spawn(async move {
            while handler.next().await.is_some() {}
            flag.store(false, Ordering::SeqCst);
        });

        Ok(Arc::new(ChromiumSession {
            browser: Mutex::new(browser),
            connected,
        }))
    }
}

struct ChromiumSession {
    browser: Mutex<Browser>,
    connected: Arc<AtomicBool>,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn new_page(&self) -> Result<Box<dyn RenderedPage>, BrowserError> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::PageCreation(e.to_string()))?;

        Ok(Box::new(ChromiumPage {
            target_lost: false,
            page: Some(page),
        }))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.connected.store(false, Ordering::SeqCst);
        let mut browser = self.browser.lock().await;
        browser
            .close()
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;
        let _ = browser.wait().await;
        Ok(())
    }
}

struct ChromiumPage {
    page: Option<Page>,

    /// Set once a CDP call shows the tab crashed or the connection dropped
    target_lost: bool,
}

impl ChromiumPage {
    fn page(&self) -> Result<&Page, BrowserError> {
        self.page
            .as_ref()
            .ok_or_else(|| BrowserError::Content("page is closed".to_string()))
    }

    fn observe(&mut self, error: &CdpError) {
        if target_lost(error) {
            tracing::debug!("Page target lost: {}", error);
            self.target_lost = true;
        }
    }
}

/// Whether a CDP failure means the tab can no longer be driven
fn target_lost(error: &CdpError) -> bool {
    match error {
        CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse => true,
        CdpError::Chrome(e) => {
            let message = e.message.to_lowercase();
            message.contains("target closed")
                || message.contains("target crashed")
                || message.contains("no target with given id")
                || message.contains("session with given id not found")
        }
        _ => false,
    }
}

#[async_trait]
impl RenderedPage for ChromiumPage {
    async fn apply_stealth(&mut self, user_agent: &str) -> Result<(), BrowserError> {
        self.page()?
            .enable_stealth_mode_with_agent(user_agent)
            .await
            .map_err(|e| BrowserError::PageCreation(e.to_string()))
    }

    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        let page = self.page()?;
        let navigation = async {
            page.goto(url).await?;
            page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };

        match tokio::time::timeout(timeout, navigation).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.observe(&e);
                Err(BrowserError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })
            }
            Err(_) => Err(BrowserError::Timeout(format!("navigation to {}", url))),
        }
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        let page = self.page()?;
        let deadline = Instant::now() + timeout;

        loop {
            if page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout(format!("selector {}", selector)));
            }
            tokio::time::sleep(SELECTOR_POLL).await;
        }
    }

    async fn content(&mut self) -> Result<String, BrowserError> {
        let result = self.page()?.content().await;
        result.map_err(|e| {
            self.observe(&e);
            BrowserError::Content(e.to_string())
        })
    }

    async fn current_url(&mut self) -> Result<Option<String>, BrowserError> {
        let result = match &self.page {
            Some(page) => page.url().await,
            None => return Ok(None),
        };
        result.map_err(|e| {
            self.observe(&e);
            BrowserError::Content(e.to_string())
        })
    }

    /// Closed explicitly, or its target crashed or disconnected
    fn is_closed(&self) -> bool {
        self.page.is_none() || self.target_lost
    }

    async fn close(mut self: Box<Self>) -> Result<(), BrowserError> {
        match self.page.take() {
            Some(page) => page
                .close()
                .await
                .map_err(|e| BrowserError::Content(e.to_string())),
            None => Ok(()),
        }
    }
}
