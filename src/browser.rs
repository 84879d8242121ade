//! Headless browser sessions for pages that need JavaScript or a consent
//! click before their links exist.
//!
//! A session is a scoped resource: whoever opens one must call
//! [`BrowserSession::close`] on every path. [`render`] does that for the
//! common "open, read, close" case.

use crate::error::{AppError, Result};
use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, instrument, warn};

/// Interval between element lookups while waiting for a click target.
const CLICK_POLL: Duration = Duration::from_millis(250);

/// Launches browser sessions.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Start a browser and navigate to `url`.
    async fn open(&self, url: &str) -> Result<Box<dyn BrowserSession>>;
}

/// One open browser with one page.
#[async_trait]
pub trait BrowserSession: Send {
    /// Click the first element matching `selector`, waiting up to `wait` for
    /// it to appear.
    async fn click(&mut self, selector: &str, wait: Duration) -> Result<()>;

    /// Current DOM of the page, serialized as HTML.
    async fn page_source(&mut self) -> Result<String>;

    /// Shut the browser down.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Open `url`, read the rendered source and close the session.
#[instrument(level = "info", skip(driver))]
pub async fn render(driver: &dyn BrowserDriver, url: &str) -> Result<String> {
    let mut session = driver.open(url).await?;
    let source = session.page_source().await;
    if let Err(e) = session.close().await {
        warn!(error = %e, "Failed to close browser session");
    }
    source
}

/// Chromium via the DevTools protocol.
#[derive(Debug, Clone)]
pub struct ChromiumDriver {
    page_load: Duration,
}

impl ChromiumDriver {
    pub fn new(page_load: Duration) -> Self {
        Self { page_load }
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    #[instrument(level = "info", skip(self))]
    async fn open(&self, url: &str) -> Result<Box<dyn BrowserSession>> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(self.page_load)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .build()
            .map_err(AppError::browser)?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(AppError::browser)?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let mut session = Box::new(ChromiumSession {
            browser,
            page: None,
            handler,
        });

        match timeout(self.page_load, session.browser.new_page(url)).await {
            Ok(Ok(page)) => {
                info!("Browser page loaded");
                session.page = Some(page);
                Ok(session)
            }
            Ok(Err(e)) => {
                let _ = session.close().await;
                Err(AppError::browser(e))
            }
            Err(_) => {
                let _ = session.close().await;
                Err(AppError::browser(format!(
                    "page load exceeded {:?}",
                    self.page_load
                )))
            }
        }
    }
}

struct ChromiumSession {
    browser: Browser,
    page: Option<Page>,
    handler: JoinHandle<()>,
}

impl ChromiumSession {
    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| AppError::browser("session has no page"))
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn click(&mut self, selector: &str, wait: Duration) -> Result<()> {
        let page = self.page()?;
        let deadline = Instant::now() + wait;
        loop {
            if let Ok(element) = page.find_element(selector).await {
                element.click().await.map_err(AppError::browser)?;
                debug!(%selector, "Clicked element");
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(AppError::browser(format!(
                    "element '{selector}' not found within {wait:?}"
                )));
            }
            sleep(CLICK_POLL).await;
        }
    }

    async fn page_source(&mut self) -> Result<String> {
        self.page()?.content().await.map_err(AppError::browser)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let mut this = *self;
        if let Some(page) = this.page.take() {
            let _ = page.close().await;
        }
        let closed = this.browser.close().await.map_err(AppError::browser);
        let _ = this.browser.wait().await;
        this.handler.abort();
        closed.map(|_| ())
    }
}
