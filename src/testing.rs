//! In-memory collaborators for unit tests.

use crate::browser::{BrowserDriver, BrowserSession};
use crate::discovery::feeds::FeedDiscovery;
use crate::error::{AppError, Result};
use crate::fetch::PageFetcher;
use crate::models::HomepageContext;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Serves fixed bodies by exact URL; anything else is a fetch error.
#[derive(Debug, Default, Clone)]
pub struct StaticFetcher {
    pages: HashMap<String, String>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::fetch(url, "no such page"))
    }
}

/// Counters shared between a [`FakeBrowser`] and its sessions.
#[derive(Debug, Default)]
pub struct BrowserCounters {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub clicks: AtomicUsize,
}

/// A browser whose pages always have `source` and whose clicks succeed or
/// time out according to `click_succeeds`.
#[derive(Debug, Clone)]
pub struct FakeBrowser {
    pub source: String,
    pub click_succeeds: bool,
    pub counters: Arc<BrowserCounters>,
}

impl FakeBrowser {
    pub fn new(source: &str, click_succeeds: bool) -> Self {
        Self {
            source: source.to_string(),
            click_succeeds,
            counters: Arc::new(BrowserCounters::default()),
        }
    }

    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    pub fn clicks(&self) -> usize {
        self.counters.clicks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserDriver for FakeBrowser {
    async fn open(&self, _url: &str) -> Result<Box<dyn BrowserSession>> {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            source: self.source.clone(),
            click_succeeds: self.click_succeeds,
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct FakeSession {
    source: String,
    click_succeeds: bool,
    counters: Arc<BrowserCounters>,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn click(&mut self, selector: &str, wait: Duration) -> Result<()> {
        self.counters.clicks.fetch_add(1, Ordering::SeqCst);
        if self.click_succeeds {
            Ok(())
        } else {
            tokio::time::sleep(wait).await;
            Err(AppError::browser(format!("'{selector}' timed out")))
        }
    }

    async fn page_source(&mut self) -> Result<String> {
        Ok(self.source.clone())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A browser that can never be launched.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrokenBrowser;

#[async_trait]
impl BrowserDriver for BrokenBrowser {
    async fn open(&self, _url: &str) -> Result<Box<dyn BrowserSession>> {
        Err(AppError::browser("no Chromium available"))
    }
}

/// Feed discovery returning a fixed list.
#[derive(Debug, Default, Clone)]
pub struct StaticFeeds(pub Vec<String>);

#[async_trait]
impl FeedDiscovery for StaticFeeds {
    async fn discover(&self, _homepage: &HomepageContext) -> Vec<String> {
        self.0.clone()
    }
}
