//! Per-homepage pipeline: discover, filter, extract, assemble, export.
//!
//! ```text
//! DISCOVER_URLS ──► FILTER ──► EXTRACT_METADATA ──► ASSEMBLE ──► EXPORT
//!       │              │               │
//!       └──── empty ───┴───── empty ───┴────────────────────────► EXPORT (header only)
//! ```
//!
//! Homepages run one after another, URLs within a homepage in order. Only a
//! homepage that is not configured (or whose export fails) produces an error,
//! and [`Orchestrator::run_batch`] logs it and moves on to the next homepage.

use crate::browser::BrowserDriver;
use crate::config::{Config, HomepageConfig};
use crate::discovery::consent::page_source_after_consent;
use crate::discovery::feeds::FeedDiscovery;
use crate::error::Result;
use crate::extract::MetadataExtractor;
use crate::fetch::PageFetcher;
use crate::models::{
    ArticleUrlSet, DiscoveryStrategy, HarvestSource, HomepageContext, HomepageReport, MetadataTable,
};
use crate::outputs::csv::CsvExporter;
use crate::urls::filter::ArticleFilter;
use crate::urls::harvest::Harvester;
use chrono::Local;
use futures::stream::{self, StreamExt};
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Runs configured homepages through discovery, filtering, extraction and
/// export.
pub struct Orchestrator<'a> {
    config: &'a Config,
    fetcher: &'a dyn PageFetcher,
    feeds: &'a dyn FeedDiscovery,
    browser: &'a dyn BrowserDriver,
    extractor: &'a dyn MetadataExtractor,
    exporter: &'a CsvExporter,
    filter: ArticleFilter,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a Config,
        fetcher: &'a dyn PageFetcher,
        feeds: &'a dyn FeedDiscovery,
        browser: &'a dyn BrowserDriver,
        extractor: &'a dyn MetadataExtractor,
        exporter: &'a CsvExporter,
    ) -> Self {
        Self {
            config,
            fetcher,
            feeds,
            browser,
            extractor,
            exporter,
            filter: ArticleFilter::new(&config.filter),
        }
    }

    /// Run every homepage in `homepages`, or every configured homepage when
    /// the list is empty. Failures are logged per homepage.
    #[instrument(level = "info", skip_all, fields(requested = homepages.len()))]
    pub async fn run_batch(&self, homepages: &[String]) -> Vec<HomepageReport> {
        let start_time = Instant::now();
        let targets: Vec<String> = if homepages.is_empty() {
            self.config.homepages.iter().map(|h| h.url.clone()).collect()
        } else {
            homepages.to_vec()
        };
        if targets.is_empty() {
            warn!("No homepages configured; register one with `newsfeedback add <url>`");
        }

        let mut reports = Vec::with_capacity(targets.len());
        for url in &targets {
            match self.run_homepage(url).await {
                Ok(report) => {
                    debug!(homepage = %report.homepage, output = ?report.output, "Homepage exported");
                    reports.push(report);
                }
                Err(e) => error!(homepage = %url, error = %e, "Homepage failed; continuing with next"),
            }
        }

        let extracted: usize = reports.iter().map(|r| r.extracted).sum();
        let skipped: usize = reports.iter().map(|r| r.skipped).sum();
        info!(
            homepages = targets.len(),
            succeeded = reports.len(),
            failed = targets.len() - reports.len(),
            extracted,
            skipped,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Batch complete"
        );
        reports
    }

    /// Run the full pipeline for one configured homepage.
    ///
    /// # Errors
    ///
    /// [`crate::error::AppError::UnknownHomepage`] if `url` is not
    /// registered, or the export error if the CSV cannot be written. Discovery
    /// and extraction problems are logged and never returned.
    #[instrument(level = "info", skip(self))]
    pub async fn run_homepage(&self, url: &str) -> Result<HomepageReport> {
        let homepage = self.config.homepage(url)?;
        let ctx = HomepageContext::parse(&homepage.url)?;
        info!(pipeline = %homepage.pipeline, filter = %homepage.filter, "Processing homepage");

        let discovered = self.discover(homepage, &ctx).await;
        let urls = self.filter.filter(discovered.as_slice(), homepage.filter);
        let mut report = HomepageReport {
            homepage: homepage.url.clone(),
            discovered: discovered.len(),
            removed_by_filter: discovered.len() - urls.len(),
            ..HomepageReport::default()
        };

        let mut table = MetadataTable::new(self.config.wanted_fields(), Local::now());
        if urls.is_empty() {
            info!("No article URLs; exporting empty table");
        } else {
            let columns = &table.columns;
            let records = stream::iter(urls.iter())
                .then(|article_url| async move {
                    let html = self.article_html(homepage, article_url).await?;
                    let record = self.extractor.extract(article_url, &html, columns);
                    if record.is_none() {
                        debug!(url = %article_url, "Extractor found no content");
                    }
                    record
                })
                .collect::<Vec<_>>()
                .await;

            for record in records {
                match record {
                    Some(record) => {
                        table.push(record);
                        report.extracted += 1;
                    }
                    None => report.skipped += 1,
                }
            }
        }

        report.output = Some(self.exporter.write(&table, &ctx)?);
        info!(
            discovered = report.discovered,
            removed = report.removed_by_filter,
            extracted = report.extracted,
            skipped = report.skipped,
            "Homepage complete"
        );
        Ok(report)
    }

    /// Article candidates for `homepage` according to its strategy. Never
    /// fails: problems yield an empty set.
    async fn discover(&self, homepage: &HomepageConfig, ctx: &HomepageContext) -> ArticleUrlSet {
        let harvester = Harvester::new(
            self.fetcher,
            self.browser,
            &self.config.harvest,
            &self.config.normalize,
        );

        let urls = match homepage.pipeline {
            DiscoveryStrategy::Feed => self.feeds.discover(ctx).await.into_iter().collect(),
            DiscoveryStrategy::Harvest => {
                harvester
                    .harvest(HarvestSource::Url(homepage.url.clone()), ctx)
                    .await
            }
            DiscoveryStrategy::ConsentHarvest => {
                match page_source_after_consent(
                    self.browser,
                    &homepage.url,
                    self.consent_selector(homepage),
                    &self.config.consent,
                )
                .await
                {
                    Ok(html) => harvester.harvest(HarvestSource::Html(html), ctx).await,
                    Err(e) => {
                        error!(homepage = %homepage.url, error = %e, "Consent wall not dismissed; no URLs discovered");
                        ArticleUrlSet::new()
                    }
                }
            }
        };
        info!(strategy = %homepage.pipeline, count = urls.len(), "Discovered URLs");
        urls
    }

    fn consent_selector<'h>(&'h self, homepage: &'h HomepageConfig) -> &'h str {
        homepage
            .consent_selector
            .as_deref()
            .unwrap_or(&self.config.consent.selector)
    }

    async fn article_html(&self, homepage: &HomepageConfig, url: &str) -> Option<String> {
        let result = if homepage.consent_per_article {
            page_source_after_consent(
                self.browser,
                url,
                self.consent_selector(homepage),
                &self.config.consent,
            )
            .await
        } else {
            self.fetcher.fetch(url).await
        };
        match result {
            Ok(html) => Some(html),
            Err(e) => {
                warn!(%url, error = %e, "Could not load article; skipping");
                None
            }
        }
    }
}
