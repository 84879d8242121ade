//! Collect every anchor target of a page as normalized article candidates.
//!
//! The harvester either gets markup directly ([`HarvestSource::Html`], e.g. a
//! page rendered after a consent click) or a URL to fetch. Fetched pages that
//! show a "please enable JavaScript" notice are rendered once through the
//! browser and harvested from the rendered DOM; if rendering fails the fetched
//! markup is harvested as is.
//!
//! Nothing here fails: an unreachable page, a page that is not HTML or a page
//! without links all yield an empty [`ArticleUrlSet`].

use crate::browser::{self, BrowserDriver};
use crate::config::{HarvestSettings, NormalizeRules};
use crate::fetch::PageFetcher;
use crate::models::{ArticleUrlSet, HarvestSource, HomepageContext};
use crate::urls::normalize::normalize;
use crate::utils::truncate_for_log;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument, warn};

static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("valid anchor selector"));

/// Extract normalized, deduplicated links from `html`, in document order.
pub fn harvest_html(html: &str, homepage: &HomepageContext, rules: &NormalizeRules) -> ArticleUrlSet {
    let document = Html::parse_document(html);
    let mut urls = ArticleUrlSet::new();
    let mut anchors = 0usize;
    for element in document.select(&ANCHOR_SELECTOR) {
        anchors += 1;
        if let Some(url) = element
            .value()
            .attr("href")
            .and_then(|href| normalize(href, homepage, rules))
        {
            urls.insert(url);
        }
    }
    debug!(anchors, kept = urls.len(), "Harvested anchors");
    urls
}

/// Whether a fetched body is a JavaScript-required placeholder.
pub fn needs_javascript(body: &str, markers: &[String]) -> bool {
    let lower = body.to_lowercase();
    markers
        .iter()
        .any(|marker| !marker.is_empty() && lower.contains(&marker.to_lowercase()))
}

/// Fetches (and if needed renders) pages, then harvests their links.
pub struct Harvester<'a> {
    fetcher: &'a dyn PageFetcher,
    browser: &'a dyn BrowserDriver,
    settings: &'a HarvestSettings,
    rules: &'a NormalizeRules,
}

impl<'a> Harvester<'a> {
    pub fn new(
        fetcher: &'a dyn PageFetcher,
        browser: &'a dyn BrowserDriver,
        settings: &'a HarvestSettings,
        rules: &'a NormalizeRules,
    ) -> Self {
        Self {
            fetcher,
            browser,
            settings,
            rules,
        }
    }

    /// Harvest article candidates from `source`.
    #[instrument(level = "info", skip_all, fields(homepage = %homepage))]
    pub async fn harvest(&self, source: HarvestSource, homepage: &HomepageContext) -> ArticleUrlSet {
        let html = match source {
            HarvestSource::Html(html) => html,
            HarvestSource::Url(url) => match self.load(&url).await {
                Some(html) => html,
                None => return ArticleUrlSet::new(),
            },
        };

        let urls = harvest_html(&html, homepage, self.rules);
        if urls.is_empty() {
            warn!(
                body_preview = %truncate_for_log(&html, 200),
                "No links harvested"
            );
        } else {
            info!(count = urls.len(), "Harvested candidate URLs");
        }
        urls
    }

    async fn load(&self, url: &str) -> Option<String> {
        let body = match self.fetcher.fetch(url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(%url, error = %e, "Fetch failed; nothing to harvest");
                return None;
            }
        };

        if !needs_javascript(&body, &self.settings.javascript_markers) {
            return Some(body);
        }

        info!(%url, "Page requires JavaScript; rendering in browser");
        match browser::render(self.browser, url).await {
            Ok(rendered) => Some(rendered),
            Err(e) => {
                warn!(%url, error = %e, "Browser rendering failed; harvesting fetched markup");
                Some(body)
            }
        }
    }
}
