//! Feed- and sitemap-based article discovery.
//!
//! [`FeedFinder`] looks for RSS/Atom feeds advertised by the homepage
//! (`<link rel="alternate" type="application/rss+xml">`). If there are none it
//! probes a handful of conventional feed and sitemap paths. Entries are read
//! with `quick-xml`: RSS `<item><link>`, Atom `<entry><link href>` and sitemap
//! `<loc>`; a sitemap index is followed one level down.
//!
//! Only links on the homepage's own host are returned. An empty result is a
//! valid outcome; the feed strategy does not fall back to harvesting.

use crate::fetch::PageFetcher;
use crate::models::{ArticleUrlSet, HomepageContext};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use scraper::{Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Paths probed when the homepage advertises no feed.
const PROBE_PATHS: [&str; 5] = ["/feed", "/rss", "/rss.xml", "/feed.xml", "/sitemap.xml"];

/// Child sitemaps followed from a sitemap index.
const MAX_CHILD_SITEMAPS: usize = 5;

static FEED_LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"link[rel~="alternate"][href]"#).expect("valid feed link selector")
});

/// Article discovery through feeds/sitemaps.
#[async_trait]
pub trait FeedDiscovery: Send + Sync {
    /// Article URLs for `homepage`; empty when nothing is found.
    async fn discover(&self, homepage: &HomepageContext) -> Vec<String>;
}

/// Links read from one feed or sitemap document.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FeedEntries {
    /// Article links.
    pub links: Vec<String>,
    /// Child sitemaps (from a sitemap index).
    pub sitemaps: Vec<String>,
}

/// [`FeedDiscovery`] over a [`PageFetcher`].
pub struct FeedFinder<'a> {
    fetcher: &'a dyn PageFetcher,
}

impl<'a> FeedFinder<'a> {
    pub fn new(fetcher: &'a dyn PageFetcher) -> Self {
        Self { fetcher }
    }

    async fn read_feed(&self, feed_url: &str) -> FeedEntries {
        match self.fetcher.fetch(feed_url).await {
            Ok(xml) => parse_feed(&xml),
            Err(e) => {
                debug!(%feed_url, error = %e, "Feed fetch failed");
                FeedEntries::default()
            }
        }
    }

    async fn collect(&self, feed_url: &str) -> Vec<String> {
        let entries = self.read_feed(feed_url).await;
        let mut links = entries.links;
        for child in entries.sitemaps.iter().take(MAX_CHILD_SITEMAPS) {
            links.extend(self.read_feed(child).await.links);
        }
        links
    }
}

#[async_trait]
impl<'a> FeedDiscovery for FeedFinder<'a> {
    #[instrument(level = "info", skip_all, fields(homepage = %homepage))]
    async fn discover(&self, homepage: &HomepageContext) -> Vec<String> {
        let advertised = match self.fetcher.fetch(homepage.as_str()).await {
            Ok(html) => advertised_feeds(&html, homepage),
            Err(e) => {
                warn!(error = %e, "Homepage fetch failed; probing default feed paths");
                Vec::new()
            }
        };

        let mut found = ArticleUrlSet::new();
        if advertised.is_empty() {
            for path in PROBE_PATHS {
                let candidate = format!("{}{}", homepage.origin(), path);
                let links = self.collect(&candidate).await;
                add_same_host(&mut found, links, homepage);
                if !found.is_empty() {
                    debug!(feed = %candidate, "Probed feed produced links");
                    break;
                }
            }
        } else {
            for feed in &advertised {
                let links = self.collect(feed).await;
                add_same_host(&mut found, links, homepage);
            }
        }

        if found.is_empty() {
            warn!(feeds = advertised.len(), "Feed discovery found no article URLs");
        } else {
            info!(count = found.len(), feeds = advertised.len(), "Discovered article URLs from feeds");
        }
        found.into_vec()
    }
}

/// Feed URLs advertised in the homepage `<head>`, resolved to absolute URLs.
pub fn advertised_feeds(html: &str, homepage: &HomepageContext) -> Vec<String> {
    let Ok(base) = Url::parse(homepage.as_str()) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let mut feeds = ArticleUrlSet::new();
    for element in document.select(&FEED_LINK_SELECTOR) {
        let kind = element.value().attr("type").unwrap_or_default().to_lowercase();
        if !(kind.contains("rss") || kind.contains("atom") || kind.contains("xml")) {
            continue;
        }
        if let Some(resolved) = element
            .value()
            .attr("href")
            .and_then(|href| base.join(href).ok())
        {
            feeds.insert(resolved.to_string());
        }
    }
    feeds.into_vec()
}

fn add_same_host(found: &mut ArticleUrlSet, links: Vec<String>, homepage: &HomepageContext) {
    let home_host = homepage.host().trim_start_matches("www.");
    for link in links {
        let same_host = Url::parse(&link).ok().is_some_and(|u| {
            matches!(u.scheme(), "http" | "https")
                && u.host_str()
                    .is_some_and(|h| h.to_ascii_lowercase().trim_start_matches("www.") == home_host)
        });
        if same_host {
            found.insert(link);
        }
    }
}

/// Parse an RSS, Atom or sitemap document. Malformed XML yields whatever was
/// read before the error.
pub fn parse_feed(xml: &str) -> FeedEntries {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut links = Vec::new();
    let mut locs = Vec::new();
    let mut in_entry = false;
    let mut saw_sitemapindex = false;
    let mut capturing = false;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"item" | b"entry" => in_entry = true,
                b"sitemapindex" => saw_sitemapindex = true,
                b"loc" => {
                    capturing = true;
                    text.clear();
                }
                b"link" if in_entry => match atom_href(&e) {
                    Some(href) => links.push(href),
                    None => {
                        capturing = true;
                        text.clear();
                    }
                },
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if in_entry && e.local_name().as_ref() == b"link" {
                    if let Some(href) = atom_href(&e) {
                        links.push(href);
                    }
                }
            }
            Ok(Event::Text(t)) if capturing => text.push_str(&String::from_utf8_lossy(&t)),
            Ok(Event::CData(t)) if capturing => text.push_str(&String::from_utf8_lossy(&t)),
            Ok(Event::GeneralRef(r)) if capturing => {
                text.push('&');
                text.push_str(&String::from_utf8_lossy(&r));
                text.push(';');
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"item" | b"entry" => in_entry = false,
                b"loc" if capturing => {
                    capturing = false;
                    locs.push(unescape_text(&text));
                }
                b"link" if capturing => {
                    capturing = false;
                    links.push(unescape_text(&text));
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                debug!(error = %e, position = reader.buffer_position(), "Stopped reading malformed feed");
                break;
            }
            _ => {}
        }
    }

    let links = links.into_iter().filter(|l| !l.is_empty());
    if saw_sitemapindex {
        FeedEntries {
            links: links.collect(),
            sitemaps: locs.into_iter().filter(|l| !l.is_empty()).collect(),
        }
    } else {
        FeedEntries {
            links: links.chain(locs.into_iter().filter(|l| !l.is_empty())).collect(),
            sitemaps: Vec::new(),
        }
    }
}

/// `href` of an Atom `<link>` whose `rel` is absent or `alternate`.
fn atom_href(e: &BytesStart<'_>) -> Option<String> {
    let attr_value = |name: &[u8]| {
        e.try_get_attribute(name)
            .ok()
            .flatten()
            .map(|a| unescape_text(&String::from_utf8_lossy(&a.value)))
    };
    let href = attr_value(b"href")?;
    match attr_value(b"rel") {
        Some(rel) if rel != "alternate" => None,
        _ => Some(href),
    }
}

fn unescape_text(raw: &str) -> String {
    let trimmed = raw.trim();
    unescape(trimmed)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| trimmed.to_string())
}
