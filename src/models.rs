//! Data models shared by discovery, filtering, extraction and export.
//!
//! - [`HomepageContext`]: the homepage a link is resolved against
//! - [`HarvestSource`]: what the harvester is given (a URL or fetched markup)
//! - [`ArticleUrlSet`]: insertion-ordered, deduplicated article URLs
//! - [`FilterMode`] / [`DiscoveryStrategy`]: per-homepage settings
//! - [`MetadataField`], [`MetadataRecord`], [`MetadataTable`]: extracted rows
//! - [`HomepageReport`]: what one homepage run produced

use crate::error::{AppError, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// The homepage a harvest resolves links against.
///
/// Holds the homepage as configured, the join base relative links are
/// appended to literally (the configured URL with its scheme and host
/// lowercased), its `scheme://host` origin and an optional two-letter locale
/// prefix such as `de` for `https://www.example.com/de/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomepageContext {
    raw: String,
    base: String,
    origin: String,
    host: String,
    locale: Option<String>,
}

impl HomepageContext {
    /// Build a context from a homepage URL.
    ///
    /// # Errors
    ///
    /// Fails if the URL does not parse, is not `http`/`https`, or has no host.
    pub fn parse(homepage: &str) -> Result<Self> {
        let url = Url::parse(homepage.trim())?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::config(format!(
                "homepage {homepage} must use http or https"
            )));
        }
        let host = url
            .host_str()
            .ok_or_else(|| AppError::config(format!("homepage {homepage} has no host")))?
            .to_ascii_lowercase();

        let locale = url
            .path_segments()
            .and_then(|mut segments| segments.next())
            .filter(|first| is_locale_segment(first))
            .map(str::to_string);

        let raw = homepage.trim().to_string();
        let origin = url.origin().ascii_serialization();
        let after_scheme = raw.split_once("://").map_or("", |(_, rest)| rest);
        let path = after_scheme.find('/').map_or("", |at| &after_scheme[at..]);
        let base = format!("{origin}{path}");

        Ok(Self {
            raw,
            base,
            origin,
            host,
            locale,
        })
    }

    /// The homepage as configured.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The homepage with scheme and host lowercased, path kept verbatim.
    pub fn join_base(&self) -> &str {
        &self.base
    }

    /// `scheme://host[:port]` without a trailing slash.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Lowercased host name.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    /// Path prefix every article must live under: `/de/` for a localized
    /// homepage, `/` otherwise.
    pub fn path_prefix(&self) -> String {
        match self.locale() {
            Some(locale) => format!("/{locale}/"),
            None => "/".to_string(),
        }
    }
}

impl fmt::Display for HomepageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A lowercase two-letter path segment such as `de` or `en`.
pub fn is_locale_segment(segment: &str) -> bool {
    segment.len() == 2 && segment.bytes().all(|b| b.is_ascii_lowercase())
}

/// Input to the link harvester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestSource {
    /// A page to fetch (and render in a browser if it needs JavaScript).
    Url(String),
    /// Markup that has already been fetched or rendered.
    Html(String),
}

/// Article URLs in first-seen order, unique by exact string match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleUrlSet {
    urls: Vec<String>,
    seen: HashSet<String>,
}

impl ArticleUrlSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a URL, returning `false` if it was already present.
    pub fn insert(&mut self, url: String) -> bool {
        if self.seen.contains(&url) {
            return false;
        }
        self.seen.insert(url.clone());
        self.urls.push(url);
        true
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.urls
    }

    pub fn into_vec(self) -> Vec<String> {
        self.urls
    }
}

impl FromIterator<String> for ArticleUrlSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut set = Self::new();
        for url in iter {
            set.insert(url);
        }
        set
    }
}

/// Whether the article filter runs for a homepage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    On,
    Off,
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterMode::On => f.write_str("on"),
            FilterMode::Off => f.write_str("off"),
        }
    }
}

/// How article URLs are discovered for a homepage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscoveryStrategy {
    /// RSS/Atom/sitemap discovery only.
    Feed,
    /// Harvest anchors from the homepage.
    #[default]
    Harvest,
    /// Dismiss a consent wall in a browser, then harvest the rendered page.
    ConsentHarvest,
}

impl fmt::Display for DiscoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryStrategy::Feed => f.write_str("feed"),
            DiscoveryStrategy::Harvest => f.write_str("harvest"),
            DiscoveryStrategy::ConsentHarvest => f.write_str("consent-harvest"),
        }
    }
}

/// A metadata column. Declaration order is the column order of the export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataField {
    Title,
    Author,
    Url,
    Hostname,
    Description,
    Sitename,
    Date,
    Categories,
    Tags,
    Language,
    Text,
    Comments,
}

impl MetadataField {
    pub const ALL: [MetadataField; 12] = [
        MetadataField::Title,
        MetadataField::Author,
        MetadataField::Url,
        MetadataField::Hostname,
        MetadataField::Description,
        MetadataField::Sitename,
        MetadataField::Date,
        MetadataField::Categories,
        MetadataField::Tags,
        MetadataField::Language,
        MetadataField::Text,
        MetadataField::Comments,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataField::Title => "title",
            MetadataField::Author => "author",
            MetadataField::Url => "url",
            MetadataField::Hostname => "hostname",
            MetadataField::Description => "description",
            MetadataField::Sitename => "sitename",
            MetadataField::Date => "date",
            MetadataField::Categories => "categories",
            MetadataField::Tags => "tags",
            MetadataField::Language => "language",
            MetadataField::Text => "text",
            MetadataField::Comments => "comments",
        }
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extracted values for one article, keyed by field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataRecord {
    values: BTreeMap<MetadataField, String>,
}

impl MetadataRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value; blank values are ignored so a later source can fill them.
    pub fn set(&mut self, field: MetadataField, value: impl Into<String>) {
        let value = value.into();
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            self.values.insert(field, trimmed.to_string());
        }
    }

    /// Set a value only if the field is still empty.
    pub fn set_if_missing(&mut self, field: MetadataField, value: impl Into<String>) {
        if !self.values.contains_key(&field) {
            self.set(field, value);
        }
    }

    pub fn get(&self, field: MetadataField) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    /// Drop every field not in `fields`.
    pub fn retain_fields(&mut self, fields: &[MetadataField]) {
        self.values.retain(|field, _| fields.contains(field));
    }
}

/// Header name of the run timestamp column.
pub const DATETIME_COLUMN: &str = "datetime";

/// Rows for one homepage run, ready for export.
#[derive(Debug, Clone)]
pub struct MetadataTable {
    pub columns: Vec<MetadataField>,
    pub rows: Vec<MetadataRecord>,
    pub timestamp: DateTime<Local>,
}

impl MetadataTable {
    pub fn new(columns: Vec<MetadataField>, timestamp: DateTime<Local>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            timestamp,
        }
    }

    pub fn push(&mut self, mut record: MetadataRecord) {
        record.retain_fields(&self.columns);
        self.rows.push(record);
    }

    pub fn header(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| c.as_str().to_string())
            .chain(std::iter::once(DATETIME_COLUMN.to_string()))
            .collect()
    }

    /// Cell values for a row, in column order, followed by the run timestamp.
    pub fn cells(&self, record: &MetadataRecord) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| record.get(*c).unwrap_or_default().to_string())
            .chain(std::iter::once(
                self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            ))
            .collect()
    }
}

/// What a single homepage run produced.
#[derive(Debug, Clone, Default)]
pub struct HomepageReport {
    pub homepage: String,
    pub discovered: usize,
    pub removed_by_filter: usize,
    pub extracted: usize,
    pub skipped: usize,
    pub output: Option<PathBuf>,
}
