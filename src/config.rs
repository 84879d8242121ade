//! YAML configuration store.
//!
//! One file holds every setting the pipeline reads: the registered homepages
//! with their discovery strategy and filter mode, the wanted metadata fields,
//! the filter lists, and the browser/harvest knobs. Every section has
//! defaults, so a config containing only `homepages:` is valid.
//!
//! ```yaml
//! output_dir: ./newsfeedback_output
//! homepages:
//!   - url: https://www.example.de/
//!     pipeline: harvest
//!     filter: on
//!   - url: https://www.paywalled.de/
//!     pipeline: consent-harvest
//!     consent_selector: "button[title='Zustimmen']"
//! fields:
//!   title: true
//!   date: true
//!   text: false
//! filter:
//!   whitelist: [artikel]
//!   sections: [impressum, sport]
//! ```

use crate::error::{AppError, Result};
use crate::models::{DiscoveryStrategy, FilterMode, MetadataField};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "newsfeedback.yaml";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Directory the CSV exports are written to.
    pub output_dir: String,
    /// Registered homepages, processed in this order.
    pub homepages: Vec<HomepageConfig>,
    /// Metadata field name -> wanted.
    pub fields: BTreeMap<MetadataField, bool>,
    pub filter: FilterRules,
    pub normalize: NormalizeRules,
    pub consent: ConsentSettings,
    pub harvest: HarvestSettings,
}

impl Default for Config {
    fn default() -> Self {
        let fields = MetadataField::ALL
            .iter()
            .map(|field| {
                let wanted = matches!(
                    field,
                    MetadataField::Title
                        | MetadataField::Url
                        | MetadataField::Description
                        | MetadataField::Date
                );
                (*field, wanted)
            })
            .collect();

        Self {
            output_dir: "newsfeedback_output".to_string(),
            homepages: Vec::new(),
            fields,
            filter: FilterRules::default(),
            normalize: NormalizeRules::default(),
            consent: ConsentSettings::default(),
            harvest: HarvestSettings::default(),
        }
    }
}

/// Per-homepage settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HomepageConfig {
    pub url: String,
    #[serde(default)]
    pub pipeline: DiscoveryStrategy,
    #[serde(default)]
    pub filter: FilterMode,
    /// Overrides [`ConsentSettings::selector`] for this site.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consent_selector: Option<String>,
    /// Fetch each article through a browser session with a consent click.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub consent_per_article: bool,
}

impl HomepageConfig {
    pub fn new(url: impl Into<String>, pipeline: DiscoveryStrategy, filter: FilterMode) -> Self {
        Self {
            url: url.into(),
            pipeline,
            filter,
            consent_selector: None,
            consent_per_article: false,
        }
    }
}

/// Lists driving the article filter.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterRules {
    /// Exact URLs that are never articles.
    pub blacklist: Vec<String>,
    /// Path segments that mark a URL as an article outright.
    pub whitelist: Vec<String>,
    /// Path segments that mark a URL as a section/utility page.
    pub sections: Vec<String>,
    /// Year token accepted as an article marker; the current year if unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_year: Option<i32>,
}

impl Default for FilterRules {
    fn default() -> Self {
        let sections = [
            "impressum",
            "kontakt",
            "datenschutz",
            "agb",
            "ratgeber",
            "sport",
            "service",
            "abo",
            "newsletter",
            "podcast",
            "podcasts",
            "video",
            "videos",
            "wetter",
            "spiele",
            "shop",
            "karriere",
            "jobs",
            "suche",
            "login",
            "anzeigen",
            "themen",
            "autor",
            "autoren",
            "hilfe",
            "mediadaten",
            "barrierefreiheit",
            "cookies",
            "rss",
        ];
        Self {
            blacklist: Vec::new(),
            whitelist: vec!["artikel".to_string(), "article".to_string()],
            sections: sections.iter().map(|s| s.to_string()).collect(),
            current_year: None,
        }
    }
}

impl FilterRules {
    /// The year token used by the structural rule.
    pub fn year(&self) -> i32 {
        self.current_year
            .unwrap_or_else(|| chrono::Local::now().year())
    }
}

/// Optional link repairs applied to relative hrefs.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NormalizeRules {
    /// Collapse `https://host/host/...` into `https://host/...`.
    pub collapse_duplicate_host: bool,
}

impl Default for NormalizeRules {
    fn default() -> Self {
        Self {
            collapse_duplicate_host: true,
        }
    }
}

/// Consent-wall click settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsentSettings {
    /// CSS selector of the consent button.
    pub selector: String,
    /// Click attempts before giving up.
    pub attempts: usize,
    /// Seconds to wait for the element on each attempt.
    pub wait_secs: u64,
    /// Initial backoff between attempts; doubles per attempt.
    pub backoff_ms: u64,
    /// Seconds to wait for page navigation.
    pub page_load_secs: u64,
}

impl Default for ConsentSettings {
    fn default() -> Self {
        Self {
            selector: "button[title='Zustimmen'], button[title='Akzeptieren']".to_string(),
            attempts: 3,
            wait_secs: 10,
            backoff_ms: 1000,
            page_load_secs: 30,
        }
    }
}

impl ConsentSettings {
    pub fn wait(&self) -> Duration {
        Duration::from_secs(self.wait_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn page_load(&self) -> Duration {
        Duration::from_secs(self.page_load_secs)
    }
}

/// HTTP fetch and JavaScript detection settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HarvestSettings {
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Body substrings (case-insensitive) meaning "this page needs a browser".
    pub javascript_markers: Vec<String>,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            user_agent: format!("newsfeedback/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 30,
            javascript_markers: vec![
                "please enable javascript".to_string(),
                "enable javascript to".to_string(),
                "javascript aktivieren".to_string(),
            ],
        }
    }
}

impl Config {
    /// Load the config from `path`, falling back to defaults if the file is
    /// missing. A file that exists but does not parse is an error.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config file not found; using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&text)?;
        config.validate()?;
        info!(homepages = config.homepages.len(), "Loaded configuration");
        Ok(config)
    }

    /// Write the config as YAML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        info!(path = %path.display(), "Wrote configuration");
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.consent.attempts == 0 {
            return Err(AppError::config("consent.attempts must be at least 1"));
        }
        for homepage in &self.homepages {
            crate::models::HomepageContext::parse(&homepage.url)?;
        }
        Ok(())
    }

    /// Settings registered for `url`. A trailing slash is not significant.
    ///
    /// # Errors
    ///
    /// [`AppError::UnknownHomepage`] if the homepage is not registered.
    pub fn homepage(&self, url: &str) -> Result<&HomepageConfig> {
        let wanted = url.trim().trim_end_matches('/');
        self.homepages
            .iter()
            .find(|h| h.url.trim().trim_end_matches('/') == wanted)
            .ok_or_else(|| AppError::UnknownHomepage(url.to_string()))
    }

    /// Register a homepage, replacing an existing entry for the same URL.
    pub fn upsert_homepage(&mut self, homepage: HomepageConfig) {
        let key = homepage.url.trim_end_matches('/').to_string();
        match self
            .homepages
            .iter_mut()
            .find(|h| h.url.trim_end_matches('/') == key)
        {
            Some(existing) => *existing = homepage,
            None => self.homepages.push(homepage),
        }
    }

    /// Wanted fields in column order.
    pub fn wanted_fields(&self) -> Vec<MetadataField> {
        self.fields
            .iter()
            .filter(|(_, wanted)| **wanted)
            .map(|(field, _)| *field)
            .collect()
    }
}
