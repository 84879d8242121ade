//! Classify candidate URLs as articles or section/utility pages.
//!
//! Rules are applied in a fixed precedence:
//!
//! 1. exact blacklist match: rejected, nothing overrides it
//! 2. a path segment in the whitelist: accepted
//! 3. a path segment in the section denylist: rejected
//! 4. too shallow to be an article: rejected, unless the path carries an
//!    article marker (the current year, a multi-word slug, a `/-/` segment)
//! 5. otherwise accepted
//!
//! This is a best-effort heuristic. Misses are expected and never fatal.

use crate::config::FilterRules;
use crate::models::{FilterMode, is_locale_segment};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};
use url::Url;

/// Several hyphen-joined words, optionally ending in `.html`/`.htm`.
static SLUG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[\p{L}\p{N}]+(?:-[\p{L}\p{N}]+){2,}(?:\.html?)?$").expect("valid slug regex")
});

/// Why a URL was accepted or rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    Blacklisted,
    Whitelisted(String),
    DeniedSection(String),
    TooShallow,
    Unparseable,
    Viable,
}

impl FilterDecision {
    pub fn is_viable(&self) -> bool {
        matches!(self, FilterDecision::Whitelisted(_) | FilterDecision::Viable)
    }
}

impl fmt::Display for FilterDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterDecision::Blacklisted => f.write_str("blacklisted"),
            FilterDecision::Whitelisted(term) => write!(f, "whitelisted ({term})"),
            FilterDecision::DeniedSection(term) => write!(f, "section '{term}'"),
            FilterDecision::TooShallow => f.write_str("too shallow"),
            FilterDecision::Unparseable => f.write_str("unparseable"),
            FilterDecision::Viable => f.write_str("viable"),
        }
    }
}

/// Filter rules compiled once per run.
#[derive(Debug, Clone)]
pub struct ArticleFilter {
    blacklist: HashSet<String>,
    whitelist: HashSet<String>,
    sections: HashSet<String>,
    year: String,
}

impl ArticleFilter {
    pub fn new(rules: &FilterRules) -> Self {
        let lowered = |terms: &[String]| -> HashSet<String> {
            terms
                .iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect()
        };
        Self {
            blacklist: rules.blacklist.iter().map(|u| u.trim().to_string()).collect(),
            whitelist: lowered(&rules.whitelist),
            sections: lowered(&rules.sections),
            year: rules.year().to_string(),
        }
    }

    /// Decide a single URL.
    pub fn classify(&self, url: &str) -> FilterDecision {
        if self.blacklist.contains(url) {
            return FilterDecision::Blacklisted;
        }
        let Ok(parsed) = Url::parse(url) else {
            return FilterDecision::Unparseable;
        };

        let segments: Vec<&str> = parsed
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();
        let keys: Vec<String> = segments.iter().map(|s| segment_key(s)).collect();

        if let Some(term) = keys.iter().find(|k| self.whitelist.contains(*k)) {
            return FilterDecision::Whitelisted(term.clone());
        }
        if let Some(term) = keys.iter().find(|k| self.sections.contains(*k)) {
            return FilterDecision::DeniedSection(term.clone());
        }
        if is_shallow(parsed.path(), &segments) && !self.has_article_marker(parsed.path(), &segments) {
            return FilterDecision::TooShallow;
        }
        FilterDecision::Viable
    }

    fn has_article_marker(&self, path: &str, segments: &[&str]) -> bool {
        let has_year = path
            .split(|c: char| !c.is_ascii_digit())
            .any(|token| token == self.year);
        has_year
            || segments.contains(&"-")
            || segments.iter().any(|s| SLUG_RE.is_match(s))
    }

    /// Keep the viable URLs of `urls`, first occurrence only, order preserved.
    /// With [`FilterMode::Off`] the input is returned unchanged.
    pub fn filter(&self, urls: &[String], mode: FilterMode) -> Vec<String> {
        if mode == FilterMode::Off {
            info!(count = urls.len(), "Filter disabled; keeping all URLs");
            return urls.to_vec();
        }

        let kept: Vec<String> = urls
            .iter()
            .filter(|url| {
                let decision = self.classify(url);
                if !decision.is_viable() {
                    debug!(%url, reason = %decision, "Rejected URL");
                }
                decision.is_viable()
            })
            .unique()
            .cloned()
            .collect();

        let removed = urls.len() - kept.len();
        if removed == 0 && !urls.is_empty() {
            warn!(
                total = urls.len(),
                "Filter removed no URLs; rules may not fit this site"
            );
        } else {
            info!(total = urls.len(), removed, kept = kept.len(), "Filtered URLs");
        }
        kept
    }
}

/// Lowercased segment with any file extension dropped (`Impressum.html` →
/// `impressum`).
fn segment_key(segment: &str) -> String {
    let stem = segment.split('.').next().unwrap_or(segment);
    stem.to_lowercase()
}

/// Home and top-level section pages: at most one meaningful segment, or two
/// ending in a slash. A leading locale segment is not meaningful.
fn is_shallow(path: &str, segments: &[&str]) -> bool {
    let meaningful = match segments.first() {
        Some(first) if is_locale_segment(first) => &segments[1..],
        _ => segments,
    };
    meaningful.len() <= 1 || (meaningful.len() == 2 && path.ends_with('/'))
}
