//! Turn raw `href` values into absolute article URLs under a homepage.
//!
//! Absolute links are only checked (same host, under the homepage's locale
//! prefix, at least one segment deep) and returned untouched. Relative links
//! are appended to the homepage (scheme and host lowercased) literally and
//! then repaired:
//!
//! - runs of slashes after `scheme://` collapse to one
//!   (`https://www.x.tld//section/page` → `https://www.x.tld/section/page`)
//! - a repeated locale segment collapses (`/de/de/` → `/de/`)
//! - optionally, a leading segment repeating the host collapses
//!   (`https://www.x.tld/www.x.tld/a` → `https://www.x.tld/a`)
//!
//! A repaired link is re-serialized by the URL parser (percent-encoding
//! spaces, dropping newlines, resolving `.`/`..`) and must then pass the same
//! checks as an absolute link, so normalizing an output again returns it
//! unchanged.
//!
//! Anything else (empty, `mailto:`, `javascript:`, fragments, foreign hosts)
//! is rejected with `None`. Rejections are routine and not logged.

use crate::config::NormalizeRules;
use crate::models::{HomepageContext, is_locale_segment};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static SCHEME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.\-]*:").expect("valid scheme regex"));

/// Normalize `href` against `homepage`.
pub fn normalize(href: &str, homepage: &HomepageContext, rules: &NormalizeRules) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if has_web_scheme(href) {
        return check_absolute(href, homepage);
    }
    if SCHEME_RE.is_match(href) {
        // mailto:, javascript:, tel:, data:, ...
        return None;
    }

    let joined = join_literal(homepage.join_base(), href);
    let repaired = repair(&joined, homepage, rules)?;
    let parsed = Url::parse(&repaired).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    check_absolute(parsed.as_str(), homepage)
}

fn has_web_scheme(href: &str) -> bool {
    let lower = href.get(..8).unwrap_or(href).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn check_absolute(href: &str, homepage: &HomepageContext) -> Option<String> {
    let parsed = Url::parse(href).ok()?;
    let host = parsed.host_str()?;
    if !host.eq_ignore_ascii_case(homepage.host()) {
        return None;
    }

    let prefix = homepage.path_prefix();
    let below = parsed.path().strip_prefix(prefix.as_str())?;
    if below.split('/').all(str::is_empty) {
        return None;
    }
    Some(href.to_string())
}

fn join_literal(homepage: &str, href: &str) -> String {
    if homepage.ends_with('/') || href.starts_with('/') {
        format!("{homepage}{href}")
    } else {
        format!("{homepage}/{href}")
    }
}

fn repair(joined: &str, homepage: &HomepageContext, rules: &NormalizeRules) -> Option<String> {
    let (scheme, rest) = joined.split_once("://")?;

    // Query and fragment are left alone.
    let split_at = rest.find(['?', '#']).unwrap_or(rest.len());
    let (path_part, tail) = rest.split_at(split_at);
    let trailing_slash = path_part.ends_with('/');

    let mut segments = path_part.split('/').filter(|s| !s.is_empty());
    let authority = segments.next()?;

    let mut path: Vec<&str> = Vec::new();
    for segment in segments {
        if path.last() == Some(&segment) && is_locale_segment(segment) {
            continue;
        }
        path.push(segment);
    }

    if rules.collapse_duplicate_host {
        while path
            .first()
            .is_some_and(|first| first.eq_ignore_ascii_case(homepage.host()))
        {
            path.remove(0);
        }
    }

    let mut out = format!("{scheme}://{authority}/{}", path.join("/"));
    if trailing_slash && !path.is_empty() {
        out.push('/');
    }
    out.push_str(tail);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(url: &str) -> HomepageContext {
        HomepageContext::parse(url).unwrap()
    }

    fn norm(href: &str, homepage: &str) -> Option<String> {
        normalize(href, &ctx(homepage), &NormalizeRules::default())
    }

    #[test]
    fn test_rejects_empty_and_fragments() {
        assert_eq!(norm("", "https://www.example.de/"), None);
        assert_eq!(norm("   ", "https://www.example.de/"), None);
        assert_eq!(norm("#top", "https://www.example.de/"), None);
    }

    #[test]
    fn test_rejects_non_web_schemes() {
        let home = "https://www.example.de/";
        assert_eq!(norm("mailto:redaktion@example.de", home), None);
        assert_eq!(norm("javascript:void(0)", home), None);
        assert_eq!(norm("tel:+4930123", home), None);
    }

    #[test]
    fn test_root_relative_link() {
        assert_eq!(
            norm("/artikel/foo-bar-baz", "https://www.example.de/"),
            Some("https://www.example.de/artikel/foo-bar-baz".to_string())
        );
    }

    #[test]
    fn test_collapses_doubled_slashes() {
        assert_eq!(
            norm("//section/page", "https://www.x.tld/"),
            Some("https://www.x.tld/section/page".to_string())
        );
    }

    #[test]
    fn test_path_relative_without_slashes() {
        assert_eq!(
            norm("politik/wahl-2026", "https://www.example.de"),
            Some("https://www.example.de/politik/wahl-2026".to_string())
        );
    }

    #[test]
    fn test_collapses_duplicated_locale() {
        assert_eq!(
            norm("/de/politik/ein-langer-titel", "https://www.example.com/de/"),
            Some("https://www.example.com/de/politik/ein-langer-titel".to_string())
        );
    }

    #[test]
    fn test_collapses_duplicated_host_when_enabled() {
        let home = ctx("https://www.x.tld/");
        let on = NormalizeRules::default();
        assert_eq!(
            normalize("//www.x.tld//www.x.tld/news/a-b-c", &home, &on),
            Some("https://www.x.tld/news/a-b-c".to_string())
        );

        let off = NormalizeRules {
            collapse_duplicate_host: false,
        };
        assert_eq!(
            normalize("/www.x.tld/news/a-b-c", &home, &off),
            Some("https://www.x.tld/www.x.tld/news/a-b-c".to_string())
        );
    }

    #[test]
    fn test_keeps_query_and_trailing_slash() {
        assert_eq!(
            norm("/suche/?q=a//b", "https://www.example.de/"),
            Some("https://www.example.de/suche/?q=a//b".to_string())
        );
        assert_eq!(
            norm("/politik/", "https://www.example.de/"),
            Some("https://www.example.de/politik/".to_string())
        );
    }

    #[test]
    fn test_absolute_same_host_accepted_as_is() {
        let url = "https://www.example.de/politik/ein-artikel.html";
        assert_eq!(norm(url, "https://www.example.de/"), Some(url.to_string()));
    }

    #[test]
    fn test_absolute_foreign_host_rejected() {
        assert_eq!(norm("https://other.tld/x", "https://www.example.de/"), None);
    }

    #[test]
    fn test_absolute_homepage_itself_rejected() {
        assert_eq!(norm("https://www.example.de/", "https://www.example.de/"), None);
        assert_eq!(norm("https://www.example.de", "https://www.example.de/"), None);
    }

    #[test]
    fn test_absolute_outside_locale_prefix_rejected() {
        let home = "https://www.example.com/de/";
        assert_eq!(norm("https://www.example.com/en/story-one", home), None);
        assert_eq!(norm("https://www.example.com/de/", home), None);
        assert_eq!(
            norm("https://www.example.com/de/story-one", home),
            Some("https://www.example.com/de/story-one".to_string())
        );
    }

    #[test]
    fn test_href_mentioning_http_in_path_is_relative() {
        assert_eq!(
            norm("/digital/http-3-erklaert", "https://www.example.de/"),
            Some("https://www.example.de/digital/http-3-erklaert".to_string())
        );
    }

    #[test]
    fn test_idempotent_on_normalized_urls() {
        let cases = [
            ("https://www.example.de/", "/artikel/foo-bar-baz"),
            ("https://www.x.tld/", "//section/page"),
            ("https://www.example.com/de/", "/de/politik/ein-langer-titel"),
            ("https://www.example.de/", "/"),
            ("https://www.example.de/", "?page=2"),
            ("https://www.example.com/de/", "/de/"),
            ("https://www.example.de/", "./politik/a-b-c"),
            ("https://www.example.de/", "/politik/ein langer\ntitel"),
            ("https://www.Example.de/", "/politik/a-b-c"),
        ];
        for (home, href) in cases {
            let once = norm(href, home);
            let twice = once.as_deref().and_then(|url| norm(url, home));
            assert_eq!(twice, once, "{href} under {home}");
        }
    }

    #[test]
    fn test_relative_homepage_itself_rejected() {
        assert_eq!(norm("/", "https://www.example.de/"), None);
        assert_eq!(norm("?page=2", "https://www.example.de/"), None);
        assert_eq!(norm("/de/", "https://www.example.com/de/"), None);
        assert_eq!(norm("./", "https://www.example.de/"), None);
    }

    #[test]
    fn test_output_is_serialized_url() {
        let out = norm("/politik/ein langer\ntitel", "https://www.example.de/").unwrap();
        assert_eq!(out, "https://www.example.de/politik/ein%20langertitel");
        assert_eq!(Url::parse(&out).unwrap().as_str(), out);
    }

    #[test]
    fn test_dot_segments_resolved() {
        assert_eq!(
            norm("./politik/a-b-c", "https://www.example.de/"),
            norm("/politik/a-b-c", "https://www.example.de/")
        );
        assert_eq!(
            norm("./politik/a-b-c", "https://www.example.de/"),
            Some("https://www.example.de/politik/a-b-c".to_string())
        );
    }

    #[test]
    fn test_relative_links_use_lowercased_host() {
        let home = "https://www.Example.de/";
        assert_eq!(
            norm("/politik/a-b-c", home),
            Some("https://www.example.de/politik/a-b-c".to_string())
        );
        assert_eq!(
            norm("/politik/a-b-c", home),
            norm("https://www.example.de/politik/a-b-c", home)
        );
    }
}
