//! Article metadata extraction.
//!
//! [`HtmlMetadataExtractor`] reads, in order of preference:
//!
//! 1. JSON-LD `Article`/`NewsArticle` objects (`headline`, `datePublished`, ...)
//! 2. Open Graph, Twitter card, Dublin Core and plain `<meta>` tags
//! 3. document fallbacks: `<title>`, `<h1>`, `<time datetime>`,
//!    `<link rel="canonical">`, `<html lang>`, article paragraphs
//!
//! A page without a title and without body text is not an article and yields
//! `None`, which the pipeline counts as a skipped record.

use crate::models::{MetadataField, MetadataRecord};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use url::Url;

/// Turns an article page into a metadata record.
pub trait MetadataExtractor: Send + Sync {
    /// Extract `fields` from `html` fetched from `url`. `None` when the page
    /// has no meaningful content.
    fn extract(&self, url: &str, html: &str, fields: &[MetadataField]) -> Option<MetadataRecord>;
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid built-in selector")
}

static META: Lazy<Selector> = Lazy::new(|| selector("meta[content]"));
static JSON_LD: Lazy<Selector> = Lazy::new(|| selector(r#"script[type="application/ld+json"]"#));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));
static H1: Lazy<Selector> = Lazy::new(|| selector("h1"));
static TIME: Lazy<Selector> = Lazy::new(|| selector("time[datetime]"));
static CANONICAL: Lazy<Selector> = Lazy::new(|| selector(r#"link[rel="canonical"][href]"#));
static HTML_LANG: Lazy<Selector> = Lazy::new(|| selector("html[lang]"));
static ARTICLE_P: Lazy<Selector> = Lazy::new(|| selector("article p"));
static MAIN_P: Lazy<Selector> = Lazy::new(|| selector("main p"));
static BODY_P: Lazy<Selector> = Lazy::new(|| selector("body p"));
static COMMENTS: Lazy<Selector> =
    Lazy::new(|| selector("#comments p, .comments p, .comment-body, .comment-content"));

/// Paragraphs shorter than this are navigation crumbs, captions or buttons.
const MIN_PARAGRAPH_CHARS: usize = 40;

/// `scraper`-based extractor.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlMetadataExtractor;

impl MetadataExtractor for HtmlMetadataExtractor {
    fn extract(&self, url: &str, html: &str, fields: &[MetadataField]) -> Option<MetadataRecord> {
        let document = Html::parse_document(html);
        let mut record = MetadataRecord::new();

        read_json_ld(&document, &mut record);
        read_meta_tags(&document, &mut record);
        read_fallbacks(&document, url, &mut record);

        if record.get(MetadataField::Title).is_none() && record.get(MetadataField::Text).is_none() {
            return None;
        }
        record.retain_fields(fields);
        Some(record)
    }
}

fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn read_meta_tags(document: &Html, record: &mut MetadataRecord) {
    let mut tags: Vec<String> = Vec::new();

    for meta in document.select(&META) {
        let element = meta.value();
        let name = element
            .attr("name")
            .or_else(|| element.attr("property"))
            .or_else(|| element.attr("itemprop"))
            .unwrap_or_default()
            .to_lowercase();
        let content = element.attr("content").unwrap_or_default().trim();
        if name.is_empty() || content.is_empty() {
            continue;
        }

        let field = match name.as_str() {
            "og:title" | "twitter:title" | "dc.title" | "headline" => MetadataField::Title,
            "author" | "article:author" | "dc.creator" | "byl" => MetadataField::Author,
            "description" | "og:description" | "twitter:description" | "dc.description" => {
                MetadataField::Description
            }
            "og:site_name" | "application-name" | "publisher" | "dc.publisher" => {
                MetadataField::Sitename
            }
            "article:published_time" | "og:article:published_time" | "datepublished" | "date"
            | "dc.date" | "dc.date.issued" | "pubdate" | "publishdate" => MetadataField::Date,
            "og:url" | "twitter:url" => MetadataField::Url,
            "article:section" | "section" => MetadataField::Categories,
            "og:locale" | "language" | "dc.language" => MetadataField::Language,
            "keywords" | "news_keywords" | "article:tag" => {
                tags.extend(
                    content
                        .split(',')
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string),
                );
                continue;
            }
            _ => continue,
        };
        record.set_if_missing(field, content);
    }

    if !tags.is_empty() {
        tags.dedup();
        record.set_if_missing(MetadataField::Tags, tags.join(", "));
    }
}

fn read_json_ld(document: &Html, record: &mut MetadataRecord) {
    for script in document.select(&JSON_LD) {
        let raw = script.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<Value>(&raw) else {
            continue;
        };
        let mut candidates = Vec::new();
        collect_articles(&value, &mut candidates);
        for article in candidates {
            apply_json_ld(article, record);
        }
    }
}

fn collect_articles<'v>(value: &'v Value, out: &mut Vec<&'v Value>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| collect_articles(item, out)),
        Value::Object(map) => {
            if let Some(graph) = map.get("@graph") {
                collect_articles(graph, out);
            }
            let is_article = match map.get("@type") {
                Some(Value::String(t)) => t.ends_with("Article") || t == "Report",
                Some(Value::Array(types)) => types
                    .iter()
                    .filter_map(Value::as_str)
                    .any(|t| t.ends_with("Article")),
                _ => false,
            };
            if is_article {
                out.push(value);
            }
        }
        _ => {}
    }
}

fn json_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => json_string(map.get("name")),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(|v| json_string(Some(v))).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        _ => None,
    }
}

fn apply_json_ld(article: &Value, record: &mut MetadataRecord) {
    let pairs = [
        (MetadataField::Title, "headline"),
        (MetadataField::Date, "datePublished"),
        (MetadataField::Author, "author"),
        (MetadataField::Description, "description"),
        (MetadataField::Categories, "articleSection"),
        (MetadataField::Tags, "keywords"),
        (MetadataField::Sitename, "publisher"),
        (MetadataField::Language, "inLanguage"),
    ];
    for (field, key) in pairs {
        if let Some(value) = json_string(article.get(key)) {
            record.set_if_missing(field, value);
        }
    }
}

fn read_fallbacks(document: &Html, url: &str, record: &mut MetadataRecord) {
    if let Some(title) = document
        .select(&TITLE)
        .next()
        .or_else(|| document.select(&H1).next())
        .map(text_of)
    {
        record.set_if_missing(MetadataField::Title, title);
    }

    if let Some(date) = document
        .select(&TIME)
        .next()
        .and_then(|t| t.value().attr("datetime"))
    {
        record.set_if_missing(MetadataField::Date, date);
    }

    if let Some(canonical) = document
        .select(&CANONICAL)
        .next()
        .and_then(|l| l.value().attr("href"))
    {
        record.set_if_missing(MetadataField::Url, canonical);
    }
    record.set_if_missing(MetadataField::Url, url);

    if let Some(host) = Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string)) {
        record.set_if_missing(MetadataField::Hostname, host);
    }

    if let Some(lang) = document
        .select(&HTML_LANG)
        .next()
        .and_then(|h| h.value().attr("lang"))
    {
        record.set_if_missing(MetadataField::Language, lang);
    }

    let text = [&*ARTICLE_P, &*MAIN_P, &*BODY_P]
        .into_iter()
        .map(|sel| paragraphs(document, sel))
        .find(|paras| !paras.is_empty())
        .unwrap_or_default();
    if !text.is_empty() {
        record.set_if_missing(MetadataField::Text, text.join("\n"));
    }

    let comments: Vec<String> = document
        .select(&COMMENTS)
        .map(text_of)
        .filter(|c| !c.is_empty())
        .collect();
    if !comments.is_empty() {
        record.set_if_missing(MetadataField::Comments, comments.join("\n"));
    }
}

fn paragraphs(document: &Html, sel: &Selector) -> Vec<String> {
    document
        .select(sel)
        .map(text_of)
        .filter(|p| p.chars().count() >= MIN_PARAGRAPH_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://www.example.de/politik/regierung-plant-reform";

    const ARTICLE: &str = r#"<!doctype html>
<html lang="de"><head>
  <title>Regierung plant Reform | Example</title>
  <meta property="og:title" content="Regierung plant Reform">
  <meta name="description" content="Die Regierung hat neue Pläne vorgestellt.">
  <meta property="og:site_name" content="Example Zeitung">
  <meta name="keywords" content="Politik, Reform, Politik">
  <link rel="canonical" href="https://www.example.de/politik/regierung-plant-reform">
  <script type="application/ld+json">
  {"@context":"https://schema.org","@graph":[
    {"@type":"WebPage","name":"ignored"},
    {"@type":"NewsArticle","headline":"Regierung plant große Reform",
     "datePublished":"2026-10-16T08:00:00+02:00",
     "author":[{"@type":"Person","name":"Erika Muster"}]}
  ]}
  </script>
</head><body>
  <nav><p>Start</p></nav>
  <article>
    <h1>Regierung plant große Reform</h1>
    <p>Die Bundesregierung hat am Donnerstag ein umfangreiches Reformpaket vorgestellt.</p>
    <p>Kurz.</p>
    <p>Kritiker bemängeln, dass wesentliche Fragen der Finanzierung offen bleiben.</p>
  </article>
  <section id="comments"><p>Endlich passiert etwas!</p></section>
</body></html>"#;

    #[test]
    fn test_extracts_preferred_sources() {
        let record = HtmlMetadataExtractor
            .extract(URL, ARTICLE, &MetadataField::ALL)
            .unwrap();
        assert_eq!(record.get(MetadataField::Title), Some("Regierung plant große Reform"));
        assert_eq!(record.get(MetadataField::Date), Some("2026-10-16T08:00:00+02:00"));
        assert_eq!(record.get(MetadataField::Author), Some("Erika Muster"));
        assert_eq!(
            record.get(MetadataField::Description),
            Some("Die Regierung hat neue Pläne vorgestellt.")
        );
        assert_eq!(record.get(MetadataField::Sitename), Some("Example Zeitung"));
        assert_eq!(record.get(MetadataField::Url), Some(URL));
        assert_eq!(record.get(MetadataField::Hostname), Some("www.example.de"));
        assert_eq!(record.get(MetadataField::Language), Some("de"));
        assert_eq!(record.get(MetadataField::Tags), Some("Politik, Reform, Politik"));
        assert_eq!(record.get(MetadataField::Comments), Some("Endlich passiert etwas!"));

        let text = record.get(MetadataField::Text).unwrap();
        assert!(text.starts_with("Die Bundesregierung"));
        assert!(!text.contains("Kurz."));
    }

    #[test]
    fn test_only_requested_fields_returned() {
        let record = HtmlMetadataExtractor
            .extract(URL, ARTICLE, &[MetadataField::Title, MetadataField::Url])
            .unwrap();
        assert!(record.get(MetadataField::Title).is_some());
        assert!(record.get(MetadataField::Url).is_some());
        assert_eq!(record.get(MetadataField::Text), None);
        assert_eq!(record.get(MetadataField::Date), None);
    }

    #[test]
    fn test_fallbacks_without_metadata() {
        let html = r#"<html><head><title>  Nur ein   Titel </title></head>
            <body><time datetime="2026-01-02">2. Januar</time></body></html>"#;
        let record = HtmlMetadataExtractor
            .extract(URL, html, &MetadataField::ALL)
            .unwrap();
        assert_eq!(record.get(MetadataField::Title), Some("Nur ein Titel"));
        assert_eq!(record.get(MetadataField::Date), Some("2026-01-02"));
        assert_eq!(record.get(MetadataField::Url), Some(URL));
    }

    #[test]
    fn test_empty_page_is_none() {
        assert!(HtmlMetadataExtractor.extract(URL, "", &MetadataField::ALL).is_none());
        assert!(
            HtmlMetadataExtractor
                .extract(URL, "<html><body><p>x</p></body></html>", &MetadataField::ALL)
                .is_none()
        );
    }

    #[test]
    fn test_broken_json_ld_is_ignored() {
        let html = r#"<html><head><title>T</title>
            <script type="application/ld+json">{not json</script></head></html>"#;
        let record = HtmlMetadataExtractor
            .extract(URL, html, &[MetadataField::Title])
            .unwrap();
        assert_eq!(record.get(MetadataField::Title), Some("T"));
    }
}
