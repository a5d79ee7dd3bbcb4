// src/services/extractor.rs

//! Content extraction.
//!
//! Fetches a page, drops volatile elements and reduces the remaining body to
//! plain text. The fingerprint is taken over that text, so markup churn that
//! does not change what a reader sees does not register as a change.

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ego_tree::iter::Edge;
use quick_xml::escape::escape;
use reqwest::Client;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{Snapshot, WatcherConfig};
use crate::utils::http::{create_async_client, fetch_text};

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid selector"));
static BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("valid selector"));
static META_DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[name="description"]"#).expect("valid selector")
});
static OG_DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[property="og:description"]"#).expect("valid selector")
});

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Anything that can produce a snapshot for a URL.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn extract(&self, url: &str) -> Result<Snapshot>;
}

/// Markup reduction settings.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub exclude_tags: Vec<String>,
    pub text_width: usize,
}

impl From<&WatcherConfig> for ExtractOptions {
    fn from(config: &WatcherConfig) -> Self {
        Self {
            exclude_tags: config.exclude_tags.clone(),
            text_width: config.text_width,
        }
    }
}

/// HTTP-backed [`ContentSource`].
pub struct ContentExtractor {
    client: Client,
    options: ExtractOptions,
}

impl ContentExtractor {
    pub fn new(config: &WatcherConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            options: ExtractOptions::from(config),
        })
    }
}

#[async_trait]
impl ContentSource for ContentExtractor {
    async fn extract(&self, url: &str) -> Result<Snapshot> {
        let html = fetch_text(&self.client, url).await?;
        log::debug!("Fetched {} bytes from {url}", html.len());
        extract_document(&html, url, &self.options, Utc::now())
    }
}

/// Reduce a fetched document to a snapshot.
pub fn extract_document(
    html: &str,
    url: &str,
    options: &ExtractOptions,
    captured_at: DateTime<Utc>,
) -> Result<Snapshot> {
    let document = Html::parse_document(html);

    let title = document
        .select(&TITLE)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| url.to_string());

    let description = document
        .select(&META_DESCRIPTION)
        .chain(document.select(&OG_DESCRIPTION))
        .filter_map(|meta| meta.value().attr("content"))
        .map(str::trim)
        .find(|d| !d.is_empty())
        .map(str::to_string);

    let root = document
        .select(&BODY)
        .next()
        .unwrap_or_else(|| document.root_element());

    let mut markup = String::new();
    write_element(root, &options.exclude_tags, &mut markup);

    let text = html2text::from_read(markup.as_bytes(), options.text_width)
        .map_err(|e| AppError::extraction(url, e.to_string()))?;
    let text = normalize_text(&text);
    if text.is_empty() {
        return Err(AppError::extraction(url, "no text content after reduction"));
    }

    Ok(Snapshot::from_text(url, title, description, &text, captured_at))
}

/// Re-serialize an element, skipping excluded subtrees.
///
/// Walks open/close edges instead of recursing, so nesting depth is bounded
/// by memory rather than by the thread's stack.
fn write_element(root: ElementRef<'_>, exclude: &[String], out: &mut String) {
    // Open elements inside an excluded subtree, including its root.
    let mut skipping = 0usize;

    for edge in root.traverse() {
        match edge {
            Edge::Open(node) => match node.value() {
                Node::Element(el) => {
                    if skipping > 0 || is_excluded(el.name(), exclude) {
                        skipping += 1;
                        continue;
                    }
                    out.push('<');
                    out.push_str(el.name());
                    for (attr, value) in el.attrs() {
                        out.push_str(&format!(" {attr}=\"{}\"", escape(value)));
                    }
                    out.push('>');
                }
                Node::Text(text) if skipping == 0 => {
                    let raw: &str = text;
                    out.push_str(&escape(raw));
                }
                _ => {}
            },
            Edge::Close(node) => {
                if let Node::Element(el) = node.value() {
                    if skipping > 0 {
                        skipping -= 1;
                    } else if !VOID_ELEMENTS.contains(&el.name()) {
                        out.push_str("</");
                        out.push_str(el.name());
                        out.push('>');
                    }
                }
            }
        }
    }
}

fn is_excluded(name: &str, exclude: &[String]) -> bool {
    exclude.iter().any(|tag| tag.eq_ignore_ascii_case(name))
}

/// Right-trim every line and drop leading/trailing blank lines.
pub fn normalize_text(text: &str) -> String {
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    let start = lines.iter().position(|l| !l.is_empty());
    let end = lines.iter().rposition(|l| !l.is_empty());
    match (start, end) {
        (Some(start), Some(end)) => lines[start..=end].join("\n"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fingerprint;
    use chrono::TimeZone;

    fn options() -> ExtractOptions {
        ExtractOptions::from(&WatcherConfig::default())
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 11, 12, 0, 0).unwrap()
    }

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title> Demo </title>
  <meta name="description" content="A demo page">
  <script>var build = 1;</script>
</head>
<body>
  <nav><a href="/">Home</a></nav>
  <p>Hello</p>
  <footer>Generated at 12:00</footer>
</body>
</html>"#;

    #[test]
    fn test_extracts_metadata_and_text() {
        let snap = extract_document(PAGE, "https://example.com", &options(), at()).unwrap();

        assert_eq!(snap.title, "Demo");
        assert_eq!(snap.description.as_deref(), Some("A demo page"));
        assert_eq!(snap.fingerprint, fingerprint("Hello"));
        assert_eq!(snap.content, "<p>Hello</p>");
        assert_eq!(snap.source_url, "https://example.com");
        assert_eq!(snap.captured_at, at());
    }

    #[test]
    fn test_volatile_markup_does_not_change_fingerprint() {
        let churned = PAGE
            .replace("var build = 1;", "var build = 2;")
            .replace("Generated at 12:00", "Generated at 13:37")
            .replace("<p>Hello</p>", "<div class=\"x\"><p>Hello</p></div>");

        let a = extract_document(PAGE, "https://example.com", &options(), at()).unwrap();
        let b = extract_document(&churned, "https://example.com", &options(), at()).unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn test_falls_back_to_url_and_og_description() {
        let html = r#"<html><head><meta property="og:description" content="From OG"></head>
<body><p>Body text</p></body></html>"#;
        let snap = extract_document(html, "https://example.com/x", &options(), at()).unwrap();

        assert_eq!(snap.title, "https://example.com/x");
        assert_eq!(snap.description.as_deref(), Some("From OG"));
    }

    #[test]
    fn test_empty_body_is_extraction_error() {
        let html = "<html><head><title>t</title></head><body><script>x()</script></body></html>";
        let err = extract_document(html, "https://example.com", &options(), at()).unwrap_err();
        assert!(matches!(err, AppError::Extraction { .. }));
    }

    #[test]
    fn test_deeply_nested_markup_does_not_exhaust_stack() {
        let depth = 20_000;
        let html = format!(
            "<html><body>{}deep{}</body></html>",
            "<div>".repeat(depth),
            "</div>".repeat(depth)
        );

        let snap = extract_document(&html, "https://example.com", &options(), at()).unwrap();
        assert!(snap.content.contains("deep"));
    }

    #[test]
    fn test_excluded_subtree_is_skipped_whole() {
        let html = r#"<html><body>
<p>Before</p>
<nav><div><ul><li>Menu</li></ul></div><br></nav>
<p>After</p>
</body></html>"#;
        let doc = Html::parse_document(html);
        let body = doc.select(&BODY).next().unwrap();

        let mut markup = String::new();
        write_element(body, &options().exclude_tags, &mut markup);

        assert!(!markup.contains("Menu"));
        assert!(!markup.contains("<nav"));
        assert!(markup.contains("<p>Before</p>"));
        assert!(markup.contains("<p>After</p>"));
        assert!(markup.ends_with("</body>"));
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("\n\n  a  \n\nb \n\n"), "  a\n\nb");
        assert_eq!(normalize_text(" \n \n"), "");
    }
}
