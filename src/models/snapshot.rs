//! Captured page versions and the per-site metadata record.

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::escape::escape;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of normalized content.
pub fn fingerprint(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Render normalized text as the HTML body stored in snapshot artifacts.
///
/// Blank lines become `<br>`, lines that look tabular (a tab or a run of
/// four spaces) become `<pre>`, everything else a paragraph.
pub fn text_to_html(text: &str) -> String {
    text.lines()
        .map(|line| {
            let line = line.trim_end();
            if line.is_empty() {
                "<br>".to_string()
            } else if line.contains('\t') || line.contains("    ") {
                format!("<pre>{}</pre>", escape(line))
            } else {
                format!("<p>{}</p>", escape(line))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One immutable observation of a site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Page the content was captured from
    pub source_url: String,

    /// UTC capture time
    pub captured_at: DateTime<Utc>,

    /// Normalized body (HTML rendering of the reduced text)
    pub content: String,

    /// SHA-256 hex digest of the normalized text
    pub fingerprint: String,

    /// Page title
    pub title: String,

    /// Meta description, if the page has one
    pub description: Option<String>,
}

impl Snapshot {
    /// Build a snapshot from already-normalized text.
    pub fn from_text(
        source_url: impl Into<String>,
        title: impl Into<String>,
        description: Option<String>,
        text: &str,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source_url: source_url.into(),
            captured_at,
            content: text_to_html(text),
            fingerprint: fingerprint(text),
            title: title.into(),
            description,
        }
    }

    /// ISO-8601 capture timestamp.
    pub fn timestamp(&self) -> String {
        self.captured_at.to_rfc3339_opts(SecondsFormat::Micros, false)
    }
}

/// Mutable per-site record, stored as `.metadata.json` in the site directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteMetadata {
    /// Fingerprint of the last stored snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_hash: Option<String>,

    /// ISO-8601 time of the last successful check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<String>,

    /// Key of the last stored snapshot artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_filename: Option<String>,
}

impl SiteMetadata {
    /// Parse `last_update`, if present and well formed.
    pub fn last_checked(&self) -> Option<DateTime<Utc>> {
        self.last_update
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        assert_eq!(
            fingerprint("Hello"),
            "185f8db32271fe25f561a6fc938b2e264306ec304eda518007d1764826381969"
        );
        assert_eq!(fingerprint("Hello"), fingerprint("Hello"));
        assert_ne!(fingerprint("Hello"), fingerprint("Hello World"));
    }

    #[test]
    fn test_text_to_html() {
        let html = text_to_html("Title\n\nName    Value\nA < B");
        assert_eq!(
            html,
            "<p>Title</p>\n<br>\n<pre>Name    Value</pre>\n<p>A &lt; B</p>"
        );
    }

    #[test]
    fn test_snapshot_from_text() {
        let at = Utc.with_ymd_and_hms(2025, 8, 11, 12, 0, 0).unwrap();
        let snap = Snapshot::from_text("https://example.com", "Demo", None, "Hello", at);
        assert_eq!(snap.content, "<p>Hello</p>");
        assert_eq!(snap.fingerprint, fingerprint("Hello"));
        assert_eq!(snap.timestamp(), "2025-08-11T12:00:00.000000+00:00");
    }

    #[test]
    fn test_last_checked_tolerates_garbage() {
        let meta = SiteMetadata {
            last_update: Some("yesterday-ish".into()),
            ..SiteMetadata::default()
        };
        assert!(meta.last_checked().is_none());
    }
}
