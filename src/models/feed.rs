//! Feed entries.

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::escape::escape;
use serde::{Deserialize, Serialize};

use super::Snapshot;

/// RFC-822 date format used for `pubDate` and `lastBuildDate`.
pub const RFC822_FORMAT: &str = "%a, %d %b %Y %H:%M:%S +0000";

/// Format a UTC timestamp for the feed.
pub fn format_rfc822(at: &DateTime<Utc>) -> String {
    at.format(RFC822_FORMAT).to_string()
}

/// Unique entry identifier: site identity plus a short fingerprint prefix.
pub fn entry_guid(feed_name: &str, fingerprint: &str) -> String {
    let end = fingerprint.len().min(8);
    format!("{}-{}", feed_name, &fingerprint[..end])
}

/// One update record in a feed document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub title: String,

    /// Rendered snapshot, with the capture time as `?date=` for the history viewer
    pub link: String,

    /// Summary, optionally followed by the diff as preformatted HTML
    pub description: String,

    /// RFC-822 publish date, kept verbatim when read back
    pub pub_date: String,

    pub guid: String,
}

impl FeedEntry {
    /// Build the entry announcing a freshly stored snapshot.
    pub fn for_snapshot(
        feed_name: &str,
        base_url: &str,
        snapshot: &Snapshot,
        filename: &str,
        diff: Option<&str>,
    ) -> Self {
        let summary = snapshot
            .description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Update from {}", snapshot.source_url));

        let description = match diff {
            Some(diff) if !diff.is_empty() => {
                format!("{summary}\n\n<pre>{}</pre>", escape(diff))
            }
            _ => summary,
        };

        Self {
            title: snapshot.title.clone(),
            link: format!(
                "{}/content/{}/{}?date={}",
                base_url.trim_end_matches('/'),
                feed_name,
                filename,
                snapshot.captured_at.to_rfc3339_opts(SecondsFormat::Micros, true)
            ),
            description,
            pub_date: format_rfc822(&snapshot.captured_at),
            guid: entry_guid(feed_name, &snapshot.fingerprint),
        }
    }
}
