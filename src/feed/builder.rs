//! Per-site feed maintenance.

use chrono::Utc;

use crate::error::{AppError, Result};
use crate::feed::document::{Channel, parse_entries, render_feed};
use crate::models::{FeedEntry, Snapshot, format_rfc822};
use crate::storage::{CONTENT_DIR, LocalStorage};

/// Directory holding one feed document per site.
pub const FEEDS_DIR: &str = "feeds";

/// Entries kept per feed.
pub const DEFAULT_MAX_ENTRIES: usize = 20;

/// Maintains `feeds/{feed_name}.xml`, newest entry first.
#[derive(Debug, Clone)]
pub struct FeedBuilder {
    storage: LocalStorage,
    base_url: String,
    max_entries: usize,
    language: String,
}

impl FeedBuilder {
    pub fn new(storage: LocalStorage, base_url: impl Into<String>) -> Self {
        Self {
            storage,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_entries: DEFAULT_MAX_ENTRIES,
            language: "en".to_string(),
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Storage key of a site's feed document.
    pub fn feed_key(feed_name: &str) -> String {
        format!("{FEEDS_DIR}/{feed_name}.xml")
    }

    /// Current entries, newest first. A missing or corrupt document reads as empty.
    pub async fn load(&self, feed_name: &str) -> Vec<FeedEntry> {
        let key = Self::feed_key(feed_name);
        let xml = match self.storage.read_string(&key).await {
            Ok(Some(xml)) => xml,
            Ok(None) => return Vec::new(),
            Err(e) => {
                log::warn!("Could not read feed {key}; starting fresh: {e}");
                return Vec::new();
            }
        };

        match parse_entries(&xml) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Existing feed {key} is corrupt; starting fresh: {e}");
                Vec::new()
            }
        }
    }

    /// Entry announcing a stored snapshot.
    pub fn entry_for(
        &self,
        feed_name: &str,
        snapshot: &Snapshot,
        filename: &str,
        diff: Option<&str>,
    ) -> FeedEntry {
        FeedEntry::for_snapshot(feed_name, &self.base_url, snapshot, filename, diff)
    }

    /// Channel link: the latest rendered snapshot, else the feed itself.
    async fn channel_link(&self, feed_name: &str) -> String {
        let dir = format!("{CONTENT_DIR}/{feed_name}");
        match self.storage.list_files(&dir, "html").await {
            Ok(files) => match files.last() {
                Some(latest) => format!("{}/{dir}/{latest}", self.base_url),
                None => format!("{}/{}", self.base_url, Self::feed_key(feed_name)),
            },
            Err(e) => {
                log::debug!("Listing snapshots for {feed_name} failed: {e}");
                format!("{}/{}", self.base_url, Self::feed_key(feed_name))
            }
        }
    }

    /// Prepend `entry`, cap the history and rewrite the whole document.
    ///
    /// Returns the feed location relative to the storage root.
    pub async fn publish(&self, feed_name: &str, entry: FeedEntry) -> Result<String> {
        let mut entries = self.load(feed_name).await;
        entries.insert(0, entry);
        entries.truncate(self.max_entries);

        let channel = Channel {
            title: format!("{feed_name} Updates"),
            link: self.channel_link(feed_name).await,
            description: format!("Updates from {feed_name}"),
            language: self.language.clone(),
            last_build_date: format_rfc822(&Utc::now()),
        };
        let xml = render_feed(&channel, &entries)?;

        let key = Self::feed_key(feed_name);
        self.storage
            .write_bytes(&key, xml.as_bytes())
            .await
            .map_err(|e| AppError::feed_write(format!("writing {key}: {e}")))?;

        log::info!("Updated feed {key} ({} entries)", entries.len());
        Ok(key)
    }
}
