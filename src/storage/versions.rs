//! Per-site snapshot history.
//!
//! Each site owns `content/{feed_name}/`: one HTML artifact per captured
//! version, named by a sortable UTC timestamp, and a `.metadata.json`
//! record. The record is only rewritten after the artifact write succeeds.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use quick_xml::escape::escape;

use crate::error::{AppError, Result};
use crate::models::{SiteMetadata, Snapshot};
use crate::pipeline::diff::{DiffEngine, validate_diff};
use crate::storage::LocalStorage;

/// Directory holding one subdirectory per site.
pub const CONTENT_DIR: &str = "content";

const METADATA_FILE: &str = ".metadata.json";
const SNAPSHOT_EXTENSION: &str = "html";
const KEY_FORMAT: &str = "%Y%m%d-%H%M%S-%6f";
const LEGACY_KEY_FORMAT: &str = "%Y%m%d-%H%M%S";

/// A snapshot that was written by [`VersionStore::persist_if_changed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedSnapshot {
    /// Artifact key, e.g. `20250811-120000-000000.html`
    pub filename: String,
    /// Diff against the previous snapshot body, when one exists
    pub diff: Option<String>,
}

/// Append-only snapshot sequence plus metadata record, per site.
#[derive(Debug, Clone)]
pub struct VersionStore {
    storage: LocalStorage,
    differ: DiffEngine,
}

impl VersionStore {
    pub fn new(storage: LocalStorage) -> Self {
        Self {
            storage,
            differ: DiffEngine::new(),
        }
    }

    pub fn with_diff_engine(mut self, differ: DiffEngine) -> Self {
        self.differ = differ;
        self
    }

    fn site_key(feed_name: &str, name: &str) -> String {
        format!("{CONTENT_DIR}/{feed_name}/{name}")
    }

    /// Current metadata record. Missing or unreadable records read as empty.
    pub async fn metadata(&self, feed_name: &str) -> SiteMetadata {
        let key = Self::site_key(feed_name, METADATA_FILE);
        match self.storage.read_json::<SiteMetadata>(&key).await {
            Ok(Some(meta)) => meta,
            Ok(None) => SiteMetadata::default(),
            Err(e) => {
                log::warn!("Ignoring unreadable metadata for {feed_name}: {e}");
                SiteMetadata::default()
            }
        }
    }

    async fn save_metadata(&self, feed_name: &str, meta: &SiteMetadata) -> Result<()> {
        let key = Self::site_key(feed_name, METADATA_FILE);
        self.storage
            .write_json(&key, meta)
            .await
            .map_err(|e| AppError::storage(format!("writing metadata for {feed_name}: {e}")))
    }

    /// Whether enough time has passed since the last check.
    pub async fn should_check(&self, feed_name: &str, min_interval: Option<Duration>) -> bool {
        self.should_check_at(feed_name, min_interval, Utc::now()).await
    }

    /// [`should_check`](Self::should_check) against an explicit clock.
    pub async fn should_check_at(
        &self,
        feed_name: &str,
        min_interval: Option<Duration>,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(min_interval) = min_interval else {
            return true;
        };

        let meta = self.metadata(feed_name).await;
        match (meta.last_update.as_deref(), meta.last_checked()) {
            (None, _) => true,
            (Some(raw), None) => {
                log::warn!("Unparseable last_update '{raw}' for {feed_name}; checking anyway");
                true
            }
            (Some(_), Some(last)) => now - last >= min_interval,
        }
    }

    /// True iff `fingerprint` differs from the last stored one.
    pub async fn has_changed(&self, feed_name: &str, fingerprint: &str) -> bool {
        self.metadata(feed_name).await.last_hash.as_deref() != Some(fingerprint)
    }

    /// Record a check that found no change, for cadence gating.
    pub async fn record_check(&self, feed_name: &str, at: DateTime<Utc>) -> Result<()> {
        let mut meta = self.metadata(feed_name).await;
        meta.last_update = Some(at.to_rfc3339());
        self.save_metadata(feed_name, &meta).await
    }

    /// Store `snapshot` if its fingerprint is new.
    ///
    /// Returns `None` without touching disk when unchanged. Otherwise writes
    /// the artifact, diffs it against the previous one, then updates the
    /// metadata record.
    pub async fn persist_if_changed(
        &self,
        feed_name: &str,
        snapshot: &Snapshot,
    ) -> Result<Option<PersistedSnapshot>> {
        let mut meta = self.metadata(feed_name).await;
        if meta.last_hash.as_deref() == Some(snapshot.fingerprint.as_str()) {
            log::debug!("No changes detected for {feed_name}");
            return Ok(None);
        }

        let filename = allocate_key(&snapshot.captured_at, meta.last_filename.as_deref());
        let artifact = render_artifact(feed_name, snapshot);
        self.storage
            .write_bytes(&Self::site_key(feed_name, &filename), artifact.as_bytes())
            .await
            .map_err(|e| {
                AppError::storage(format!("writing snapshot {filename} for {feed_name}: {e}"))
            })?;

        let diff = match meta.last_filename.as_deref() {
            Some(previous) => self.diff_against(feed_name, previous, &snapshot.content).await,
            None => None,
        };

        meta.last_hash = Some(snapshot.fingerprint.clone());
        meta.last_update = Some(snapshot.timestamp());
        meta.last_filename = Some(filename.clone());
        self.save_metadata(feed_name, &meta).await?;

        log::info!(
            "Saved new content to {}",
            self.storage.path(&Self::site_key(feed_name, &filename)).display()
        );
        Ok(Some(PersistedSnapshot { filename, diff }))
    }

    /// Diff against a stored artifact. Any failure degrades to no diff.
    async fn diff_against(&self, feed_name: &str, previous: &str, content: &str) -> Option<String> {
        let document = match self.read_snapshot(feed_name, previous).await {
            Ok(Some(document)) => document,
            Ok(None) => {
                log::warn!("Previous snapshot {previous} for {feed_name} is missing; no diff");
                return None;
            }
            Err(e) => {
                log::warn!("Could not read previous snapshot {previous} for {feed_name}: {e}");
                return None;
            }
        };

        let Some(old_body) = artifact_body(&document) else {
            log::warn!("Previous snapshot {previous} for {feed_name} has no body; no diff");
            return None;
        };

        let diff = self.differ.diff(old_body, content);
        if diff.is_empty() {
            log::debug!("Only whitespace changed for {feed_name}");
            return None;
        }
        if !validate_diff(&diff) {
            log::warn!("Discarding malformed diff for {feed_name}");
            return None;
        }
        Some(diff)
    }

    /// Raw artifact document for a snapshot key.
    pub async fn read_snapshot(&self, feed_name: &str, filename: &str) -> Result<Option<String>> {
        self.storage
            .read_string(&Self::site_key(feed_name, filename))
            .await
    }

    /// Every stored snapshot key, oldest first.
    pub async fn snapshots(&self, feed_name: &str) -> Result<Vec<String>> {
        self.storage
            .list_files(&format!("{CONTENT_DIR}/{feed_name}"), SNAPSHOT_EXTENSION)
            .await
    }

    /// Most recent snapshot key, found by key order alone.
    pub async fn latest_snapshot(&self, feed_name: &str) -> Result<Option<String>> {
        Ok(self.snapshots(feed_name).await?.pop())
    }
}

/// Next snapshot key: the capture time, nudged past the previous key if needed.
fn allocate_key(captured_at: &DateTime<Utc>, previous: Option<&str>) -> String {
    let mut at = *captured_at;
    if let Some(last) = previous.and_then(parse_key) {
        if at <= last {
            at = last + Duration::microseconds(1);
        }
    }
    format!("{}.{SNAPSHOT_EXTENSION}", at.format(KEY_FORMAT))
}

fn parse_key(filename: &str) -> Option<DateTime<Utc>> {
    let stem = filename.strip_suffix(".html")?;
    NaiveDateTime::parse_from_str(stem, KEY_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(stem, LEGACY_KEY_FORMAT))
        .ok()
        .map(|naive| naive.and_utc())
}

/// Self-describing HTML document for one snapshot.
pub fn render_artifact(feed_name: &str, snapshot: &Snapshot) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{title}</title>
    <meta name="source-url" content="{url}">
    <meta name="scraped-at" content="{timestamp}">
    <meta name="content-hash" content="{hash}">
    <meta name="rss-feed-url" content="../../feeds/{feed_name}.xml">
    <script src="../../history-viewer.js"></script>
</head>
<body>
{content}
</body>
</html>
"#,
        title = escape(snapshot.title.as_str()),
        url = escape(snapshot.source_url.as_str()),
        timestamp = snapshot.timestamp(),
        hash = snapshot.fingerprint,
        content = snapshot.content,
    )
}

/// Normalized content embedded in an artifact.
pub fn artifact_body(document: &str) -> Option<&str> {
    let start = document.find("<body>")? + "<body>".len();
    let end = document.rfind("</body>")?;
    if end < start {
        return None;
    }
    let body = &document[start..end];
    let body = body.strip_prefix('\n').unwrap_or(body);
    Some(body.strip_suffix('\n').unwrap_or(body))
}
