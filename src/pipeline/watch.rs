// src/pipeline/watch.rs

//! Per-site pipeline.
//!
//! `START → GATE_CADENCE → EXTRACT → COMPARE → PERSIST → DIFF → PUBLISH → DONE`,
//! with early exits at the cadence gate (skipped), extraction (failed) and
//! comparison (unchanged). [`Watcher::run`] is the error boundary: every
//! failure below it, panics included, becomes a failed [`WatchResult`].

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;

use crate::error::{AppError, Result};
use crate::feed::FeedBuilder;
use crate::models::{ErrorRecord, SiteConfig, Stage, WatchResult, WatcherConfig};
use crate::services::{ContentExtractor, ContentSource};
use crate::storage::{LocalStorage, VersionStore};

/// An error tagged with the stage it happened in.
#[derive(Debug)]
struct StageFailure {
    stage: Stage,
    error: AppError,
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> std::result::Result<T, StageFailure>;
}

impl<T> AtStage<T> for Result<T> {
    fn at(self, stage: Stage) -> std::result::Result<T, StageFailure> {
        self.map_err(|error| StageFailure { stage, error })
    }
}

/// Composes extraction, version storage and feed publishing for one site.
pub struct Watcher {
    source: Arc<dyn ContentSource>,
    versions: VersionStore,
    feeds: FeedBuilder,
}

impl Watcher {
    pub fn new(source: Arc<dyn ContentSource>, versions: VersionStore, feeds: FeedBuilder) -> Self {
        Self {
            source,
            versions,
            feeds,
        }
    }

    /// HTTP-backed watcher storing under `root`.
    pub fn from_config(
        config: &WatcherConfig,
        root: impl Into<PathBuf>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let storage = LocalStorage::new(root);
        let source = Arc::new(ContentExtractor::new(config)?);
        let feeds = FeedBuilder::new(storage.clone(), base_url)
            .with_max_entries(config.max_feed_entries)
            .with_language(config.language.clone());
        Ok(Self::new(source, VersionStore::new(storage), feeds))
    }

    pub fn versions(&self) -> &VersionStore {
        &self.versions
    }

    pub fn feeds(&self) -> &FeedBuilder {
        &self.feeds
    }

    /// Check a single page without a configuration file.
    pub async fn check(&self, url: &str, feed_name: &str, min_hours: Option<f64>) -> WatchResult {
        let site = SiteConfig {
            url: url.to_string(),
            feed_name: feed_name.to_string(),
            min_hours,
        };
        self.run(&site).await
    }

    /// Run the pipeline for one site. Never fails; never panics.
    pub async fn run(&self, site: &SiteConfig) -> WatchResult {
        match AssertUnwindSafe(self.try_run(site)).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(StageFailure { stage, error })) => {
                log::error!("{} failed at {stage}: {error}", site.feed_name);
                WatchResult::failed(ErrorRecord::from_error(&site.feed_name, stage, &error))
            }
            Err(panic) => {
                let message = format!("Unexpected failure: {}", panic_message(&*panic));
                log::error!("{}: {message}", site.feed_name);
                WatchResult::failed(ErrorRecord::internal(&site.feed_name, message))
            }
        }
    }

    async fn try_run(&self, site: &SiteConfig) -> std::result::Result<WatchResult, StageFailure> {
        let feed = site.feed_name.as_str();

        enter(feed, Stage::Start);
        site.validate().at(Stage::Start)?;

        enter(feed, Stage::GateCadence);
        if !self.versions.should_check(feed, site.min_interval()).await {
            let hours = site.min_hours.unwrap_or_default();
            log::info!("Skipping {feed}: checked less than {hours} hours ago");
            return Ok(WatchResult::skipped(format!(
                "Skipped - checked too recently (min_hours={hours})"
            )));
        }

        enter(feed, Stage::Extract);
        let snapshot = self.source.extract(&site.url).await.at(Stage::Extract)?;

        enter(feed, Stage::Compare);
        if !self.versions.has_changed(feed, &snapshot.fingerprint).await {
            log::info!("No changes detected for {feed}");
            if let Err(e) = self.versions.record_check(feed, Utc::now()).await {
                log::warn!("Could not record check time for {feed}: {e}");
            }
            return Ok(WatchResult::unchanged(snapshot.fingerprint));
        }

        enter(feed, Stage::Persist);
        let Some(persisted) = self
            .versions
            .persist_if_changed(feed, &snapshot)
            .await
            .at(Stage::Persist)?
        else {
            return Ok(WatchResult::unchanged(snapshot.fingerprint));
        };

        enter(feed, Stage::Diff);
        match &persisted.diff {
            Some(diff) => log::debug!("{feed}: diff of {} lines", diff.lines().count()),
            None => log::debug!("{feed}: no diff for {}", persisted.filename),
        }

        // From here on the snapshot is durable even if the feed write fails.
        enter(feed, Stage::Publish);
        let entry = self
            .feeds
            .entry_for(feed, &snapshot, &persisted.filename, persisted.diff.as_deref());
        let location = self.feeds.publish(feed, entry).await.at(Stage::Publish)?;

        enter(feed, Stage::Done);
        Ok(WatchResult::changed(
            persisted.filename,
            location,
            snapshot.fingerprint,
        ))
    }
}

fn enter(feed_name: &str, stage: Stage) {
    log::debug!("{feed_name}: {stage}");
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::{Snapshot, fingerprint};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Serves queued page texts; the last one repeats once the queue drains.
    pub(crate) struct FixtureSource {
        pages: Mutex<VecDeque<String>>,
        last: Mutex<Option<String>>,
        pub(crate) fetches: AtomicUsize,
    }

    impl FixtureSource {
        pub(crate) fn new(pages: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                pages: Mutex::new(pages.iter().map(|p| p.to_string()).collect()),
                last: Mutex::new(None),
                fetches: AtomicUsize::new(0),
            })
        }

        pub(crate) fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ContentSource for FixtureSource {
        async fn extract(&self, url: &str) -> Result<Snapshot> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let next = self.pages.lock().unwrap().pop_front();
            let text = match next {
                Some(text) => {
                    *self.last.lock().unwrap() = Some(text.clone());
                    text
                }
                None => self
                    .last
                    .lock()
                    .unwrap()
                    .clone()
                    .ok_or_else(|| AppError::fetch(url, "HTTP 503 Service Unavailable"))?,
            };
            if text == "PANIC" {
                panic!("fixture exploded");
            }
            Ok(Snapshot::from_text(url, "Demo", None, &text, Utc::now()))
        }
    }

    pub(crate) fn watcher(tmp: &TempDir, source: Arc<dyn ContentSource>) -> Watcher {
        let storage = LocalStorage::new(tmp.path());
        Watcher::new(
            source,
            VersionStore::new(storage.clone()),
            FeedBuilder::new(storage, "https://site.example"),
        )
    }

    #[tokio::test]
    async fn test_first_second_and_unchanged_runs() {
        let tmp = TempDir::new().unwrap();
        let source = FixtureSource::new(&["Hello", "Hello World"]);
        let watcher = watcher(&tmp, source.clone());
        let site = SiteConfig::new("https://example.com", "demo");

        // First run: one snapshot, one entry, no diff.
        let first = watcher.run(&site).await;
        assert!(first.success && first.changed && !first.skipped);
        assert_eq!(first.feed_location.as_deref(), Some("feeds/demo.xml"));
        assert_eq!(first.content_fingerprint, Some(fingerprint("Hello")));

        let meta = watcher.versions().metadata("demo").await;
        assert_eq!(meta.last_hash, Some(fingerprint("Hello")));
        assert_eq!(meta.last_filename, first.filename);

        let entries = watcher.feeds().load("demo").await;
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].description.contains("<pre>"));

        // Second run: new snapshot with a diff, newest entry first.
        let second = watcher.run(&site).await;
        assert!(second.success && second.changed);
        assert!(second.filename > first.filename);

        let entries = watcher.feeds().load("demo").await;
        assert_eq!(entries.len(), 2);
        assert!(entries[0].description.contains("-&lt;p&gt;Hello&lt;/p&gt;"));
        assert!(entries[0].description.contains("+&lt;p&gt;Hello World&lt;/p&gt;"));
        assert_eq!(entries[1].guid, format!("demo-{}", &fingerprint("Hello")[..8]));
        assert_eq!(
            watcher.versions().metadata("demo").await.last_hash,
            Some(fingerprint("Hello World"))
        );

        // Third run: same content, nothing written.
        let third = watcher.run(&site).await;
        assert!(third.success && !third.changed && !third.skipped);
        assert!(third.filename.is_none());
        assert_eq!(watcher.versions().snapshots("demo").await.unwrap().len(), 2);
        assert_eq!(watcher.feeds().load("demo").await.len(), 2);
        assert_eq!(source.fetches(), 3);
    }

    #[tokio::test]
    async fn test_cadence_gate_skips_without_fetching() {
        let tmp = TempDir::new().unwrap();
        let source = FixtureSource::new(&["Hello"]);
        let watcher = watcher(&tmp, source.clone());
        let site = SiteConfig::new("https://example.com", "demo").with_min_hours(24.0);

        assert!(watcher.run(&site).await.changed);
        let second = watcher.run(&site).await;

        assert!(second.success && second.skipped && !second.changed);
        assert_eq!(
            second.error_message.as_deref(),
            Some("Skipped - checked too recently (min_hours=24)")
        );
        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_reported_not_raised() {
        let tmp = TempDir::new().unwrap();
        let watcher = watcher(&tmp, FixtureSource::new(&[]));

        let result = watcher.check("https://example.com", "demo", None).await;

        assert!(!result.success && !result.changed);
        let record = result.error.unwrap();
        assert_eq!(record.kind, ErrorKind::Fetch);
        assert_eq!(record.stage, Some(Stage::Extract));
        assert_eq!(record.feed_name, "demo");
        assert!(!tmp.path().join("content/demo").exists());
    }

    #[tokio::test]
    async fn test_invalid_site_is_config_failure() {
        let tmp = TempDir::new().unwrap();
        let source = FixtureSource::new(&["Hello"]);
        let watcher = watcher(&tmp, source.clone());

        let result = watcher.check("ftp://example.com", "demo", None).await;
        assert_eq!(result.error.unwrap().kind, ErrorKind::Config);

        let result = watcher.check("https://example.com", "../escape", None).await;
        assert_eq!(result.error.unwrap().kind, ErrorKind::Config);
        assert_eq!(source.fetches(), 0);
    }

    #[tokio::test]
    async fn test_panic_becomes_failed_result() {
        let tmp = TempDir::new().unwrap();
        let watcher = watcher(&tmp, FixtureSource::new(&["PANIC"]));

        let result = watcher.check("https://example.com", "demo", None).await;

        assert!(!result.success);
        let record = result.error.unwrap();
        assert_eq!(record.kind, ErrorKind::Internal);
        assert_eq!(record.stage, None);
        assert!(record.message.contains("fixture exploded"));
    }

    #[tokio::test]
    async fn test_publish_failure_keeps_snapshot() {
        let tmp = TempDir::new().unwrap();
        let watcher = watcher(&tmp, FixtureSource::new(&["Hello"]));

        // A directory where the feed document belongs makes the write fail.
        std::fs::create_dir_all(tmp.path().join("feeds/demo.xml/inner")).unwrap();

        let result = watcher.check("https://example.com", "demo", None).await;

        assert!(!result.success);
        let record = result.error.unwrap();
        assert_eq!(record.kind, ErrorKind::FeedWrite);
        assert_eq!(record.stage, Some(Stage::Publish));

        let meta = watcher.versions().metadata("demo").await;
        assert_eq!(meta.last_hash, Some(fingerprint("Hello")));
        assert_eq!(watcher.versions().snapshots("demo").await.unwrap().len(), 1);
    }
}
