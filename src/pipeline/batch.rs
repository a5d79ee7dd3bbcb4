// src/pipeline/batch.rs

//! Batch runner over the configured site list.

use std::collections::HashSet;

use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::error::AppError;
use crate::models::{ErrorRecord, SiteConfig, Stage, WatchResult};
use crate::pipeline::watch::Watcher;
use crate::utils::log as report;

/// One site's outcome within a batch.
#[derive(Debug, Clone, Serialize)]
pub struct SiteReport {
    pub feed_name: String,
    pub url: String,
    pub result: WatchResult,
}

/// Aggregate outcome of a batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub errors: usize,
    pub sites: Vec<SiteReport>,
}

impl BatchSummary {
    fn record(&mut self, report: SiteReport) {
        let result = &report.result;
        self.total += 1;
        if !result.success {
            self.errors += 1;
        } else if result.skipped {
            self.skipped += 1;
        } else if result.changed {
            self.changed += 1;
        } else {
            self.unchanged += 1;
        }
        self.sites.push(report);
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    /// Process exit status: non-zero iff any site failed.
    pub fn exit_code(&self) -> u8 {
        if self.has_errors() { 1 } else { 0 }
    }
}

/// Run every site, in input order, at most `max_concurrent` at a time.
///
/// A repeated feed name is reported as a configuration failure rather than
/// run, so one feed never has two runs in flight.
pub async fn run_batch(
    watcher: &Watcher,
    sites: &[SiteConfig],
    max_concurrent: usize,
) -> BatchSummary {
    report::batch_started(sites.len());

    let mut seen = HashSet::new();
    let jobs: Vec<(&SiteConfig, bool)> = sites
        .iter()
        .map(|site| (site, seen.insert(site.feed_name.as_str())))
        .collect();

    let mut reports = stream::iter(jobs)
        .map(|(site, first)| async move {
            let result = if first {
                watcher.run(site).await
            } else {
                let error = AppError::config(format!("duplicate feed_name '{}'", site.feed_name));
                WatchResult::failed(ErrorRecord::from_error(&site.feed_name, Stage::Start, &error))
            };
            SiteReport {
                feed_name: site.feed_name.clone(),
                url: site.url.clone(),
                result,
            }
        })
        .buffered(max_concurrent.max(1));

    let mut summary = BatchSummary::default();
    while let Some(site) = reports.next().await {
        report::report_site(&site);
        summary.record(site);
    }

    report::report_batch(&summary);
    summary
}
