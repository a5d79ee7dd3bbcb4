// src/utils/log.rs

//! Console report for batch runs.
//!
//! Diagnostics go through the `log` facade. This module prints the
//! operator-facing view of a run: one tagged line per site, indented
//! details, and a closing tally. Failures go to stderr.

use std::sync::OnceLock;

use chrono::Local;

use crate::pipeline::{BatchSummary, SiteReport};

static VERBOSE: OnceLock<bool> = OnceLock::new();

/// Enable per-site detail lines. Later calls are ignored.
pub fn init(verbose: bool) {
    let _ = VERBOSE.set(verbose);
}

fn verbose() -> bool {
    VERBOSE.get().copied().unwrap_or(false)
}

/// Outcome tag shown in front of each site line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Updated,
    Unchanged,
    Skipped,
    Failed,
}

impl Outcome {
    fn of(report: &SiteReport) -> Self {
        let result = &report.result;
        if !result.success {
            Outcome::Failed
        } else if result.skipped {
            Outcome::Skipped
        } else if result.changed {
            Outcome::Updated
        } else {
            Outcome::Unchanged
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Outcome::Updated => "UPDATED",
            Outcome::Unchanged => "SAME",
            Outcome::Skipped => "SKIP",
            Outcome::Failed => "FAIL",
        }
    }
}

fn stamp(tag: &str, message: &str) -> String {
    format!("[{}] [{tag}] {message}", Local::now().format("%Y-%m-%d %H:%M:%S"))
}

/// Banner printed before the first site runs.
pub fn batch_started(site_count: usize) {
    let border = "═".repeat(60);
    println!("{border}");
    println!("  Checking {site_count} site(s)");
    println!("{border}");
}

/// Lines describing one site: the tagged headline, then indented details.
fn site_lines(report: &SiteReport, verbose: bool) -> Vec<String> {
    let result = &report.result;
    let outcome = Outcome::of(report);
    let mut lines = vec![format!("{}: {}", report.feed_name, report.url)];

    match outcome {
        Outcome::Updated => {
            if let Some(filename) = &result.filename {
                lines.push(format!("    snapshot {filename}"));
            }
            if let Some(location) = &result.feed_location {
                lines.push(format!("    feed {location}"));
            }
        }
        Outcome::Skipped => {
            if let Some(reason) = &result.error_message {
                lines.push(format!("    {reason}"));
            }
        }
        Outcome::Failed => match &result.error {
            Some(record) => {
                let stage = record
                    .stage
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                lines.push(format!("    {} error at {stage}: {}", record.kind, record.message));
            }
            None => lines.push(format!(
                "    {}",
                result.error_message.as_deref().unwrap_or("unknown error")
            )),
        },
        Outcome::Unchanged => {}
    }

    if verbose {
        if let Some(hash) = &result.content_fingerprint {
            lines.push(format!("    fingerprint {}", &hash[..hash.len().min(12)]));
        }
    }
    lines
}

/// Print one site's outcome.
pub fn report_site(report: &SiteReport) {
    let outcome = Outcome::of(report);
    for line in site_lines(report, verbose()) {
        let line = stamp(outcome.tag(), &line);
        if outcome == Outcome::Failed {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }
}

fn tally(summary: &BatchSummary) -> String {
    format!(
        "{} site(s): {} updated, {} unchanged, {} skipped, {} failed",
        summary.total, summary.changed, summary.unchanged, summary.skipped, summary.errors
    )
}

/// Print the closing tally of a batch.
pub fn report_batch(summary: &BatchSummary) {
    println!();
    let tag = if summary.has_errors() { "FAIL" } else { "DONE" };
    println!("{}", stamp(tag, &tally(summary)));
}
