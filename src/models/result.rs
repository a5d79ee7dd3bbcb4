//! Uniform per-site pipeline result.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, ErrorKind};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Start,
    GateCadence,
    Extract,
    Compare,
    Persist,
    Diff,
    Publish,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::GateCadence => "gate_cadence",
            Stage::Extract => "extract",
            Stage::Compare => "compare",
            Stage::Persist => "persist",
            Stage::Diff => "diff",
            Stage::Publish => "publish",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Structured failure kept for later inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
    pub feed_name: String,
    /// Stage that failed; unknown for panics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    pub timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn from_error(feed_name: &str, stage: Stage, error: &AppError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            feed_name: feed_name.to_string(),
            stage: Some(stage),
            timestamp: Utc::now(),
        }
    }

    /// Failure that did not come from an `AppError`.
    pub fn internal(feed_name: &str, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Internal,
            message: message.into(),
            feed_name: feed_name.to_string(),
            stage: None,
            timestamp: Utc::now(),
        }
    }
}

/// Outcome of one site run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatchResult {
    pub success: bool,
    pub changed: bool,
    pub skipped: bool,

    /// Key of the snapshot stored by this run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Feed document location, relative to the storage root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_fingerprint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
}

impl WatchResult {
    /// Cadence gate closed; nothing was fetched.
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            success: true,
            skipped: true,
            error_message: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Content fingerprint matches the last stored snapshot.
    pub fn unchanged(fingerprint: impl Into<String>) -> Self {
        Self {
            success: true,
            content_fingerprint: Some(fingerprint.into()),
            ..Self::default()
        }
    }

    /// A new snapshot was stored and the feed republished.
    pub fn changed(
        filename: impl Into<String>,
        feed_location: impl Into<String>,
        fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            success: true,
            changed: true,
            filename: Some(filename.into()),
            feed_location: Some(feed_location.into()),
            content_fingerprint: Some(fingerprint.into()),
            ..Self::default()
        }
    }

    pub fn failed(record: ErrorRecord) -> Self {
        Self {
            error_message: Some(record.message.clone()),
            error: Some(record),
            ..Self::default()
        }
    }
}
