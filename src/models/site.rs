//! Tracked site entries.

use std::sync::LazyLock;

use chrono::Duration;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

static FEED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("feed name pattern is valid")
});

/// One tracked source, as listed under `[[sites]]` in the batch configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Page to watch
    pub url: String,

    /// Logical site identity; names the content directory and feed document
    pub feed_name: String,

    /// Minimum hours between checks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_hours: Option<f64>,
}

impl SiteConfig {
    pub fn new(url: impl Into<String>, feed_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            feed_name: feed_name.into(),
            min_hours: None,
        }
    }

    /// Set the check cadence in hours.
    pub fn with_min_hours(mut self, hours: f64) -> Self {
        self.min_hours = Some(hours);
        self
    }

    /// Validate the entry: http(s) URL, path-safe feed name, sane cadence.
    pub fn validate(&self) -> Result<()> {
        validate_feed_name(&self.feed_name)?;

        let url = Url::parse(self.url.trim()).map_err(|e| {
            AppError::config(format!("{}: invalid url '{}': {e}", self.feed_name, self.url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::config(format!(
                "{}: unsupported url scheme '{}'",
                self.feed_name,
                url.scheme()
            )));
        }

        if let Some(hours) = self.min_hours {
            if !hours.is_finite() || hours < 0.0 {
                return Err(AppError::config(format!(
                    "{}: min_hours must be a non-negative number",
                    self.feed_name
                )));
            }
        }
        Ok(())
    }

    /// Cadence as a duration, if one is configured.
    pub fn min_interval(&self) -> Option<Duration> {
        self.min_hours
            .map(|hours| Duration::milliseconds((hours * 3_600_000.0).round() as i64))
    }
}

/// Check that a feed name is safe to use as a path segment and URL component.
pub fn validate_feed_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(AppError::config("feed_name is empty"));
    }
    if !FEED_NAME.is_match(name) || name.contains("..") {
        return Err(AppError::config(format!(
            "feed_name '{name}' must contain only letters, digits, '-', '_' or '.'"
        )));
    }
    Ok(())
}
