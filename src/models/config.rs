//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::SiteConfig;
use crate::error::{AppError, Result};

/// Root configuration: watcher settings plus the list of tracked sites.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Fetching, extraction and feed settings
    #[serde(default)]
    pub watcher: WatcherConfig,

    /// Sites to track
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values and every site entry.
    pub fn validate(&self) -> Result<()> {
        self.watcher.validate()?;

        let mut seen = HashSet::new();
        for site in &self.sites {
            site.validate()?;
            if !seen.insert(site.feed_name.as_str()) {
                return Err(AppError::config(format!(
                    "duplicate feed_name '{}'",
                    site.feed_name
                )));
            }
        }
        Ok(())
    }
}

/// Fetching, extraction and feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Public base URL the content and feeds are served from
    #[serde(default)]
    pub base_url: Option<String>,

    /// Maximum number of entries kept in a feed document
    #[serde(default = "defaults::max_feed_entries")]
    pub max_feed_entries: usize,

    /// Sites processed concurrently by the batch runner
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Line width used when reducing markup to text
    #[serde(default = "defaults::text_width")]
    pub text_width: usize,

    /// Feed channel language
    #[serde(default = "defaults::language")]
    pub language: String,

    /// Elements dropped before text reduction
    #[serde(default = "defaults::exclude_tags")]
    pub exclude_tags: Vec<String>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            base_url: None,
            max_feed_entries: defaults::max_feed_entries(),
            max_concurrent: defaults::max_concurrent(),
            text_width: defaults::text_width(),
            language: defaults::language(),
            exclude_tags: defaults::exclude_tags(),
        }
    }
}

impl WatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.user_agent.trim().is_empty() {
            return Err(AppError::config("watcher.user_agent is empty"));
        }
        if self.timeout_secs == 0 {
            return Err(AppError::config("watcher.timeout_secs must be > 0"));
        }
        if self.max_feed_entries == 0 {
            return Err(AppError::config("watcher.max_feed_entries must be > 0"));
        }
        if self.max_concurrent == 0 {
            return Err(AppError::config("watcher.max_concurrent must be > 0"));
        }
        if self.text_width < 20 {
            return Err(AppError::config("watcher.text_width must be >= 20"));
        }
        Ok(())
    }

    /// Base URL for feed links: the explicit one, else the repository fallback.
    pub fn resolve_base_url(&self, repository: Option<&str>) -> String {
        match self.base_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.trim_end_matches('/').to_string(),
            _ => default_base_url(repository),
        }
    }
}

/// Fallback link base when no explicit base URL is configured.
pub fn default_base_url(repository: Option<&str>) -> String {
    let repository = repository
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or("owner/repo");
    format!("https://github.com/{repository}/blob/main")
}

mod defaults {
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; Watcher/1.0)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_feed_entries() -> usize {
        20
    }
    pub fn max_concurrent() -> usize {
        1
    }
    pub fn text_width() -> usize {
        120
    }
    pub fn language() -> String {
        "en".into()
    }
    pub fn exclude_tags() -> Vec<String> {
        ["script", "style", "nav", "header", "footer"]
            .into_iter()
            .map(String::from)
            .collect()
    }
}
