// src/error.rs

//! Unified error handling for the watcher.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Network failure, timeout or non-2xx status while fetching a page
    #[error("Fetch error for {url}: {message}")]
    Fetch { url: String, message: String },

    /// Markup could not be reduced to content
    #[error("Extraction error for {url}: {message}")]
    Extraction { url: String, message: String },

    /// Snapshot artifact or metadata record could not be written
    #[error("Storage error: {0}")]
    Storage(String),

    /// Feed document could not be written
    #[error("Feed write error: {0}")]
    FeedWrite(String),

    /// Invalid configuration or site entry
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}

/// Coarse error category carried in structured error records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Fetch,
    Extraction,
    Storage,
    FeedWrite,
    Config,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Fetch => "fetch",
            ErrorKind::Extraction => "extraction",
            ErrorKind::Storage => "storage",
            ErrorKind::FeedWrite => "feed_write",
            ErrorKind::Config => "config",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

impl AppError {
    /// Create a fetch error for a URL.
    pub fn fetch(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create an extraction error for a URL.
    pub fn extraction(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Extraction {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a storage error.
    pub fn storage(message: impl fmt::Display) -> Self {
        Self::Storage(message.to_string())
    }

    /// Create a feed write error.
    pub fn feed_write(message: impl fmt::Display) -> Self {
        Self::FeedWrite(message.to_string())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Fetch { .. } | AppError::Http(_) => ErrorKind::Fetch,
            AppError::Extraction { .. } => ErrorKind::Extraction,
            AppError::Storage(_) | AppError::Io(_) | AppError::Json(_) => ErrorKind::Storage,
            AppError::FeedWrite(_) => ErrorKind::FeedWrite,
            AppError::Config(_) | AppError::Toml(_) | AppError::Url(_) => ErrorKind::Config,
        }
    }
}
