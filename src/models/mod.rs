// src/models/mod.rs

//! Domain models for the watcher.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod feed;
mod result;
mod site;
mod snapshot;

// Re-export all public types
pub use config::{Config, WatcherConfig, default_base_url};
pub use feed::{FeedEntry, RFC822_FORMAT, entry_guid, format_rfc822};
pub use result::{ErrorRecord, Stage, WatchResult};
pub use site::{SiteConfig, validate_feed_name};
pub use snapshot::{SiteMetadata, Snapshot, fingerprint, text_to_html};
