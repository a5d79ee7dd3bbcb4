//! RSS feed documents, one per watched site.

pub mod builder;
pub mod document;

pub use builder::{DEFAULT_MAX_ENTRIES, FEEDS_DIR, FeedBuilder};
pub use document::{Channel, parse_entries, render_feed};
