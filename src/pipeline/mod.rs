//! Pipeline entry points.
//!
//! - `Watcher::run`: check one site and publish any change
//! - `run_batch`: run every configured site and aggregate the outcomes
//! - `diff`: unified-diff primitives used by the version store

pub mod batch;
pub mod diff;
pub mod watch;

pub use batch::{BatchSummary, SiteReport, run_batch};
pub use diff::{DiffEngine, Hunk, parse_hunks, reverse_diff, unified_diff, validate_diff};
pub use watch::Watcher;
