//! Storage for snapshots, site metadata and feed documents.
//!
//! ## Directory Structure
//!
//! ```text
//! {root}/
//! ├── content/
//! │   └── {feed_name}/
//! │       ├── .metadata.json               # last hash / check time / key
//! │       ├── 20250811-120000-000000.html  # immutable snapshot artifacts
//! │       └── 20250812-093000-000000.html
//! └── feeds/
//!     └── {feed_name}.xml                  # RSS 2.0, newest first
//! ```

pub mod local;
pub mod versions;

// Re-export for convenience
pub use local::LocalStorage;
pub use versions::{CONTENT_DIR, PersistedSnapshot, VersionStore, artifact_body, render_artifact};
