//! Service layer for the watcher.
//!
//! - Content extraction (`ContentExtractor`, behind the `ContentSource` trait)

mod extractor;

pub use extractor::{
    ContentExtractor, ContentSource, ExtractOptions, extract_document, normalize_text,
};
