// src/lib.rs

//! Website change watcher library.
//!
//! Captures normalized snapshots of web pages, keeps an append-only history
//! per site and publishes each change as an RSS entry with a diff.

pub mod error;
pub mod feed;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
