//! worklens - workspace filesystem engine
//!
//! Filtered tree walks, parallel content and filename search, an in-memory
//! fuzzy file index, and debounced filesystem watching, sharing one path
//! filter and one error type.

mod debounce;
mod error;
pub mod index;
mod lines;
pub mod log;
mod matcher;
pub mod path_filter;
mod path_utils;
pub mod score;
pub mod search;
pub mod types;
pub mod walker;
pub mod watcher;

// Re-export the main surface for convenience
pub use debounce::EventDebouncer;
pub use error::{Error, Result};
pub use index::{ScoredFile, WorkspaceIndex};
pub use log::init_tracing;
pub use matcher::ContentMatcher;
pub use path_filter::PathFilter;
pub use search::SearchEngine;
pub use types::{
    FileMeta, FsEvent, FsEventKind, SearchMatch, SearchOptions, SearchResult, WatchConfig,
    WatchHandle, WatchId,
};
pub use walker::{FileTreeWalker, WalkedFiles};
pub use watcher::WatchRegistry;
