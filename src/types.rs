use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Cap on matches collected by a single `search_files` call.
pub const DEFAULT_MAX_RESULTS: usize = 10_000;
/// Files larger than this are skipped by content scans.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
/// Window inspected for a NUL byte when sniffing binary content.
pub const BINARY_SNIFF_LEN: usize = 8 * 1024;
/// Default result cap for fuzzy queries.
pub const DEFAULT_FUZZY_RESULTS: usize = 50;
/// Default coalescing window for watch events.
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;
/// Per-handle cap on buffered watch events; overflow drops the newest.
pub const MAX_EVENT_BUFFER: usize = 10_000;

/// Metadata for one file known to the workspace index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Path relative to the indexed root, `/`-separated on every platform.
    pub relative_path: String,
    pub file_name: String,
    /// Lowercased extension without the dot, empty when there is none.
    pub extension: String,
    pub size: u64,
    /// Last modification time, epoch milliseconds. 0 when unavailable.
    pub modified_ms: u64,
    pub is_dir: bool,
}

impl FileMeta {
    /// Builds metadata for `path` under `root` from an already-fetched stat.
    /// Returns `None` when the path falls outside `root` or has no basename.
    pub fn new(path: &Path, root: &Path, meta: &std::fs::Metadata) -> Option<Self> {
        let relative = pathdiff::diff_paths(path, root)?;
        let relative_path = normalize_separators(&relative);
        let file_name = path.file_name()?.to_string_lossy().into_owned();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let modified_ms = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Some(FileMeta {
            path: path.to_path_buf(),
            relative_path,
            file_name,
            extension,
            size: meta.len(),
            modified_ms,
            is_dir: meta.is_dir(),
        })
    }

    /// Stats `path` and builds metadata. `None` when the stat fails.
    pub fn from_path(path: &Path, root: &Path) -> Option<Self> {
        let meta = std::fs::metadata(path).ok()?;
        Self::new(path, root, &meta)
    }
}

fn normalize_separators(path: &Path) -> String {
    let raw = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        raw.into_owned()
    } else {
        raw.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

/// Knobs for `SearchEngine::search_files`. `Default` carries the engine
/// defaults, so callers set only what they need:
///
/// ```
/// use worklens::SearchOptions;
/// let opts = SearchOptions { max_results: 100, ..Default::default() };
/// ```
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub is_regex: bool,
    pub case_insensitive: bool,
    pub whole_word: bool,
    /// Restrict candidates to paths matching any of these globs.
    pub include_globs: Vec<String>,
    /// Drop candidates matching any of these globs; matching directories are
    /// pruned before descent.
    pub exclude_globs: Vec<String>,
    pub max_results: usize,
    pub respect_gitignore: bool,
    /// Match against basenames instead of file contents.
    pub filename_only: bool,
    pub max_file_size: u64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            is_regex: false,
            case_insensitive: false,
            whole_word: false,
            include_globs: Vec::new(),
            exclude_globs: Vec::new(),
            max_results: DEFAULT_MAX_RESULTS,
            respect_gitignore: true,
            filename_only: false,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// One match inside one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMatch {
    pub file_path: PathBuf,
    /// 1-based. 0 for filename-only matches.
    pub line_number: u64,
    /// 0-based byte offset within the line. 0 for filename-only matches.
    pub column: usize,
    pub line_content: String,
    pub match_text: String,
    /// Byte length of `match_text`.
    pub match_length: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Grouped by file in traversal order, line order within a file.
    pub matches: Vec<SearchMatch>,
    pub files_scanned: usize,
    pub files_with_matches: usize,
    /// Equals `matches.len()`. On a truncated result this is the count
    /// collected before scanning halted, not an estimate of the true total.
    pub total_matches: usize,
    pub truncated: bool,
    pub duration_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FsEventKind {
    Create,
    Modify,
    Delete,
    Rename,
}

/// A normalized, debounced filesystem event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FsEvent {
    #[serde(rename = "eventType")]
    pub kind: FsEventKind,
    pub path: PathBuf,
    pub is_dir: bool,
    /// Epoch milliseconds of the last raw observation folded into the event.
    pub timestamp_ms: u64,
}

/// Identifier for an active watch. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct WatchId(pub u64);

impl std::fmt::Display for WatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchHandle {
    pub id: WatchId,
    pub path: PathBuf,
    pub recursive: bool,
}

/// Knobs for `WatchRegistry::start_watching`.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub recursive: bool,
    pub debounce_ms: u64,
    /// Raw events whose path matches any of these globs are dropped before
    /// debouncing.
    pub ignore_globs: Vec<String>,
    pub max_buffer: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        WatchConfig {
            recursive: true,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            ignore_globs: Vec::new(),
            max_buffer: MAX_EVENT_BUFFER,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_options_defaults() {
        let opts = SearchOptions::default();
        assert_eq!(opts.max_results, DEFAULT_MAX_RESULTS);
        assert_eq!(opts.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert!(opts.respect_gitignore);
        assert!(!opts.is_regex);
        assert!(!opts.filename_only);
    }

    #[test]
    fn file_meta_relative_path_and_extension() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("src");
        std::fs::create_dir(&sub).unwrap();
        let file = sub.join("Main.RS");
        std::fs::write(&file, b"fn main() {}\n").unwrap();

        let meta = FileMeta::from_path(&file, dir.path()).unwrap();
        assert_eq!(meta.relative_path, "src/Main.RS");
        assert_eq!(meta.file_name, "Main.RS");
        assert_eq!(meta.extension, "rs");
        assert_eq!(meta.size, 13);
        assert!(!meta.is_dir);
        assert!(meta.modified_ms > 0);
    }

    #[test]
    fn file_meta_missing_path_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileMeta::from_path(&dir.path().join("gone.txt"), dir.path()).is_none());
    }

    #[test]
    fn events_serialize_with_wire_names() {
        let event = FsEvent {
            kind: FsEventKind::Create,
            path: PathBuf::from("/tmp/a.txt"),
            is_dir: false,
            timestamp_ms: 1_700_000_000_000,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["eventType"], "create");
        assert_eq!(json["path"], "/tmp/a.txt");
        assert_eq!(json["isDir"], false);
        assert_eq!(json["timestampMs"], 1_700_000_000_000u64);
    }

    #[test]
    fn matches_serialize_with_wire_names() {
        let m = SearchMatch {
            file_path: PathBuf::from("/w/src/lib.rs"),
            line_number: 3,
            column: 4,
            line_content: "let needle = 1;".into(),
            match_text: "needle".into(),
            match_length: 6,
        };
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["filePath"], "/w/src/lib.rs");
        assert_eq!(json["lineNumber"], 3);
        assert_eq!(json["column"], 4);
        assert_eq!(json["lineContent"], "let needle = 1;");
        assert_eq!(json["matchText"], "needle");
        assert_eq!(json["matchLength"], 6);
    }
}
