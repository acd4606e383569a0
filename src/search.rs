use crate::error::{Error, Result};
use crate::lines::split_lines;
use crate::matcher::ContentMatcher;
use crate::path_filter::PathFilter;
use crate::types::{BINARY_SNIFF_LEN, DEFAULT_MAX_FILE_SIZE, SearchMatch, SearchOptions, SearchResult};
use crate::walker::{FileTreeWalker, default_thread_count};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, warn};

/// Content and filename search over live disk. Every call walks the tree
/// fresh; results never come from the workspace index.
pub struct SearchEngine {
    threads: usize,
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

struct ScanOutcome {
    matches: Vec<SearchMatch>,
    files_scanned: usize,
    truncated: bool,
}

impl SearchEngine {
    pub fn new() -> Self {
        SearchEngine {
            threads: default_thread_count(),
        }
    }

    pub fn with_threads(threads: usize) -> Self {
        SearchEngine {
            threads: threads.max(1),
        }
    }

    /// Searches every non-ignored regular file under `directory`.
    ///
    /// Matches are grouped by file in traversal order, line order within a
    /// file. Scanning halts once `max_results` matches were collected;
    /// `truncated` is set whenever the cap was filled, and `files_scanned`
    /// then reflects only the work actually performed.
    pub fn search_files(
        &self,
        directory: &Path,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchResult> {
        let started = Instant::now();
        if !directory.is_dir() {
            return Err(Error::NotFound(directory.to_path_buf()));
        }
        let matcher = ContentMatcher::compile(
            query,
            options.is_regex,
            options.case_insensitive,
            options.whole_word,
        )?;
        let filter = PathFilter::compile(
            directory,
            &options.exclude_globs,
            &options.include_globs,
            options.respect_gitignore,
        );
        let walked = FileTreeWalker::with_threads(filter, self.threads).collect_files();

        let scan = if options.filename_only {
            scan_filenames(&walked.files, &matcher, options.max_results)
        } else {
            scan_contents(&walked.files, &matcher, options)
        };

        let result = SearchResult {
            files_scanned: scan.files_scanned,
            files_with_matches: count_files_with_matches(&scan.matches),
            total_matches: scan.matches.len(),
            truncated: scan.truncated,
            duration_ms: started.elapsed().as_secs_f64() * 1000.0,
            matches: scan.matches,
        };
        debug!(
            directory = %directory.display(),
            total = result.total_matches,
            scanned = result.files_scanned,
            truncated = result.truncated,
            "content search finished"
        );
        Ok(result)
    }

    /// The directory pipeline restricted to one file. A present file with no
    /// matches yields an empty vector; oversized and binary files do too,
    /// matching the skip a directory scan would perform.
    pub fn search_in_file(
        &self,
        file_path: &Path,
        query: &str,
        is_regex: bool,
        case_insensitive: bool,
    ) -> Result<Vec<SearchMatch>> {
        if !file_path.is_file() {
            return Err(Error::NotFound(file_path.to_path_buf()));
        }
        let matcher = ContentMatcher::compile(query, is_regex, case_insensitive, false)?;
        let meta = std::fs::metadata(file_path)?;
        if meta.len() > DEFAULT_MAX_FILE_SIZE {
            return Ok(Vec::new());
        }
        let bytes = std::fs::read(file_path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::PermissionDenied {
                Error::PermissionDenied(file_path.to_path_buf())
            } else {
                Error::Io(err)
            }
        })?;
        if is_binary(&bytes) {
            return Ok(Vec::new());
        }

        let text = String::from_utf8_lossy(&bytes);
        let mut matches = Vec::new();
        for (line_index, line) in split_lines(&text).enumerate() {
            for span in matcher.find(line) {
                matches.push(SearchMatch {
                    file_path: file_path.to_path_buf(),
                    line_number: line_index as u64 + 1,
                    column: span.start,
                    line_content: line.to_string(),
                    match_text: span.text.to_string(),
                    match_length: span.text.len(),
                });
            }
        }
        Ok(matches)
    }

    /// Counts matches under `directory` without collecting them. Never
    /// capped, so it equals the untruncated length `search_files` would
    /// produce under default options.
    pub fn count_matches(&self, directory: &Path, query: &str, is_regex: bool) -> Result<u64> {
        if !directory.is_dir() {
            return Err(Error::NotFound(directory.to_path_buf()));
        }
        let matcher = ContentMatcher::compile(query, is_regex, false, false)?;
        let filter = PathFilter::compile(directory, &[], &[], true);
        let walked = FileTreeWalker::with_threads(filter, self.threads).collect_files();

        let count = walked
            .files
            .par_iter()
            .map(|path| {
                let Some(bytes) = read_searchable_bytes(path, DEFAULT_MAX_FILE_SIZE) else {
                    return 0u64;
                };
                let text = String::from_utf8_lossy(&bytes);
                split_lines(&text)
                    .map(|line| matcher.find(line).count() as u64)
                    .sum()
            })
            .sum();
        Ok(count)
    }
}

fn scan_contents(files: &[PathBuf], matcher: &ContentMatcher, options: &SearchOptions) -> ScanOutcome {
    let max = options.max_results;
    let claimed = AtomicUsize::new(0);
    let scanned = AtomicUsize::new(0);
    let sink: Mutex<Vec<(usize, Vec<SearchMatch>)>> = Mutex::new(Vec::new());

    files.par_iter().enumerate().for_each(|(index, path)| {
        if claimed.load(Ordering::Relaxed) >= max {
            return;
        }
        scanned.fetch_add(1, Ordering::Relaxed);
        let Some(bytes) = read_searchable_bytes(path, options.max_file_size) else {
            return;
        };
        let text = String::from_utf8_lossy(&bytes);

        let mut local = Vec::new();
        'scan: for (line_index, line) in split_lines(&text).enumerate() {
            for span in matcher.find(line) {
                let claim = claimed.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
                    (c < max).then_some(c + 1)
                });
                if claim.is_err() {
                    break 'scan;
                }
                local.push(SearchMatch {
                    file_path: path.clone(),
                    line_number: line_index as u64 + 1,
                    column: span.start,
                    line_content: line.to_string(),
                    match_text: span.text.to_string(),
                    match_length: span.text.len(),
                });
            }
        }
        if !local.is_empty() {
            sink.lock().push((index, local));
        }
    });

    let mut buckets = sink.into_inner();
    buckets.sort_unstable_by_key(|(index, _)| *index);
    let matches: Vec<SearchMatch> = buckets.into_iter().flat_map(|(_, m)| m).collect();
    ScanOutcome {
        truncated: max > 0 && matches.len() >= max,
        files_scanned: scanned.load(Ordering::Relaxed),
        matches,
    }
}

/// Filename mode reports at most one match per file, the leftmost, with
/// line 0 and column 0; the basename stands in for line content.
fn scan_filenames(files: &[PathBuf], matcher: &ContentMatcher, max: usize) -> ScanOutcome {
    let claimed = AtomicUsize::new(0);
    let scanned = AtomicUsize::new(0);
    let sink: Mutex<Vec<(usize, SearchMatch)>> = Mutex::new(Vec::new());

    files.par_iter().enumerate().for_each(|(index, path)| {
        if claimed.load(Ordering::Relaxed) >= max {
            return;
        }
        scanned.fetch_add(1, Ordering::Relaxed);
        let Some(name) = path.file_name() else {
            return;
        };
        let name = name.to_string_lossy().into_owned();
        let Some(span) = matcher.find(&name).next() else {
            return;
        };
        let match_text = span.text.to_string();
        let match_length = span.text.len();
        let claim = claimed.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
            (c < max).then_some(c + 1)
        });
        if claim.is_err() {
            return;
        }
        sink.lock().push((
            index,
            SearchMatch {
                file_path: path.clone(),
                line_number: 0,
                column: 0,
                line_content: name,
                match_text,
                match_length,
            },
        ));
    });

    let mut buckets = sink.into_inner();
    buckets.sort_unstable_by_key(|(index, _)| *index);
    let matches: Vec<SearchMatch> = buckets.into_iter().map(|(_, m)| m).collect();
    ScanOutcome {
        truncated: max > 0 && matches.len() >= max,
        files_scanned: scanned.load(Ordering::Relaxed),
        matches,
    }
}

/// Reads a file for scanning. `None` skips it: unreadable, over the size
/// cutoff, or binary. Skips are logged, never surfaced as errors.
fn read_searchable_bytes(path: &Path, max_file_size: u64) -> Option<Vec<u8>> {
    let meta = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "skipping unreadable file");
            return None;
        }
    };
    if meta.len() > max_file_size {
        return None;
    }
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "skipping unreadable file");
            return None;
        }
    };
    if is_binary(&bytes) {
        return None;
    }
    Some(bytes)
}

/// A NUL byte within the first read chunk marks a file as binary.
pub(crate) fn is_binary(bytes: &[u8]) -> bool {
    let sniff = &bytes[..bytes.len().min(BINARY_SNIFF_LEN)];
    memchr::memchr(0, sniff).is_some()
}

fn count_files_with_matches(matches: &[SearchMatch]) -> usize {
    let mut count = 0;
    let mut last: Option<&Path> = None;
    for m in matches {
        if last != Some(m.file_path.as_path()) {
            count += 1;
            last = Some(m.file_path.as_path());
        }
    }
    count
}
