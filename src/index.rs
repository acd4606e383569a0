use crate::error::{Error, Result};
use crate::path_filter::PathFilter;
use crate::path_utils::canonicalize;
use crate::score::score_path;
use crate::types::{FileMeta, FsEvent, FsEventKind};
use crate::walker::FileTreeWalker;
use ahash::AHashMap;
use parking_lot::RwLock;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// In-memory file index for one workspace root.
///
/// A rebuild assembles the whole generation off to the side and installs it
/// with a single swap, so concurrent readers observe either the previous or
/// the new index, never a mix. Incremental patches from watch events edit
/// single entries under the write lock. The index is a name-lookup cache
/// only; content search never consults it.
pub struct WorkspaceIndex {
    state: RwLock<Option<IndexedRoot>>,
}

struct IndexedRoot {
    root: PathBuf,
    filter: PathFilter,
    files: AHashMap<PathBuf, FileMeta>,
}

/// A fuzzy result with the score that ranked it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredFile {
    pub file: FileMeta,
    pub score: i32,
}

impl Default for WorkspaceIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkspaceIndex {
    pub fn new() -> Self {
        WorkspaceIndex {
            state: RwLock::new(None),
        }
    }

    /// One full walk of `root` under default ignore rules plus
    /// `exclude_globs`, replacing any previous generation. Returns the
    /// number of indexed files.
    pub fn index_workspace(&self, root: &Path, exclude_globs: &[String]) -> Result<usize> {
        let started = Instant::now();
        let root = canonicalize(root).map_err(|_| Error::NotFound(root.to_path_buf()))?;
        if !root.is_dir() {
            return Err(Error::NotFound(root));
        }

        let filter = PathFilter::compile(&root, exclude_globs, &[], true);
        let walked = FileTreeWalker::new(filter.clone()).collect_files();
        let entries: Vec<(PathBuf, FileMeta)> = walked
            .files
            .par_iter()
            .filter_map(|path| {
                let meta = std::fs::metadata(path).ok()?;
                let file_meta = FileMeta::new(path, &root, &meta)?;
                Some((path.clone(), file_meta))
            })
            .collect();
        let count = entries.len();
        let files: AHashMap<PathBuf, FileMeta> = entries.into_iter().collect();

        *self.state.write() = Some(IndexedRoot {
            root: root.clone(),
            filter,
            files,
        });
        info!(
            root = %root.display(),
            count,
            denied = walked.denied,
            duration_ms = started.elapsed().as_millis() as u64,
            "workspace indexed"
        );
        Ok(count)
    }

    /// O(1) lookup by absolute path. Absent paths are not a fault.
    pub fn get_file_info(&self, path: &Path) -> Option<FileMeta> {
        self.state.read().as_ref()?.files.get(path).cloned()
    }

    /// Top `max_results` files for `query`, best score first. An empty query
    /// lists the most recently modified files instead, the way an editor
    /// fills an empty finder prompt.
    pub fn fuzzy_find(&self, query: &str, max_results: usize) -> Vec<FileMeta> {
        self.fuzzy_find_scored(query, max_results)
            .into_iter()
            .map(|scored| scored.file)
            .collect()
    }

    /// `fuzzy_find` with the ranking score attached. Ties break by shorter
    /// relative path, then lexicographic order; `DEFAULT_FUZZY_RESULTS` is
    /// the conventional cap.
    pub fn fuzzy_find_scored(&self, query: &str, max_results: usize) -> Vec<ScoredFile> {
        let guard = self.state.read();
        let Some(state) = guard.as_ref() else {
            return Vec::new();
        };
        if max_results == 0 {
            return Vec::new();
        }

        if query.is_empty() {
            let mut recent: Vec<&FileMeta> = state.files.values().collect();
            recent.sort_unstable_by(|a, b| {
                b.modified_ms
                    .cmp(&a.modified_ms)
                    .then_with(|| a.relative_path.cmp(&b.relative_path))
            });
            return recent
                .into_iter()
                .take(max_results)
                .map(|file| ScoredFile {
                    file: file.clone(),
                    score: 0,
                })
                .collect();
        }

        let candidates: Vec<&FileMeta> = state.files.values().collect();
        let mut scored: Vec<(i32, &FileMeta)> = candidates
            .par_iter()
            .filter_map(|meta| score_path(query, &meta.relative_path).map(|score| (score, *meta)))
            .collect();
        scored.sort_unstable_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| a.1.relative_path.len().cmp(&b.1.relative_path.len()))
                .then_with(|| a.1.relative_path.cmp(&b.1.relative_path))
        });
        scored.truncate(max_results);
        scored
            .into_iter()
            .map(|(score, file)| ScoredFile {
                file: file.clone(),
                score,
            })
            .collect()
    }

    pub fn indexed_count(&self) -> usize {
        self.state.read().as_ref().map_or(0, |s| s.files.len())
    }

    pub fn is_empty(&self) -> bool {
        self.indexed_count() == 0
    }

    /// Drops the current generation. The next `index_workspace` starts fresh.
    pub fn clear(&self) {
        *self.state.write() = None;
    }

    /// Extension histogram of the current generation, most common first.
    pub fn extension_stats(&self) -> Vec<(String, usize)> {
        let guard = self.state.read();
        let Some(state) = guard.as_ref() else {
            return Vec::new();
        };
        let mut counts: AHashMap<&str, usize> = AHashMap::new();
        for meta in state.files.values() {
            *counts.entry(meta.extension.as_str()).or_default() += 1;
        }
        let mut stats: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(ext, n)| (ext.to_string(), n))
            .collect();
        stats.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        stats
    }

    /// Patches the current generation with one debounced watch event.
    /// Creates, modifications, and renames upsert while the path still
    /// exists and passes the root's filter; anything vanished is removed,
    /// including whole subtrees when a directory goes away. Events outside
    /// the indexed root, or arriving before any index was built, are
    /// ignored.
    pub fn apply_event(&self, event: &FsEvent) {
        let mut guard = self.state.write();
        let Some(state) = guard.as_mut() else {
            return;
        };
        if !event.path.starts_with(&state.root) {
            return;
        }

        match event.kind {
            FsEventKind::Delete => remove_path(state, &event.path),
            FsEventKind::Create | FsEventKind::Modify | FsEventKind::Rename => {
                match std::fs::metadata(&event.path) {
                    Ok(meta) if meta.is_file() => {
                        if state.filter.is_excluded(&event.path, false) {
                            return;
                        }
                        if let Some(file_meta) = FileMeta::new(&event.path, &state.root, &meta) {
                            debug!(path = %event.path.display(), "index entry upserted");
                            state.files.insert(event.path.clone(), file_meta);
                        }
                    }
                    // Directory contents arrive as their own events.
                    Ok(_) => {}
                    Err(_) => remove_path(state, &event.path),
                }
            }
        }
    }
}

fn remove_path(state: &mut IndexedRoot, path: &Path) {
    if state.files.remove(path).is_some() {
        debug!(path = %path.display(), "index entry removed");
        return;
    }
    let before = state.files.len();
    state.files.retain(|p, _| !p.starts_with(path));
    let removed = before - state.files.len();
    if removed > 0 {
        debug!(path = %path.display(), removed, "index subtree removed");
    }
}
