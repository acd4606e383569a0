use crate::path_filter::PathFilter;
use ignore::WalkState;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Bounded-parallel traversal of one root, yielding regular file paths that
/// pass the filter. Symlinks are not followed. Each call walks from scratch;
/// a walk is never resumable mid-call.
pub struct FileTreeWalker {
    filter: PathFilter,
    threads: usize,
}

/// Outcome of one walk. `denied` counts entries skipped because they could
/// not be read; failures never abort the walk.
#[derive(Debug)]
pub struct WalkedFiles {
    pub files: Vec<PathBuf>,
    pub denied: usize,
}

impl FileTreeWalker {
    pub fn new(filter: PathFilter) -> Self {
        FileTreeWalker {
            filter,
            threads: default_thread_count(),
        }
    }

    pub fn with_threads(filter: PathFilter, threads: usize) -> Self {
        FileTreeWalker {
            filter,
            threads: threads.max(1),
        }
    }

    pub fn collect_files(&self) -> WalkedFiles {
        let files = Arc::new(Mutex::new(Vec::new()));
        let denied = Arc::new(AtomicUsize::new(0));

        let walker = self.filter.configure_walker(self.threads).build_parallel();
        walker.run(|| {
            let files = Arc::clone(&files);
            let denied = Arc::clone(&denied);
            Box::new(move |result| {
                match result {
                    Ok(entry) => {
                        if entry.file_type().is_some_and(|ft| ft.is_file()) {
                            files.lock().push(entry.into_path());
                        }
                    }
                    Err(err) => {
                        denied.fetch_add(1, Ordering::Relaxed);
                        warn!(error = %err, "skipping unreadable entry during walk");
                    }
                }
                WalkState::Continue
            })
        });

        let files = std::mem::take(&mut *files.lock());
        let denied = denied.load(Ordering::Relaxed);
        debug!(
            root = %self.filter.root().display(),
            count = files.len(),
            denied,
            "walk complete"
        );
        WalkedFiles { files, denied }
    }
}

pub(crate) fn default_thread_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn write(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    fn walk_relative(root: &Path, filter: PathFilter) -> Vec<String> {
        let walked = FileTreeWalker::new(filter).collect_files();
        let mut rel: Vec<String> = walked
            .files
            .iter()
            .map(|p| {
                pathdiff::diff_paths(p, root)
                    .unwrap()
                    .to_string_lossy()
                    .replace(std::path::MAIN_SEPARATOR, "/")
            })
            .collect();
        rel.sort();
        rel
    }

    #[test]
    fn finds_nested_and_hidden_files() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("a.txt"), "a");
        write(&dir.path().join("sub/deep/b.txt"), "b");
        write(&dir.path().join(".env"), "secret");

        let filter = PathFilter::compile(dir.path(), &[], &[], true);
        assert_eq!(
            walk_relative(dir.path(), filter),
            vec![".env", "a.txt", "sub/deep/b.txt"]
        );
    }

    #[test]
    fn prunes_vcs_metadata() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join(".git/config"), "[core]");
        write(&dir.path().join(".git/objects/aa/blob"), "x");
        write(&dir.path().join("src/lib.rs"), "pub fn x() {}");

        let filter = PathFilter::compile(dir.path(), &[], &[], true);
        assert_eq!(walk_relative(dir.path(), filter), vec!["src/lib.rs"]);
    }

    #[test]
    fn exclude_glob_prunes_directories() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("node_modules/dep/index.js"), "x");
        write(&dir.path().join("src/app.js"), "x");

        let filter = PathFilter::compile(dir.path(), &["node_modules".into()], &[], true);
        assert_eq!(walk_relative(dir.path(), filter), vec!["src/app.js"]);
    }

    #[test]
    fn include_globs_restrict_results() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("src/main.rs"), "x");
        write(&dir.path().join("src/notes.md"), "x");
        write(&dir.path().join("build.rs"), "x");

        let filter = PathFilter::compile(dir.path(), &[], &["*.rs".into()], true);
        assert_eq!(
            walk_relative(dir.path(), filter),
            vec!["build.rs", "src/main.rs"]
        );
    }

    #[test]
    fn gitignore_respected_only_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join(".gitignore"), "*.log\n");
        write(&dir.path().join("app.log"), "x");
        write(&dir.path().join("app.rs"), "x");

        let respecting = PathFilter::compile(dir.path(), &[], &[], true);
        assert_eq!(
            walk_relative(dir.path(), respecting),
            vec![".gitignore", "app.rs"]
        );

        let ignoring = PathFilter::compile(dir.path(), &[], &[], false);
        assert_eq!(
            walk_relative(dir.path(), ignoring),
            vec![".gitignore", "app.log", "app.rs"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("real/file.txt"), "x");
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("alias")).unwrap();

        let filter = PathFilter::compile(dir.path(), &[], &[], true);
        assert_eq!(walk_relative(dir.path(), filter), vec!["real/file.txt"]);
    }

    #[test]
    fn healthy_tree_reports_zero_denied() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("a.txt"), "a");

        let filter = PathFilter::compile(dir.path(), &[], &[], true);
        assert_eq!(FileTreeWalker::new(filter).collect_files().denied, 0);
    }
}
