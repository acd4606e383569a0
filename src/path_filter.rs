use ignore::gitignore::Gitignore;
use ignore::overrides::{Override, OverrideBuilder};
use ignore::{Match, WalkBuilder};
use std::path::{Component, Path, PathBuf};
use tracing::warn;

/// Directories never traversed or indexed, regardless of ignore settings.
pub(crate) const VCS_DIRS: [&str; 3] = [".git", ".hg", ".svn"];

/// Compiled path predicate for one root: include/exclude globs plus layered
/// ignore-file rules.
///
/// Globs use gitignore syntax: `*`, `**`, `?`, bracket classes; unanchored
/// patterns match at any depth, a leading `/` anchors to the root. Include
/// globs restrict the candidate set and, per `ignore` override semantics,
/// take precedence over ignore-file rules for paths they match. An invalid
/// glob is skipped with a warning; it never fails compilation.
#[derive(Debug, Clone)]
pub struct PathFilter {
    root: PathBuf,
    overrides: Override,
    respect_gitignore: bool,
}

impl PathFilter {
    pub fn compile(
        root: &Path,
        exclude_globs: &[String],
        include_globs: &[String],
        respect_gitignore: bool,
    ) -> Self {
        let mut builder = OverrideBuilder::new(root);
        for glob in include_globs {
            if let Err(err) = builder.add(glob) {
                warn!(glob = %glob, error = %err, "skipping invalid include glob");
            }
        }
        for glob in exclude_globs {
            if let Err(err) = builder.add(&format!("!{glob}")) {
                warn!(glob = %glob, error = %err, "skipping invalid exclude glob");
            }
        }
        let overrides = builder.build().unwrap_or_else(|err| {
            warn!(error = %err, "glob overrides failed to build, ignoring them");
            Override::empty()
        });

        PathFilter {
            root: root.to_path_buf(),
            overrides,
            respect_gitignore,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Standalone predicate for paths arriving outside a walk (watch events,
    /// index patches). Mirrors walker precedence: VCS metadata first, then
    /// glob overrides (an excluded ancestor directory prunes everything under
    /// it, just as the walker skips descending into it), then the ignore-file
    /// chain. Paths outside the root are never excluded here.
    ///
    /// Ignore files are re-read on every call so the answer tracks edits to
    /// them; callers invoke this on debounced events, not raw churn.
    pub fn is_excluded(&self, path: &Path, is_dir: bool) -> bool {
        if !path.starts_with(&self.root) {
            return false;
        }
        if self.crosses_vcs_dir(path) {
            return true;
        }
        let mut dir = path.parent();
        while let Some(d) = dir {
            if !d.starts_with(&self.root) || d == self.root {
                break;
            }
            if matches!(self.overrides.matched(d, true), Match::Ignore(_)) {
                return true;
            }
            dir = d.parent();
        }
        match self.overrides.matched(path, is_dir) {
            Match::Ignore(_) => return true,
            Match::Whitelist(_) => return false,
            Match::None => {}
        }
        self.respect_gitignore && self.matched_by_ignore_chain(path, is_dir)
    }

    /// Consults `.ignore` and `.gitignore` files from the candidate's
    /// directory up to the root; the first definitive answer wins, so closer
    /// files take precedence and `!` patterns re-include.
    fn matched_by_ignore_chain(&self, path: &Path, is_dir: bool) -> bool {
        let mut dir = path.parent();
        while let Some(d) = dir {
            if !d.starts_with(&self.root) {
                break;
            }
            for name in [".ignore", ".gitignore"] {
                let file = d.join(name);
                if !file.is_file() {
                    continue;
                }
                let (rules, _) = Gitignore::new(&file);
                match rules.matched_path_or_any_parents(path, is_dir) {
                    Match::Ignore(_) => return true,
                    Match::Whitelist(_) => return false,
                    Match::None => {}
                }
            }
            if d == self.root {
                break;
            }
            dir = d.parent();
        }
        false
    }

    fn crosses_vcs_dir(&self, path: &Path) -> bool {
        let Ok(rel) = path.strip_prefix(&self.root) else {
            return false;
        };
        rel.components().any(|c| match c {
            Component::Normal(name) => {
                matches!(name.to_str(), Some(s) if VCS_DIRS.contains(&s))
            }
            _ => false,
        })
    }

    /// Walker wired with this filter's rules. Ignore files are resolved from
    /// the root downward only, and `.gitignore` applies whether or not the
    /// tree is an actual git repository.
    pub(crate) fn configure_walker(&self, threads: usize) -> WalkBuilder {
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(false)
            .follow_links(false)
            .parents(false)
            .require_git(false)
            .git_global(false)
            .git_ignore(self.respect_gitignore)
            .git_exclude(self.respect_gitignore)
            .ignore(self.respect_gitignore)
            .threads(threads)
            .overrides(self.overrides.clone())
            .filter_entry(|entry| !is_vcs_metadata(entry));
        builder
    }
}

fn is_vcs_metadata(entry: &ignore::DirEntry) -> bool {
    entry.file_type().is_some_and(|ft| ft.is_dir())
        && matches!(entry.file_name().to_str(), Some(name) if VCS_DIRS.contains(&name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn exclude_glob_marks_directories_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let filter = PathFilter::compile(dir.path(), &["node_modules".into()], &[], true);
        assert!(filter.is_excluded(&dir.path().join("node_modules"), true));
        assert!(filter.is_excluded(&dir.path().join("node_modules/dep/index.js"), false));
        assert!(!filter.is_excluded(&dir.path().join("src/main.rs"), false));
    }

    #[test]
    fn include_globs_restrict_files_but_not_directories() {
        let dir = tempfile::tempdir().unwrap();
        let filter = PathFilter::compile(dir.path(), &[], &["*.rs".into()], true);
        assert!(!filter.is_excluded(&dir.path().join("src/main.rs"), false));
        assert!(filter.is_excluded(&dir.path().join("readme.md"), false));
        // Directories stay traversable so nested includes can be reached.
        assert!(!filter.is_excluded(&dir.path().join("src"), true));
    }

    #[test]
    fn gitignore_chain_closer_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join(".gitignore"), "*.log\n");
        write(&dir.path().join("sub/.gitignore"), "!keep.log\n");
        fs::create_dir_all(dir.path().join("sub")).unwrap();

        let filter = PathFilter::compile(dir.path(), &[], &[], true);
        assert!(filter.is_excluded(&dir.path().join("noise.log"), false));
        assert!(filter.is_excluded(&dir.path().join("sub/noise.log"), false));
        assert!(!filter.is_excluded(&dir.path().join("sub/keep.log"), false));
    }

    #[test]
    fn gitignore_respected_flag_disables_chain() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join(".gitignore"), "*.log\n");

        let on = PathFilter::compile(dir.path(), &[], &[], true);
        let off = PathFilter::compile(dir.path(), &[], &[], false);
        assert!(on.is_excluded(&dir.path().join("noise.log"), false));
        assert!(!off.is_excluded(&dir.path().join("noise.log"), false));
    }

    #[test]
    fn files_under_ignored_directory_are_excluded() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join(".gitignore"), "target/\n");
        fs::create_dir_all(dir.path().join("target/debug")).unwrap();

        let filter = PathFilter::compile(dir.path(), &[], &[], true);
        assert!(filter.is_excluded(&dir.path().join("target/debug/app"), false));
    }

    #[test]
    fn leading_slash_anchors_to_ignore_file_directory() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join(".gitignore"), "/top.txt\n");

        let filter = PathFilter::compile(dir.path(), &[], &[], true);
        assert!(filter.is_excluded(&dir.path().join("top.txt"), false));
        assert!(!filter.is_excluded(&dir.path().join("sub/top.txt"), false));
    }

    #[test]
    fn vcs_metadata_always_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let filter = PathFilter::compile(dir.path(), &[], &[], false);
        assert!(filter.is_excluded(&dir.path().join(".git"), true));
        assert!(filter.is_excluded(&dir.path().join(".git/config"), false));
        assert!(filter.is_excluded(&dir.path().join(".hg/store"), false));
        assert!(!filter.is_excluded(&dir.path().join(".github/workflows/ci.yml"), false));
    }

    #[test]
    fn paths_outside_root_are_not_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let filter = PathFilter::compile(dir.path(), &["**".into()], &[], true);
        assert!(!filter.is_excluded(Path::new("/elsewhere/file.txt"), false));
    }

    #[test]
    fn invalid_glob_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let filter = PathFilter::compile(dir.path(), &["[".into(), "*.log".into()], &[], true);
        assert!(filter.is_excluded(&dir.path().join("noise.log"), false));
        assert!(!filter.is_excluded(&dir.path().join("main.rs"), false));
    }
}
