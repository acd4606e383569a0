use std::io;
use std::path::{Path, PathBuf};

/// Canonicalizes without the `\\?\` verbatim prefix Windows would otherwise
/// introduce; watch events and index keys must compare equal byte-for-byte.
#[cfg(windows)]
pub(crate) fn canonicalize(path: &Path) -> io::Result<PathBuf> {
    dunce::canonicalize(path)
}

#[cfg(not(windows))]
pub(crate) fn canonicalize(path: &Path) -> io::Result<PathBuf> {
    std::fs::canonicalize(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_resolves_relative_segments() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        let indirect = nested.join("..").join("b");
        let resolved = canonicalize(&indirect).unwrap();
        assert_eq!(resolved, canonicalize(&nested).unwrap());
    }
}
