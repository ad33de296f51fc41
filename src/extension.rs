//! Locates the unpacked NopeCHA extension bundle on disk
//!
//! The extension lives at a fixed path beneath the executable's own
//! directory: `extension/nopecha-extensionC`. This is a hard contract
//! with no configuration override and no fallback location.

use std::path::{Path, PathBuf};

use crate::error::{SolveError, SolveResult};

/// Subdirectory (relative to the executable) holding the unpacked extension.
pub const EXTENSION_SUBDIR: &str = "extension/nopecha-extensionC";

/// Resolve the extension directory next to the running executable and
/// confirm it exists. Read-only check; fails fast when absent.
pub fn locate() -> SolveResult<PathBuf> {
    let exe = std::env::current_exe()
        .map_err(|e| SolveError::Unexpected(format!("cannot determine executable path: {e}")))?;
    let base = exe.parent().ok_or_else(|| {
        SolveError::Unexpected(format!("executable path has no parent: {}", exe.display()))
    })?;
    locate_in(base)
}

/// Existence check against an explicit base directory.
pub fn locate_in(base: &Path) -> SolveResult<PathBuf> {
    let path = base.join(EXTENSION_SUBDIR);
    if !path.is_dir() {
        return Err(SolveError::ExtensionNotFound(path));
    }
    // Chromium rejects relative --load-extension paths.
    path.canonicalize()
        .map_err(|e| SolveError::Unexpected(format!("cannot canonicalize {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_directory_is_reported_with_attempted_path() {
        let dir = tempfile::tempdir().unwrap();
        match locate_in(dir.path()) {
            Err(SolveError::ExtensionNotFound(path)) => {
                assert_eq!(path, dir.path().join(EXTENSION_SUBDIR));
            }
            other => panic!("expected ExtensionNotFound, got {other:?}"),
        }
    }

    #[test]
    fn present_directory_resolves_to_absolute_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(EXTENSION_SUBDIR)).unwrap();

        let resolved = locate_in(dir.path()).unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("nopecha-extensionC"));
        assert!(resolved.is_dir());
    }

    #[test]
    fn file_at_extension_path_does_not_count() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("extension")).unwrap();
        std::fs::write(dir.path().join(EXTENSION_SUBDIR), b"not a dir").unwrap();

        assert!(matches!(
            locate_in(dir.path()),
            Err(SolveError::ExtensionNotFound(_))
        ));
    }
}
