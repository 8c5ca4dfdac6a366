//! Path safety for generated files.
//!
//! Two strengths of check:
//! 1. `check_relative_path` is syntactic and runs on raw plan paths before any write.
//! 2. `assert_safe` resolves a candidate against the canonical workspace root and
//!    requires the result to be a strict descendant; it runs at write time on the
//!    path the content generator actually returned.

use crate::error::ApiError;
use std::path::{Component, Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Normalize a raw candidate path string (NFC, no surrounding whitespace).
fn normalize_candidate(candidate: &str) -> String {
    candidate.trim().nfc().collect()
}

fn has_drive_prefix(candidate: &str) -> bool {
    let bytes = candidate.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Syntactic check: relative, non-empty, no `..` segment under either separator.
pub fn is_relative_path_safe(candidate: &str) -> bool {
    let normalized = normalize_candidate(candidate);
    if normalized.is_empty() || normalized.contains('\0') {
        return false;
    }
    if normalized.starts_with('/') || normalized.starts_with('\\') || has_drive_prefix(&normalized)
    {
        return false;
    }

    let path = Path::new(&normalized);
    if path.is_absolute() || path.has_root() {
        return false;
    }

    !normalized
        .split(['/', '\\'])
        .any(|segment| segment == "..")
}

/// Plan-validation form of the syntactic check.
pub fn check_relative_path(candidate: &str) -> Result<(), ApiError> {
    if is_relative_path_safe(candidate) {
        Ok(())
    } else {
        Err(ApiError::InvalidPath(candidate.to_string()))
    }
}

/// Canonical form of the workspace root. Falls back to a lexical absolute
/// path when the directory does not exist yet.
fn canonical_root(root: &Path) -> Result<PathBuf, ApiError> {
    match dunce::canonicalize(root) {
        Ok(path) => Ok(path),
        Err(_) => {
            let absolute = if root.is_absolute() {
                root.to_path_buf()
            } else {
                std::env::current_dir()
                    .map_err(|e| {
                        ApiError::WorkspaceError(format!("Failed to resolve current directory: {}", e))
                    })?
                    .join(root)
            };
            Ok(lexical_join(&PathBuf::new(), &absolute))
        }
    }
}

/// Join `candidate` onto `base`, resolving `.` and `..` without touching the
/// filesystem. Absolute components reset the result, as path resolution does.
fn lexical_join(base: &Path, candidate: &Path) -> PathBuf {
    let mut resolved = base.to_path_buf();
    for component in candidate.components() {
        match component {
            Component::Prefix(prefix) => resolved = PathBuf::from(prefix.as_os_str()),
            Component::RootDir => resolved.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(segment) => resolved.push(segment),
        }
    }
    resolved
}

/// Resolve `candidate` under `root`, returning the absolute target path when
/// it is a strict descendant of the root.
pub fn resolve_within(root: &Path, candidate: &str) -> Result<PathBuf, ApiError> {
    let normalized = normalize_candidate(candidate);
    if normalized.is_empty() || normalized.contains('\0') {
        return Err(ApiError::PathTraversal(candidate.to_string()));
    }

    let root = canonical_root(root)?;
    let resolved = lexical_join(&root, Path::new(&normalized));

    if resolved != root && resolved.starts_with(&root) {
        Ok(resolved)
    } else {
        Err(ApiError::PathTraversal(candidate.to_string()))
    }
}

pub fn is_safe(root: &Path, candidate: &str) -> bool {
    resolve_within(root, candidate).is_ok()
}

/// Strict form of `is_safe`; fails with `PathTraversal`.
pub fn assert_safe(root: &Path, candidate: &str) -> Result<PathBuf, ApiError> {
    resolve_within(root, candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn syntactic_check_accepts_nested_relative_paths() {
        assert!(is_relative_path_safe("src/app.ts"));
        assert!(is_relative_path_safe("./package.json"));
        assert!(is_relative_path_safe("src/routes/todo.routes.ts"));
        assert!(is_relative_path_safe("docs/..hidden/readme.md"));
    }

    #[test]
    fn syntactic_check_rejects_escapes() {
        assert!(!is_relative_path_safe("../etc/passwd"));
        assert!(!is_relative_path_safe("src/../../x"));
        assert!(!is_relative_path_safe("src\\..\\x"));
        assert!(!is_relative_path_safe("/etc/passwd"));
        assert!(!is_relative_path_safe("\\windows\\system32"));
        assert!(!is_relative_path_safe("C:\\temp\\x"));
        assert!(!is_relative_path_safe("   "));
    }

    #[test]
    fn check_relative_path_reports_invalid_path() {
        let err = check_relative_path("../secrets").unwrap_err();
        assert_eq!(err.code(), "INVALID_PATH");
    }

    #[test]
    fn resolved_check_keeps_paths_inside_root() {
        let temp = TempDir::new().unwrap();
        let resolved = assert_safe(temp.path(), "src/./app.ts").unwrap();
        let root = dunce::canonicalize(temp.path()).unwrap();
        assert_eq!(resolved, root.join("src").join("app.ts"));
    }

    #[test]
    fn resolved_check_allows_internal_parent_segments() {
        let temp = TempDir::new().unwrap();
        assert!(is_safe(temp.path(), "src/../package.json"));
    }

    #[test]
    fn resolved_check_rejects_escape_and_root_itself() {
        let temp = TempDir::new().unwrap();
        assert!(!is_safe(temp.path(), "../sibling.txt"));
        assert!(!is_safe(temp.path(), "src/../../sibling.txt"));
        assert!(!is_safe(temp.path(), "/etc/passwd"));
        assert!(!is_safe(temp.path(), "."));
        assert!(!is_safe(temp.path(), ""));
        let err = assert_safe(temp.path(), "../x").unwrap_err();
        assert_eq!(err.code(), "PATH_TRAVERSAL");
    }

    #[test]
    fn resolved_check_rejects_prefix_sibling_directories() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("workspace");
        std::fs::create_dir_all(&root).unwrap();
        // "workspace-evil" shares a string prefix with "workspace" but is not inside it.
        assert!(!is_safe(&root, "../workspace-evil/app.ts"));
    }

    #[test]
    fn resolved_check_works_before_root_exists() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("not-yet-created");
        assert!(is_safe(&root, "index.ts"));
        assert!(!is_safe(&root, "../index.ts"));
    }
}
