//! Path normalization and containment checks
//!
//! This module provides:
//! - `normalize_relative_path`: canonical `/`-separated relative paths
//! - `resolve_inside_root`: root-contained resolution with symlink rejection
//!
//! Every caller-supplied path crosses this module before touching the
//! filesystem. Violations map to the flat error codes directly:
//! absolute/traversal syntax is `invalid_path`, symlinks are `forbidden`,
//! and a resolved path escaping its root is `out_of_scope`.

use manualfind_core::{ensure, Result, ToolError};
use std::path::{Component, Path, PathBuf};

// ============================================================================
// Normalization
// ============================================================================

/// Normalize a caller-supplied relative path
///
/// Backslashes become `/`, empty and `.` segments are removed. Absolute
/// paths, Windows drive prefixes, and `..` segments are rejected with
/// `invalid_path`.
pub fn normalize_relative_path(path: &str) -> Result<String> {
    ensure(
        !path.trim().is_empty(),
        ToolError::invalid_path("path is required"),
    )?;

    let canonical = path.replace('\\', "/");
    let canonical = canonical.trim();
    ensure(
        !canonical.starts_with('/'),
        ToolError::invalid_path("absolute path is not allowed"),
    )?;
    ensure(
        !has_windows_drive(canonical),
        ToolError::invalid_path("absolute path is not allowed"),
    )?;

    let mut parts: Vec<&str> = Vec::new();
    for part in canonical.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        ensure(
            part != "..",
            ToolError::invalid_path("parent traversal is not allowed"),
        )?;
        parts.push(part);
    }
    ensure(
        !parts.is_empty(),
        ToolError::invalid_path("path is empty after normalization"),
    )?;
    Ok(parts.join("/"))
}

fn has_windows_drive(path: &str) -> bool {
    let mut chars = path.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(c), Some(':')) if c.is_ascii_alphabetic()
    )
}

// ============================================================================
// Containment
// ============================================================================

fn comparison_parts(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().to_lowercase()),
            Component::RootDir => Some(String::from("/")),
            Component::Prefix(prefix) => Some(prefix.as_os_str().to_string_lossy().to_lowercase()),
            _ => None,
        })
        .collect()
}

fn is_subpath_casefold(path: &Path, root: &Path) -> bool {
    let p_parts = comparison_parts(path);
    let r_parts = comparison_parts(root);
    if r_parts.is_empty() || p_parts.len() < r_parts.len() {
        return false;
    }
    p_parts[..r_parts.len()] == r_parts[..]
}

fn reject_symlink_parts(root: &Path, relative: &str) -> Result<()> {
    let mut current = root.to_path_buf();
    for part in relative.split('/') {
        current.push(part);
        if current.is_symlink() {
            return Err(ToolError::forbidden("symlink access is not allowed")
                .with_details(serde_json::json!({"path": current.display().to_string()})));
        }
    }
    Ok(())
}

/// Resolve `relative` inside `root`, refusing escapes
///
/// With `must_exist` the target must already exist (`not_found` otherwise);
/// without it the non-existing leaf is kept while parent boundaries are
/// still resolved. The final path must stay under the resolved root
/// (casefolded comparison) or the call fails with `out_of_scope`.
pub fn resolve_inside_root(root: &Path, relative: &str, must_exist: bool) -> Result<PathBuf> {
    let normalized = normalize_relative_path(relative)?;
    let root_real = root
        .canonicalize()
        .map_err(|_| ToolError::not_found("root not found"))?;
    let candidate = root.join(&normalized);
    reject_symlink_parts(root, &normalized)?;

    let resolved = if must_exist {
        if !candidate.exists() {
            return Err(ToolError::not_found("target not found")
                .with_details(serde_json::json!({"path": normalized})));
        }
        candidate
            .canonicalize()
            .map_err(|_| ToolError::not_found("target not found"))?
    } else {
        let parent = candidate.parent().unwrap_or(&root_real);
        let parent_resolved = parent
            .canonicalize()
            .map_err(|_| ToolError::not_found("target not found"))?;
        match candidate.file_name() {
            Some(name) => parent_resolved.join(name),
            None => parent_resolved,
        }
    };

    if !is_subpath_casefold(&resolved, &root_real) {
        return Err(ToolError::out_of_scope("path is out of scope")
            .with_details(serde_json::json!({"path": normalized})));
    }
    Ok(resolved)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use manualfind_core::ErrorCode;
    use std::fs;

    #[test]
    fn test_normalize_basic() {
        assert_eq!(normalize_relative_path("a/b/c.md").unwrap(), "a/b/c.md");
        assert_eq!(normalize_relative_path("a\\b\\c.md").unwrap(), "a/b/c.md");
        assert_eq!(normalize_relative_path("./a//b/./c.md").unwrap(), "a/b/c.md");
    }

    #[test]
    fn test_normalize_rejects_absolute() {
        let err = normalize_relative_path("/etc/passwd").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidPath);
        let err = normalize_relative_path("C:/windows").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidPath);
    }

    #[test]
    fn test_normalize_rejects_traversal() {
        let err = normalize_relative_path("a/../b").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidPath);
        let err = normalize_relative_path("..").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidPath);
    }

    #[test]
    fn test_normalize_rejects_empty() {
        assert_eq!(
            normalize_relative_path("").unwrap_err().code,
            ErrorCode::InvalidPath
        );
        assert_eq!(
            normalize_relative_path("./.").unwrap_err().code,
            ErrorCode::InvalidPath
        );
    }

    #[test]
    fn test_resolve_inside_root_existing() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/file.md"), "# hi\n").unwrap();

        let resolved = resolve_inside_root(dir.path(), "sub/file.md", true).unwrap();
        assert!(resolved.ends_with("file.md"));
    }

    #[test]
    fn test_resolve_inside_root_missing_target() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_inside_root(dir.path(), "missing.md", true).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn test_resolve_inside_root_non_existing_leaf_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_inside_root(dir.path(), "new.md", false).unwrap();
        assert!(resolved.ends_with("new.md"));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_rejects_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.md"), "secret").unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret.md"), dir.path().join("link.md"))
            .unwrap();

        let err = resolve_inside_root(dir.path(), "link.md", true).unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);
    }
}
