//! Helpers for absolute `/`-separated store paths.

use crate::{StoreError, StoreResult};

/// Checks that `path` is absolute, has no empty, `.` or `..` segments and no trailing slash.
///
/// The root `/` itself is valid.
pub fn validate(path: &str) -> StoreResult<()> {
    if path == "/" {
        return Ok(());
    }
    let Some(rest) = path.strip_prefix('/') else {
        return Err(StoreError::InvalidPath(format!("not absolute: {path}")));
    };
    for segment in rest.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(StoreError::InvalidPath(format!("bad segment in {path}")));
        }
        if segment.chars().any(char::is_control) {
            return Err(StoreError::InvalidPath(format!("control character in {path}")));
        }
    }
    Ok(())
}

/// Appends `child` to `parent` with exactly one separator between them.
pub fn join(parent: &str, child: &str) -> String {
    let parent = parent.trim_end_matches('/');
    let child = child.trim_start_matches('/');
    format!("{parent}/{child}")
}

/// Returns the parent of `path`, or `None` for the root.
pub fn parent(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Returns the last segment of `path`.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Returns true if `path` equals `ancestor` or lies underneath it.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    if ancestor == "/" {
        return path.starts_with('/');
    }
    path == ancestor
        || path
            .strip_prefix(ancestor)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_nested_paths() {
        assert!(validate("/").is_ok());
        assert!(validate("/forms/branch12/a.jpg").is_ok());
    }

    #[test]
    fn test_validate_rejects_malformed_paths() {
        for bad in ["forms", "/forms/", "//forms", "/forms/../x", "/forms/./x", ""] {
            assert!(
                matches!(validate(bad), Err(StoreError::InvalidPath(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_join_normalises_separators() {
        assert_eq!(join("/forms", "a.jpg"), "/forms/a.jpg");
        assert_eq!(join("/forms/", "/a.jpg"), "/forms/a.jpg");
    }

    #[test]
    fn test_parent_and_file_name() {
        assert_eq!(parent("/forms/branch12"), Some("/forms"));
        assert_eq!(parent("/forms"), Some("/"));
        assert_eq!(parent("/"), None);
        assert_eq!(file_name("/forms/branch12/report.html"), "report.html");
    }

    #[test]
    fn test_is_within_respects_segment_boundaries() {
        assert!(is_within("/forms/branch12/a.jpg", "/forms/branch12"));
        assert!(is_within("/forms/branch12", "/forms/branch12"));
        assert!(!is_within("/forms/branch12_ver1", "/forms/branch12"));
    }
}
