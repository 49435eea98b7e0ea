//! Share path construction and validation.
//!
//! Paths inside a share are `/`-rooted strings. Directory paths always end in
//! a separator so that a child path is a plain concatenation of the parent
//! and the child's name: `"/" + "foo" == "/foo"`, `"/foo/" + "bar" == "/foo/bar"`.

use crate::error::{ErrorKind, Result};

/// Path of the root directory of every scope.
pub const ROOT: &str = "/";
pub const SEPARATOR: char = '/';

/// Absolute path of a child entry inside `parent`.
///
/// `parent` is expected to be a directory path (trailing separator); one is
/// inserted if missing so that callers can never produce `"/foobar"` from
/// `"/foo"` and `"bar"`.
pub fn child(parent: &str, name: &str) -> String {
    let mut path = String::with_capacity(parent.len() + name.len() + 1);
    path.push_str(parent);
    if !path.ends_with(SEPARATOR) {
        path.push(SEPARATOR);
    }
    path.push_str(name);
    path
}

/// The directory form (trailing separator) of an entry path.
pub fn as_directory(path: &str) -> String {
    match path.ends_with(SEPARATOR) {
        true => path.to_string(),
        false => format!("{path}{SEPARATOR}"),
    }
}

/// Validates a single entry name, as listed by a backend or requested as a
/// search target.
///
/// Rejects empty names, the relative markers `.` and `..`, and anything
/// containing a separator or a null byte.
pub fn validate_name(name: &str) -> Result<&str> {
    if name.is_empty() || name == "." || name == ".." || name.contains(SEPARATOR) || name.contains('\0') {
        exn::bail!(ErrorKind::InvalidPath(name.to_string()));
    }
    Ok(name)
}

/// Validates and normalizes a directory path inside a share.
///
/// The result is `/`-rooted, has no empty, `.` or `..` segments, and ends in
/// a separator. Parent references are resolved but may never leave the root.
///
/// ```
/// use sharefind_storage::path::validate_directory;
/// assert_eq!(validate_directory("/").unwrap(), "/");
/// assert_eq!(validate_directory("/a//b/./c").unwrap(), "/a/b/c/");
/// assert_eq!(validate_directory("/a/b/../c/").unwrap(), "/a/c/");
/// assert!(validate_directory("a/b").is_err());
/// assert!(validate_directory("/../etc").is_err());
/// ```
pub fn validate_directory(path: &str) -> Result<String> {
    if !path.starts_with(SEPARATOR) || path.contains('\0') {
        exn::bail!(ErrorKind::InvalidPath(path.to_string()));
    }
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(SEPARATOR) {
        match segment {
            "" | "." => {},
            ".." => {
                if segments.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(path.to_string()));
                }
            },
            name => segments.push(name),
        }
    }
    let mut normalized = String::from(ROOT);
    for segment in segments {
        normalized.push_str(segment);
        normalized.push(SEPARATOR);
    }
    Ok(normalized)
}

/// Path relative to the share root, for joining onto a local base directory.
pub fn relative(directory: &str) -> &str {
    directory.trim_start_matches(SEPARATOR)
}
