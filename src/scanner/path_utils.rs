//! Path normalization and root-relative display helpers.
//!
//! # Background
//!
//! macOS uses NFD (Decomposed) normalization for file paths, while Windows
//! and Linux typically use NFC (Composed) normalization. The same visual
//! filename can therefore have different byte representations:
//!
//! - NFC: `café.txt` - 'é' is U+00E9 (single code point)
//! - NFD: `café.txt` - 'e' U+0065 + combining acute accent U+0301
//!
//! File entities are keyed by their canonical path, so every path entering
//! the crate (from the walker, a scan log or a snapshot) goes through
//! [`canonical`] first.
//!
//! # Example
//!
//! ```
//! use dupesieve::scanner::path_utils::{dotted_extension, normalize_path_str};
//! use std::path::Path;
//!
//! assert_eq!(normalize_path_str("cafe\u{0301}.txt"), "café.txt");
//! assert_eq!(dotted_extension(Path::new("Photo.JPG")), ".jpg");
//! ```

use std::path::{Component, Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Normalize a path string to NFC (Composed) form.
#[must_use]
pub fn normalize_path_str(s: &str) -> String {
    s.nfc().collect()
}

/// Normalize a [`Path`] to NFC form.
///
/// If the path contains invalid UTF-8, returns the original path unchanged.
#[must_use]
pub fn normalize_pathbuf(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(normalize_path_str(s)),
        None => path.to_path_buf(),
    }
}

/// Canonical identity of a path.
///
/// Existing paths are resolved through the filesystem (symlinks, `..`).
/// Paths that no longer exist, such as stale snapshot rows, fall back to a
/// lexically cleaned absolute path so they still compare consistently.
#[must_use]
pub fn canonical(path: &Path) -> PathBuf {
    let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| {
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        lexical_clean(&absolute)
    });
    normalize_pathbuf(&resolved)
}

/// Remove `.` and `..` components without touching the filesystem.
#[must_use]
pub fn lexical_clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Lowercase extension with its leading dot, or an empty string.
#[must_use]
pub fn dotted_extension(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Normalize a user-supplied extension to `.ext` lowercase form.
#[must_use]
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.is_empty() || ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

/// Check whether `path` lies at or below `base` (component-wise).
#[must_use]
pub fn is_under(path: &Path, base: &Path) -> bool {
    path.starts_with(base)
}

/// Path relative to the longest matching root, or the full path when no root
/// contains it. Display only; never used for identity.
#[must_use]
pub fn short_path(path: &Path, roots: &[PathBuf]) -> PathBuf {
    roots
        .iter()
        .filter(|root| is_under(path, root))
        .max_by_key(|root| root.components().count())
        .and_then(|root| path.strip_prefix(root).ok())
        .filter(|rel| !rel.as_os_str().is_empty())
        .map_or_else(|| path.to_path_buf(), Path::to_path_buf)
}

/// Quote a path for inclusion in a shell command line.
#[must_use]
pub fn shell_quote(path: &Path) -> String {
    let s = path.to_string_lossy();
    if cfg!(windows) {
        format!("\"{}\"", s.replace('"', "\\\""))
    } else {
        format!("'{}'", s.replace('\'', "'\\''"))
    }
}
