//! Logical path handling.
//!
//! Every metadata document addressed by path is keyed on the *cleaned* form
//! of that path, so `"/a/../b"`, `"b"` and `"/b/"` all name the same document.

use crate::error::PathError;

/// Maximum length of a single path component, in bytes.
pub const MAX_NAME_LEN: usize = 255;

/// Normalize a logical path: absolute, no empty or `.` components, `..`
/// resolved lexically (never escaping the root), no trailing slash.
pub fn clean_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Parent of a cleaned path. The root is its own parent.
pub fn parent(path: &str) -> String {
    let path = clean_path(path);
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

/// Last component of a cleaned path (empty for the root).
pub fn basename(path: &str) -> String {
    let path = clean_path(path);
    path.rsplit('/').next().unwrap_or_default().to_string()
}

/// Whether `child` sits directly inside `dir`.
pub fn is_direct_child(dir: &str, child: &str) -> bool {
    let child = clean_path(child);
    child != "/" && parent(&child) == clean_path(dir)
}

/// Validate a single file or folder name.
pub fn validate_filename(name: &str) -> Result<(), PathError> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(PathError::InvalidLength {
            item: name.to_string(),
            max: MAX_NAME_LEN,
            actual: name.len(),
        });
    }
    if name.contains('/') || name.contains('\0') {
        return Err(PathError::IllegalCharacter {
            item: name.to_string(),
        });
    }
    Ok(())
}

/// Validate every component of an already-cleaned directory path.
pub fn validate_directory_path(path: &str) -> Result<(), PathError> {
    if path == "/" {
        return Ok(());
    }
    for dir in path.split('/').skip(1) {
        validate_filename(dir)?;
    }
    Ok(())
}
