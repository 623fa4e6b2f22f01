//! User path normalization: `~` expansion and absolute paths.

use std::path::{Component, Path, PathBuf};

/// Expands a leading `~` or `~/` to the user's home directory. Other forms
/// (`~user/...`) and paths without a tilde pass through unchanged.
pub fn expand_user(path: &str) -> PathBuf {
    let rest = if path == "~" {
        Some("")
    } else {
        path.strip_prefix("~/")
    };
    match (rest, dirs::home_dir()) {
        (Some(rest), Some(home)) if rest.is_empty() => home,
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Folds `.` and `..` components without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
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

pub fn absolute_path(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => return path.to_path_buf(),
        }
    };
    normalize_lexically(&joined)
}

pub fn normalize_user_path(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }
    absolute_path(&expand_user(path))
        .to_string_lossy()
        .into_owned()
}
