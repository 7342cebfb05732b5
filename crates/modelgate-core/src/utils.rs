//! Utility helpers — data directory, credential cleanup, display truncation.

use std::path::PathBuf;

/// Get the Modelgate data directory (e.g. `~/.modelgate/`).
pub fn get_data_path() -> PathBuf {
    let home = home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".modelgate")
}

/// An API key with surrounding whitespace removed, or `None` when nothing is left.
///
/// Keys pasted into config files and env vars often carry a trailing newline,
/// which would otherwise end up inside the `Authorization` header.
pub fn clean_api_key(raw: &str) -> Option<&str> {
    let key = raw.trim();
    (!key.is_empty()).then_some(key)
}

/// Truncate a string to `max_len` characters, adding "..." if truncated.
/// Counts chars, not bytes, so model names and error bodies in any script are
/// cut on a character boundary.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| std::env::var("USERPROFILE").ok().map(PathBuf::from))
}
