//! Utility functions for log formatting, text cleanup and file system checks.

use once_cell::sync::Lazy;
use regex::Regex;
use std::io;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a character boundary) with
/// an ellipsis and the number of dropped bytes appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Collapse every run of whitespace to a single space and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s, " ").trim().to_string()
}

/// Create `dir` if needed and confirm a file can be written there.
///
/// Runs before any network work so an unwritable output location fails the
/// run up front instead of after every article has been summarized.
///
/// # Errors
///
/// The I/O error from creating the directory or the marker file.
#[instrument(level = "info", skip_all, fields(dir = %dir.display()))]
pub async fn ensure_writable_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir).await?;
    let marker = dir.join(format!(".{}-write-check", env!("CARGO_PKG_NAME")));
    fs::write(&marker, b"").await?;
    fs::remove_file(&marker).await?;
    info!("Output directory is writable");
    Ok(())
}
