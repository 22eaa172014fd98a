//! Utility functions for text cleanup, logging and file system checks.
//!
//! - Whitespace cleanup for scraped cell text
//! - Capitalization used by the categorical fallback
//! - String truncation for log previews
//! - Output location validation before a long scrape starts

use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Collapse runs of whitespace (non-breaking spaces included) to one space and trim.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(clean_text("  Jean\u{a0}\n Dupont "), "Jean Dupont");
/// ```
pub fn clean_text(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Uppercase the first character and lowercase the rest.
///
/// ```ignore
/// assert_eq!(capitalize("radical LEFT"), "Radical left");
/// ```
pub fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().collect::<String>() + &c.as_str().to_lowercase(),
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut at a character boundary at or below `max` bytes, with
/// an ellipsis and the number of dropped bytes appended.
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

/// Ensure the directory that will hold `output_file` exists and is writable.
///
/// Creates the directory if needed, then writes and removes a probe file so a
/// permissions problem shows up before any fetching starts.
#[instrument(level = "info", skip_all, fields(path = %output_file.display()))]
pub async fn ensure_writable_parent(output_file: &Path) -> Result<(), Box<dyn Error>> {
    let dir = match output_file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };
    fs::create_dir_all(&dir).await?;
    let probe_path = dir.join("..__probe_write__");
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!(dir = %dir.display(), "Output directory is writable");
    Ok(())
}
