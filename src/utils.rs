//! Utility functions for log formatting, artifact naming and local file handling.

use chrono::NaiveDate;
use std::error::Error;
use std::fs as stdfs;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument, warn};

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes on a character boundary, with
/// an ellipsis and a count of the dropped bytes appended.
///
/// # Arguments
///
/// * `s` - The string to potentially truncate
/// * `max` - Maximum number of bytes to keep
///
/// # Returns
///
/// The original string if it fits, otherwise the cut string with
/// `"…(+N bytes)"` appended.
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

/// File name of the artifact downloaded on `date`: `respekt_YYYY-MM-DD.epub`.
pub fn artifact_file_name(date: NaiveDate) -> String {
    format!("respekt_{}.epub", date.format("%Y-%m-%d"))
}

/// Full artifact path inside `dir`.
pub fn artifact_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(artifact_file_name(date))
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then writes and removes a probe file.
///
/// # Arguments
///
/// * `path` - Directory to check
///
/// # Returns
///
/// `Ok(())` if the directory can be written to, otherwise the I/O error.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join("..__probe_write__");
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

/// Delete a delivered artifact. Failures are logged, never returned.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn remove_artifact(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => info!("Local artifact removed"),
        Err(e) => warn!(error = %e, "Could not remove local artifact"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        // "Přihlásit" has two-byte characters at byte offsets 1 and 6
        let result = truncate_for_log("Přihlásit", 2);
        assert_eq!(result, "P…(+10 bytes)");
    }

    #[test]
    fn test_artifact_file_name() {
        let date = NaiveDate::from_ymd_opt(2025, 8, 25).unwrap();
        assert_eq!(artifact_file_name(date), "respekt_2025-08-25.epub");
        assert_eq!(
            artifact_path(Path::new("/tmp/out"), date),
            PathBuf::from("/tmp/out/respekt_2025-08-25.epub")
        );
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_nested() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b");
        ensure_writable_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert!(!nested.join("..__probe_write__").exists());
    }

    #[tokio::test]
    async fn test_remove_artifact_ignores_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("respekt_2025-08-25.epub");
        remove_artifact(&path).await;
        std::fs::write(&path, b"epub").unwrap();
        remove_artifact(&path).await;
        assert!(!path.exists());
    }
}
