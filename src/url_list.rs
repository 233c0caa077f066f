//! Plain-text URL lists: one URL per line.

use crate::error::ConfigError;
use itertools::Itertools;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

/// Read a URL list, trimming whitespace and skipping blank lines.
///
/// With `dedup`, repeated URLs are dropped keeping the first occurrence, so
/// no URL is fetched twice.
///
/// A missing or unreadable file is a `ConfigError::Io` carrying the path.
#[instrument(level = "info", skip_all, fields(path = %path.display(), dedup = dedup))]
pub async fn read_url_list(path: &Path, dedup: bool) -> Result<Vec<String>, ConfigError> {
    let raw = fs::read_to_string(path).await.map_err(|source| {
        error!(error = %source, "Cannot read URL list");
        ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }
    })?;
    let lines = raw.lines().map(str::trim).filter(|l| !l.is_empty());
    let urls: Vec<String> = if dedup {
        lines.unique().map(String::from).collect()
    } else {
        lines.map(String::from).collect()
    };
    info!(count = urls.len(), "Read URL list");
    Ok(urls)
}

/// Write one URL per line, replacing the file.
#[instrument(level = "info", skip_all, fields(path = %path.display(), count = urls.len()))]
pub async fn write_url_list(path: &Path, urls: &[String]) -> std::io::Result<()> {
    let mut body = urls.join("\n");
    if !body.is_empty() {
        body.push('\n');
    }
    fs::write(path, body).await?;
    info!("Wrote URL list");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trims_and_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls.txt");
        std::fs::write(&path, "  https://a.org/1  \n\n\t\nhttps://a.org/2\r\nhttps://a.org/1\n").unwrap();

        let urls = read_url_list(&path, false).await.unwrap();
        assert_eq!(urls, vec!["https://a.org/1", "https://a.org/2", "https://a.org/1"]);
    }

    #[tokio::test]
    async fn test_dedup_keeps_first_occurrence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls.txt");
        std::fs::write(&path, "b\na\nb\nc\na\n").unwrap();

        let urls = read_url_list(&path, true).await.unwrap();
        assert_eq!(urls, vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_missing_file_names_path() {
        let err = read_url_list(Path::new("/nonexistent/urls.txt"), false)
            .await
            .unwrap_err();
        assert!(matches!(&err, ConfigError::Io { path, .. } if path == Path::new("/nonexistent/urls.txt")));
        assert!(err.to_string().contains("/nonexistent/urls.txt"), "{err}");
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let urls = vec!["https://a.org/1".to_string(), "https://a.org/2".to_string()];
        write_url_list(&path, &urls).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "https://a.org/1\nhttps://a.org/2\n");
        assert_eq!(read_url_list(&path, false).await.unwrap(), urls);
    }
}
