//! Filename derivation, directory checks and log helpers.
//!
//! - URL slugification and content-type → extension mapping, which together
//!   give every URL a content-addressed destination path
//! - Write-probe for the download directory
//! - String truncation for log fields

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};
use unicode_normalization::UnicodeNormalization;

/// Extension used when the content type is missing or unknown.
pub const FALLBACK_EXTENSION: &str = "bin";

/// Slug used when a URL has no alphanumeric characters at all.
const EMPTY_SLUG: &str = "download";

/// Leaves room for the extension and the `.<pid>.<seq>.part` temp suffix
/// under the 255-byte NAME_MAX.
const MAX_SLUG_BYTES: usize = 200;

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("static regex"));

/// Convert a URL into a filesystem-safe filename stem.
///
/// Transliterates by NFKD decomposition, keeping only the ASCII part of each
/// character (`ç` → `c`, `Ö` → `o`; `ı` has no decomposition and is dropped).
/// Then lowercases, collapses every run of non-alphanumeric characters into
/// one `-` and trims dashes at both ends.
///
/// Distinct URLs can map to the same slug (`/a/b` and `/a-b`); callers that
/// need one file per URL must de-duplicate first.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(slugify("https://dergipark.org.tr/tr/pub/x"), "https-dergipark-org-tr-tr-pub-x");
/// ```
pub fn slugify(value: &str) -> String {
    let ascii: String = value
        .nfkd()
        .filter(char::is_ascii)
        .collect::<String>()
        .to_ascii_lowercase();
    let slug = NON_ALNUM.replace_all(&ascii, "-");
    let slug = slug.trim_matches('-');

    if slug.is_empty() {
        return EMPTY_SLUG.to_string();
    }
    if slug.len() > MAX_SLUG_BYTES {
        // ASCII only, so every index is a char boundary.
        return slug[..MAX_SLUG_BYTES].trim_end_matches('-').to_string();
    }
    slug.to_string()
}

/// File extension for a `Content-Type` header value.
///
/// Parameters such as `charset` are ignored and matching is case-insensitive.
pub fn extension_for(content_type: Option<&str>) -> &'static str {
    let Some(raw) = content_type else {
        return FALLBACK_EXTENSION;
    };
    let essence = raw.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    match essence.as_str() {
        "application/pdf" => "pdf",
        "text/html" | "application/xhtml+xml" => "html",
        "application/json" => "json",
        "text/xml" | "application/xml" => "xml",
        "text/plain" => "txt",
        _ => FALLBACK_EXTENSION,
    }
}

/// `dir/slug(url).ext`
pub fn destination_path(dir: &Path, url: &str, content_type: Option<&str>) -> PathBuf {
    dir.join(format!("{}.{}", slugify(url), extension_for(content_type)))
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut at `max` bytes (backing off to a char boundary) with
/// `"…(+N bytes)"` appended.
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

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then creates and removes a probe file.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or is not writable
/// (permission denied, read-only filesystem, a regular file in the way).
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    // Sync probe keeps the error surface simple.
    let probe_path = path.join("..__probe_write__");
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Download directory is writable");
    Ok(())
}
