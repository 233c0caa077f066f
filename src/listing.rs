//! Listing-page URL arithmetic for the portal's search results.
//!
//! The portal shows 24 articles per search page and encodes the page number
//! as a path segment right after `/search`:
//!
//! ```text
//! /tr/search?q=&section=articles        page 1 → /tr/search/1?q=&section=articles
//! ```
//!
//! Nothing here performs network I/O; the output is a URL list for `fetch`.

use crate::error::ListingError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Search results per listing page.
pub const PAGE_SIZE: u64 = 24;

/// A publisher (journal) as stored in `publishers.json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Publisher {
    pub name: String,
    /// Search path, relative to the portal host.
    pub url: String,
    pub article_count: u64,
}

/// Listing pages needed to cover `article_count` articles.
pub fn page_count(article_count: u64) -> u64 {
    article_count.div_ceil(PAGE_SIZE)
}

/// `prefix + search_url` with `/<page>` inserted after `/search`, for every
/// page in `1..=pages`.
pub fn paginate(prefix: &str, search_url: &str, pages: u64) -> Result<Vec<String>, ListingError> {
    let (head, tail) = split_search(search_url)?;
    Ok((1..=pages)
        .map(|page| format!("{prefix}{head}/search/{page}{tail}"))
        .collect())
}

fn split_search(search_url: &str) -> Result<(&str, &str), ListingError> {
    let mut parts = search_url.split("/search");
    match (parts.next(), parts.next(), parts.next()) {
        (Some(head), Some(tail), None) => Ok((head, tail)),
        _ => Err(ListingError::MalformedSearchUrl(search_url.to_string())),
    }
}

/// Every listing page URL for every publisher, in publisher order.
pub fn landing_urls(prefix: &str, publishers: &[Publisher]) -> Result<Vec<String>, ListingError> {
    check_prefix(prefix)?;
    let prefix = prefix.trim_end_matches('/');
    let mut urls = Vec::new();
    for publisher in publishers {
        urls.extend(paginate(prefix, &publisher.url, page_count(publisher.article_count))?);
    }
    Ok(urls)
}

fn check_prefix(prefix: &str) -> Result<(), ListingError> {
    match url::Url::parse(prefix) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => Ok(()),
        _ => Err(ListingError::InvalidPrefix(prefix.to_string())),
    }
}

pub fn read_publishers(path: &Path) -> Result<Vec<Publisher>, ListingError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ListingError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ListingError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
