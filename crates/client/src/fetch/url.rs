//! Resource identifier resolution against the configured origin.
//!
//! Manifest entries and intercepted request paths are site-relative
//! (`/static/css/output.css`) or absolute http(s) URLs (CDN assets). Both
//! resolve to the URL the fetch pipeline actually requests, and that URL is
//! the cache key, so resolution must be deterministic: fragments are
//! dropped, query strings kept as-is.

use url::Url;

/// Error type for resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty resource identifier")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

/// Resolve a resource identifier to a fetchable URL.
///
/// Absolute http(s) identifiers pass through; anything else joins the
/// origin. The url parser lowercases hosts, so equal resources resolve to
/// equal cache keys.
pub fn resolve(origin: &Url, target: &str) -> Result<Url, UrlError> {
    let trimmed = target.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut resolved = if let Some((scheme, _)) = trimmed.split_once("://") {
        match scheme {
            "http" | "https" => Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?,
            other => return Err(UrlError::UnsupportedScheme(other.to_string())),
        }
    } else {
        origin.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?
    };

    resolved.set_fragment(None);

    Ok(resolved)
}
