//! Install-time asset manifest.
//!
//! The ordered set of resource identifiers that must be cached before a
//! worker version can activate: the minimum set for offline page-shell
//! rendering. The exact paths are a build-time concern, so the list ships as
//! a plain-text file: one identifier per line, `#` comments and blank lines
//! ignored. The manifest is immutable for the lifetime of a worker version.

use crate::Error;
use std::path::Path;

/// An ordered, de-duplicated set of resource identifiers.
///
/// Identifiers are site-relative paths (`/static/css/output.css`) or absolute
/// http(s) URLs (CDN assets); resolution against the origin happens at fetch
/// time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetManifest {
    assets: Vec<String>,
}

impl AssetManifest {
    /// Build a manifest from raw identifiers.
    ///
    /// Entries are trimmed; empty lines and duplicates are dropped, keeping
    /// first-occurrence order.
    pub fn new(entries: impl IntoIterator<Item = String>) -> Self {
        let mut assets: Vec<String> = Vec::new();
        for entry in entries {
            let entry = entry.trim();
            if entry.is_empty() || assets.iter().any(|a| a == entry) {
                continue;
            }
            assets.push(entry.to_string());
        }
        Self { assets }
    }

    /// Load a manifest from a plain-text file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Manifest` if the file cannot be read.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Manifest(format!("failed to read {}: {e}", path.display())))?;
        Ok(Self::parse(&contents))
    }

    /// Parse manifest text: one identifier per line, `#` starts a comment.
    pub fn parse(contents: &str) -> Self {
        Self::new(
            contents
                .lines()
                .map(|line| line.split('#').next().unwrap_or("").to_string()),
        )
    }

    /// The identifiers, in manifest order.
    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.assets.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let manifest = AssetManifest::parse(
            "# page shell\n/\n\n/static/css/output.css\n/static/js/htmx.min.js  # vendored\n",
        );
        assert_eq!(manifest.assets(), &["/", "/static/css/output.css", "/static/js/htmx.min.js"]);
    }

    #[test]
    fn test_dedup_keeps_first_occurrence_order() {
        let manifest = AssetManifest::new(vec!["/a".to_string(), "/b".to_string(), "/a".to_string()]);
        assert_eq!(manifest.assets(), &["/a", "/b"]);
    }

    #[test]
    fn test_empty_input() {
        let manifest = AssetManifest::parse("# nothing but comments\n\n");
        assert!(manifest.is_empty());
        assert_eq!(manifest.len(), 0);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "/\n/static/css/output.css").unwrap();

        let manifest = AssetManifest::from_file(file.path()).unwrap();
        assert_eq!(manifest.len(), 2);
    }

    #[test]
    fn test_from_file_missing() {
        let result = AssetManifest::from_file("/definitely/not/here.txt");
        assert!(matches!(result, Err(Error::Manifest(_))));
    }
}
