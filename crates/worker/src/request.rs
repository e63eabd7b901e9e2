//! Intercepted requests and their classification.
//!
//! Exactly two request classes, each with its own fetch strategy: full-page
//! navigations are network-first (freshness preferred over staleness),
//! everything else is cache-first (availability preferred over freshness).

use bytes::Bytes;

/// A request intercepted by the gateway, reduced to what the fetch
/// strategies need.
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    /// HTTP method, uppercase.
    pub method: String,
    /// Path and query as received, e.g. `/about?lang=mi`.
    pub path_and_query: String,
    /// Request headers as name/value pairs; names lowercase.
    pub headers: Vec<(String, String)>,
    /// Request body, if any.
    pub body: Option<Bytes>,
}

impl InterceptedRequest {
    /// A bare GET for the given path.
    pub fn get(path_and_query: &str) -> Self {
        Self { method: "GET".to_string(), path_and_query: path_and_query.to_string(), headers: Vec::new(), body: None }
    }

    /// Add a request header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    /// First value of the named header, if present.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Classify the request for strategy dispatch.
    ///
    /// A navigation is a GET that either declares `Sec-Fetch-Mode: navigate`
    /// or asks for an HTML document; all other requests are assets.
    pub fn classify(&self) -> RequestClass {
        if self.method.eq_ignore_ascii_case("GET") && self.is_navigation_shaped() {
            RequestClass::Navigation
        } else {
            RequestClass::Asset
        }
    }

    fn is_navigation_shaped(&self) -> bool {
        if self.header("sec-fetch-mode").is_some_and(|mode| mode.eq_ignore_ascii_case("navigate")) {
            return true;
        }
        self.header("accept").is_some_and(|accept| accept.contains("text/html"))
    }
}

/// The two request classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Full-page load: network-first with cache fallback and refresh.
    Navigation,
    /// Static asset or anything else: cache-first with network fallback.
    Asset,
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    Network,
    Cache,
}

/// The worker's answer to a fetch event.
#[derive(Debug, Clone)]
pub struct ServedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub served_from: ServedFrom,
}
