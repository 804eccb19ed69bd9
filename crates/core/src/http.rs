//! Request and response snapshots.
//!
//! A [`Response`] body is materialized once into [`Bytes`]. Anything that both
//! returns a response and persists it calls [`Response::fork`], which yields
//! two values whose bodies can be read independently of each other.

use bytes::Bytes;
use url::Url;

/// Header name/value pairs in received order.
pub type HeaderList = Vec<(String, String)>;

/// An intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Upper-cased HTTP method.
    pub method: String,
    /// Request URL with the fragment removed.
    pub url: Url,
    pub headers: HeaderList,
}

impl Request {
    pub fn new(method: &str, mut url: Url) -> Self {
        url.set_fragment(None);
        Self { method: method.to_ascii_uppercase(), url, headers: Vec::new() }
    }

    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Only GET requests are stored in or served from a cache generation.
    pub fn is_cacheable(&self) -> bool {
        self.method == "GET"
    }

    /// The request URL with its query string removed.
    pub fn url_without_search(&self) -> String {
        strip_search(&self.url)
    }
}

/// Drop query and fragment from a URL.
pub fn strip_search(url: &Url) -> String {
    let mut stripped = url.clone();
    stripped.set_query(None);
    stripped.set_fragment(None);
    stripped.to_string()
}

/// A fully read response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Final URL after redirects.
    pub url: Url,
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderList,
    pub body: Bytes,
}

impl Response {
    pub fn new(url: Url, status: u16, body: impl Into<Bytes>) -> Self {
        Self { url, status, status_text: String::new(), headers: Vec::new(), body: body.into() }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// True for 2xx statuses.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup; first match wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Split into one copy for the caller and one for the cache.
    pub fn fork(self) -> (Self, Self) {
        let stored = self.clone();
        (self, stored)
    }
}
