//! The in-memory [`Request`] value: method, URL, headers, query, body,
//! per-request overrides, and the options that mutate it.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Method;
use serde::Serialize;

use crate::body::{Body, FormData};
use crate::cancel::CancelToken;
use crate::cookie::Cookie;
use crate::error::HttpcError;

/// Case-insensitive header map, preserving the order headers were
/// inserted (consumers iterating for wire output see a stable order).
#[derive(Debug, Clone, Default)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let lower = name.to_ascii_lowercase();
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|(n, _)| n.to_ascii_lowercase() == lower)
        {
            *entry = (name, value.into());
        } else {
            self.entries.push((name, value.into()));
        }
    }

    pub fn set_if_absent(&mut self, name: &str, value: impl Into<String>) {
        if self.get(name).is_none() {
            self.set(name.to_string(), value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let lower = name.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(n, _)| n.to_ascii_lowercase() == lower)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Headers the library itself manages; callers may not set these directly.
pub const FORBIDDEN_HEADER_NAMES: &[&str] = &["content-length", "transfer-encoding"];

/// A fully composed request, built up via the `with_*` option methods
/// before being handed to [`crate::client::Client`].
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    pub query: BTreeMap<String, String>,
    pub body: Body,
    pub timeout: Option<Duration>,
    pub max_retries: Option<usize>,
    pub cancel: Option<CancelToken>,
    pub cookies: Vec<Cookie>,
    pub follow_redirects: Option<bool>,
    pub max_redirects: Option<u32>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            query: BTreeMap::new(),
            body: Body::Empty,
            timeout: None,
            max_retries: None,
            cancel: None,
            cookies: Vec::new(),
            follow_redirects: None,
            max_redirects: None,
        }
    }

    pub fn with_context(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout = Some(d);
        self
    }

    pub fn with_max_retries(mut self, n: usize) -> Self {
        self.max_retries = Some(n);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn with_bearer_token(mut self, token: impl AsRef<str>) -> Self {
        self.headers
            .set("Authorization", format!("Bearer {}", token.as_ref()));
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.insert(name.into(), value.to_string());
        self
    }

    pub fn with_text(mut self, value: impl Into<String>) -> Self {
        self.body = Body::text(value);
        self
    }

    pub fn with_bytes(mut self, bytes: Vec<u8>) -> Self {
        self.body = Body::bytes(bytes);
        self
    }

    /// Sends `bytes` as-is, with no implicit `Content-Type` (unlike
    /// [`Request::with_bytes`]); set one explicitly via [`Request::with_header`]
    /// if the destination needs it.
    pub fn with_byte_stream(mut self, bytes: Vec<u8>) -> Self {
        self.body = Body::byte_stream(bytes);
        self
    }

    /// Streams the file at `path` as the request body, with an
    /// `application/octet-stream` default `Content-Type`.
    pub fn with_file_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.body = Body::FilePath(path.into());
        self
    }

    pub fn with_json<T: Serialize>(mut self, value: &T) -> Result<Self, HttpcError> {
        self.body = Body::json(value)?;
        Ok(self)
    }

    pub fn with_xml<T: Serialize>(mut self, value: &T) -> Result<Self, HttpcError> {
        self.body = Body::xml(value)?;
        Ok(self)
    }

    pub fn with_form_data(mut self, form: FormData) -> Self {
        self.body = Body::multipart(form);
        self
    }

    pub fn with_file(
        mut self,
        field: impl Into<String>,
        filename: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        let filename = filename.into();
        let form = FormData::new().file(field, filename, "application/octet-stream", bytes);
        self.body = Body::multipart(form);
        self
    }

    pub fn with_cookie(mut self, cookie: Cookie) -> Self {
        self.cookies.push(cookie);
        self
    }

    pub fn with_cookies(mut self, cookies: Vec<Cookie>) -> Self {
        self.cookies.extend(cookies);
        self
    }

    pub fn with_cookie_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push(Cookie {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            expires: None,
            secure: false,
            http_only: false,
            same_site: None,
        });
        self
    }

    /// Parse a `"name=value; name2=value2"` cookie string: trim each
    /// segment, ignore empty ones, preserve insertion order.
    pub fn with_cookie_string(mut self, raw: &str) -> Self {
        for segment in raw.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            if let Some((name, value)) = segment.split_once('=') {
                let name = name.trim();
                let value = value.trim();
                if name.is_empty() {
                    continue;
                }
                self = self.with_cookie_value(name.to_string(), value.to_string());
            }
        }
        self
    }

    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = Some(follow);
        self
    }

    pub fn with_max_redirects(mut self, n: u32) -> Self {
        self.max_redirects = Some(n);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_set_is_case_insensitive_and_overwrites() {
        let mut headers = Headers::new();
        headers.set("Content-Type", "text/plain");
        headers.set("content-type", "application/json");
        assert_eq!(headers.get("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(headers.iter().count(), 1);
    }

    #[test]
    fn set_if_absent_does_not_override_existing() {
        let mut headers = Headers::new();
        headers.set("X-Custom", "first");
        headers.set_if_absent("x-custom", "second");
        assert_eq!(headers.get("X-Custom"), Some("first"));
    }

    #[test]
    fn cookie_string_parses_three_in_order_and_skips_blanks() {
        let req = Request::new(Method::GET, "http://example.com")
            .with_cookie_string("a=1; b=2;  ; c=3 ; ");
        let names: Vec<&str> = req.cookies.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(req.cookies[2].value, "3");
    }

    #[test]
    fn bearer_token_sets_authorization_header() {
        let req = Request::new(Method::GET, "http://example.com").with_bearer_token("secret");
        assert_eq!(req.headers.get("Authorization"), Some("Bearer secret"));
    }

    #[test]
    fn default_body_is_empty() {
        let req = Request::new(Method::GET, "http://example.com");
        assert!(matches!(req.body, Body::Empty));
    }

    #[test]
    fn with_text_sets_text_body() {
        let req = Request::new(Method::POST, "http://example.com").with_text("hello");
        assert!(matches!(req.body, Body::Text(ref s) if s == "hello"));
    }

    #[test]
    fn with_bytes_sets_bytes_body() {
        let req = Request::new(Method::POST, "http://example.com").with_bytes(vec![1, 2, 3]);
        assert!(matches!(req.body, Body::Bytes(ref b) if b == &[1, 2, 3]));
    }

    #[test]
    fn with_file_path_sets_file_path_body() {
        let req = Request::new(Method::PUT, "http://example.com").with_file_path("/tmp/upload.bin");
        assert!(matches!(req.body, Body::FilePath(ref p) if p == std::path::Path::new("/tmp/upload.bin")));
    }
}
