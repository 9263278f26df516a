//! The materialized [`Response`]: decoded body, raw bytes, headers,
//! cookies, and the metadata the retry/redirect machinery stamps on.

use std::time::Duration;

use crate::cookie::Cookie;

/// Multi-valued response headers, insertion order preserved.
#[derive(Debug, Clone, Default)]
pub struct ResponseHeaders {
    entries: Vec<(String, String)>,
}

impl ResponseHeaders {
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let lower = name.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(n, _)| n.to_ascii_lowercase() == lower)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, name: &str) -> Vec<&str> {
        let lower = name.to_ascii_lowercase();
        self.entries
            .iter()
            .filter(|(n, _)| n.to_ascii_lowercase() == lower)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub status_line: String,
    pub headers: ResponseHeaders,
    pub body: String,
    pub raw_body: Vec<u8>,
    pub proto: String,
    pub attempts: usize,
    pub duration: Duration,
    pub cookies: Vec<Cookie>,
    /// URLs redirected FROM, in traversal order. The last entry is the
    /// second-to-last hop, not the final URL the response came from.
    pub redirect_chain: Vec<String>,
    pub redirect_count: usize,
    /// Defensive copy of the headers actually sent on the final hop.
    pub request_headers: Vec<(String, String)>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    /// Whether this status is one the retry engine treats as a retryable
    /// server condition (408, 429, 500, 502, 503, 504).
    pub fn is_retryable_status(&self) -> bool {
        matches!(self.status, 408 | 429 | 500 | 502 | 503 | 504)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(status: u16) -> Response {
        Response {
            status,
            status_line: format!("HTTP/1.1 {status}"),
            headers: ResponseHeaders::default(),
            body: String::new(),
            raw_body: Vec::new(),
            proto: "HTTP/1.1".to_string(),
            attempts: 1,
            duration: Duration::from_millis(1),
            cookies: Vec::new(),
            redirect_chain: Vec::new(),
            redirect_count: 0,
            request_headers: Vec::new(),
        }
    }

    #[test]
    fn classifies_2xx_as_success() {
        assert!(sample(200).is_success());
        assert!(sample(299).is_success());
        assert!(!sample(300).is_success());
    }

    #[test]
    fn classifies_3xx_as_redirect() {
        assert!(sample(301).is_redirect());
        assert!(!sample(200).is_redirect());
    }

    #[test]
    fn classifies_retryable_statuses() {
        for status in [408, 429, 500, 502, 503, 504] {
            assert!(sample(status).is_retryable_status(), "{status} should be retryable");
        }
        assert!(!sample(404).is_retryable_status());
        assert!(!sample(400).is_retryable_status());
    }

    #[test]
    fn headers_get_all_returns_every_matching_value() {
        let mut headers = ResponseHeaders::default();
        headers.push("Set-Cookie", "a=1");
        headers.push("set-cookie", "b=2");
        assert_eq!(headers.get_all("Set-Cookie"), vec!["a=1", "b=2"]);
    }
}
