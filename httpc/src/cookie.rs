//! Cookie wire format and the pluggable jar trait.
//!
//! The client never ships an opinion about storage or eviction policy — it
//! only knows how to parse a `Set-Cookie` header into a [`Cookie`] and
//! render a jar's contents back onto a `Cookie` request header. Anything
//! that implements [`CookieJar`] can sit behind [`crate::client::Client`].

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use cookie::Cookie as RawCookie;

/// A single cookie, independent of any particular jar implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub expires: Option<SystemTime>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<String>,
}

impl Cookie {
    pub fn is_expired(&self, now: SystemTime) -> bool {
        match self.expires {
            Some(exp) => exp <= now,
            None => false,
        }
    }
}

/// Parse a single `Set-Cookie` header value into a [`Cookie`].
pub fn parse_set_cookie(header_value: &str) -> Option<Cookie> {
    let parsed = RawCookie::parse(header_value.to_owned()).ok()?;
    let expires = parsed.expires_datetime().map(|dt| {
        let unix_secs = dt.unix_timestamp();
        SystemTime::UNIX_EPOCH + Duration::from_secs(unix_secs.max(0) as u64)
    });
    Some(Cookie {
        name: parsed.name().to_string(),
        value: parsed.value().to_string(),
        domain: parsed.domain().map(str::to_string),
        path: parsed.path().map(str::to_string),
        expires,
        secure: parsed.secure().unwrap_or(false),
        http_only: parsed.http_only().unwrap_or(false),
        same_site: parsed.same_site().map(|s| s.to_string()),
    })
}

/// Render a set of cookies into the single `name=value; name2=value2` form
/// used on the request-side `Cookie` header.
pub fn render_cookie_header(cookies: &[Cookie]) -> String {
    cookies
        .iter()
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// An external collaborator that stores and retrieves cookies for a given
/// domain. Implementations decide eviction, persistence, and matching
/// semantics; the client only calls `store` after following a response
/// and `load` before building the next request to the same host.
pub trait CookieJar: Send + Sync {
    fn store(&self, host: &str, cookies: Vec<Cookie>);
    fn load(&self, host: &str) -> Vec<Cookie>;
    fn clear(&self, host: &str);
}

/// A simple in-process jar keyed by host, used when
/// [`crate::config::Config::cookie_jar_enabled`] is set and the caller
/// hasn't supplied their own [`CookieJar`].
#[derive(Default)]
pub struct InMemoryCookieJar {
    by_host: Mutex<HashMap<String, Vec<Cookie>>>,
}

impl InMemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CookieJar for InMemoryCookieJar {
    fn store(&self, host: &str, cookies: Vec<Cookie>) {
        let now = SystemTime::now();
        let mut guard = self.by_host.lock().expect("cookie jar mutex poisoned");
        let entry = guard.entry(host.to_string()).or_default();
        for fresh in cookies {
            if fresh.is_expired(now) {
                entry.retain(|c| c.name != fresh.name);
                continue;
            }
            if let Some(existing) = entry.iter_mut().find(|c| c.name == fresh.name) {
                *existing = fresh;
            } else {
                entry.push(fresh);
            }
        }
    }

    fn load(&self, host: &str) -> Vec<Cookie> {
        let now = SystemTime::now();
        let guard = self.by_host.lock().expect("cookie jar mutex poisoned");
        guard
            .get(host)
            .map(|cookies| {
                cookies
                    .iter()
                    .filter(|c| !c.is_expired(now))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn clear(&self, host: &str) {
        let mut guard = self.by_host.lock().expect("cookie jar mutex poisoned");
        guard.remove(host);
    }
}
