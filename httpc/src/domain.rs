//! `DomainClient`: a `Client` pinned to one origin, with persistent
//! per-origin headers/cookies and a same-origin gate on every call.

use parking_lot::RwLock;
use reqwest::Method;
use url::Url;

use crate::client::Client;
use crate::cookie::Cookie;
use crate::error::{ErrorKind, HttpcError};
use crate::request::Request;
use crate::response::Response;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Origin {
    scheme: String,
    host: String,
    port: Option<u16>,
}

impl Origin {
    fn from_url(url: &Url) -> Result<Self, HttpcError> {
        let host = url
            .host_str()
            .ok_or_else(|| HttpcError::validation("base URL has no host"))?
            .to_string();
        Ok(Self {
            scheme: url.scheme().to_string(),
            host,
            port: url.port(),
        })
    }
}

#[derive(Default)]
struct PersistentState {
    headers: Vec<(String, String)>,
    cookies: Vec<Cookie>,
}

/// `Client` plus persistent per-origin state behind a reader-preferring
/// lock; an in-flight request snapshots this state at build time, so
/// concurrent mutation never tears a single request's view of it.
pub struct DomainClient {
    inner: Client,
    origin: Origin,
    base: Url,
    state: RwLock<PersistentState>,
}

impl DomainClient {
    pub fn new(inner: Client, base_url: &str) -> Result<Self, HttpcError> {
        let base = Url::parse(base_url)
            .map_err(|e| HttpcError::validation(format!("invalid base URL: {e}")))?;
        let origin = Origin::from_url(&base)?;
        Ok(Self {
            inner,
            origin,
            base,
            state: RwLock::new(PersistentState::default()),
        })
    }

    pub fn set_header(&self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        let mut state = self.state.write();
        if let Some(entry) = state
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            entry.1 = value;
        } else {
            state.headers.push((name, value));
        }
    }

    pub fn clear_headers(&self) {
        self.state.write().headers.clear();
    }

    pub fn get_headers(&self) -> Vec<(String, String)> {
        self.state.read().headers.clone()
    }

    pub fn set_cookie(&self, cookie: Cookie) {
        let mut state = self.state.write();
        if let Some(existing) = state.cookies.iter_mut().find(|c| c.name == cookie.name) {
            *existing = cookie;
        } else {
            state.cookies.push(cookie);
        }
    }

    pub fn clear_cookies(&self) {
        self.state.write().cookies.clear();
    }

    pub fn get_cookies(&self) -> Vec<Cookie> {
        self.state.read().cookies.clone()
    }

    /// Resolve `target` (relative path starting with `/` or `?`, or an
    /// absolute same-origin URL) and fail fast, before any network I/O,
    /// if it names a different origin.
    fn resolve(&self, target: &str) -> Result<Url, HttpcError> {
        if target.starts_with('/') || target.starts_with('?') {
            return self
                .base
                .join(target)
                .map_err(|e| HttpcError::validation(format!("invalid relative URL: {e}")));
        }
        let absolute = Url::parse(target)
            .map_err(|e| HttpcError::validation(format!("invalid URL: {e}")))?;
        let candidate_origin = Origin::from_url(&absolute)?;
        if candidate_origin != self.origin {
            return Err(HttpcError::new(
                ErrorKind::Validation,
                format!(
                    "cross-origin request to {}://{} blocked by DomainClient pinned to {}://{}",
                    candidate_origin.scheme, candidate_origin.host, self.origin.scheme, self.origin.host
                ),
            ));
        }
        Ok(absolute)
    }

    /// Merge persistent headers/cookies under the per-call request: the
    /// per-call value wins for headers; persistent cookies are added
    /// ahead of per-call cookies.
    fn apply_persistent_state(&self, mut request: Request) -> Request {
        let snapshot = self.state.read();
        for (name, value) in &snapshot.headers {
            request.headers.set_if_absent(name, value.clone());
        }
        let mut cookies = snapshot.cookies.clone();
        cookies.extend(request.cookies);
        request.cookies = cookies;
        request
    }

    pub async fn send(&self, method: Method, target: &str, build: impl FnOnce(Request) -> Request) -> Result<Response, HttpcError> {
        let url = self.resolve(target)?;
        let request = build(Request::new(method, url.to_string()));
        let request = self.apply_persistent_state(request);
        self.inner.send(request).await
    }

    pub async fn get(&self, target: &str) -> Result<Response, HttpcError> {
        self.send(Method::GET, target, |r| r).await
    }

    pub async fn post(&self, target: &str, build: impl FnOnce(Request) -> Request) -> Result<Response, HttpcError> {
        self.send(Method::POST, target, build).await
    }

    pub async fn put(&self, target: &str, build: impl FnOnce(Request) -> Request) -> Result<Response, HttpcError> {
        self.send(Method::PUT, target, build).await
    }

    pub async fn patch(&self, target: &str, build: impl FnOnce(Request) -> Request) -> Result<Response, HttpcError> {
        self.send(Method::PATCH, target, build).await
    }

    pub async fn delete(&self, target: &str, build: impl FnOnce(Request) -> Request) -> Result<Response, HttpcError> {
        self.send(Method::DELETE, target, build).await
    }

    pub async fn head(&self, target: &str) -> Result<Response, HttpcError> {
        self.send(Method::HEAD, target, |r| r).await
    }

    pub async fn options_method(&self, target: &str) -> Result<Response, HttpcError> {
        self.send(Method::OPTIONS, target, |r| r).await
    }

    pub fn close(&self) {
        self.inner.close();
    }
}
