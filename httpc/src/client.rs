//! `Client`: validate → build → execute-with-retry → decode.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use flate2::read::{DeflateDecoder, GzDecoder};
use futures::StreamExt;
use reqwest::Method;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::cookie::{parse_set_cookie, CookieJar, InMemoryCookieJar};
use crate::error::{classify_reqwest_error, ErrorKind, HttpcError};
use crate::observability::redact_headers;
use crate::pool::ConnectionPool;
use crate::redirect::{RedirectController, RedirectPolicy, Step};
use crate::request::Request;
use crate::request_builder;
use crate::response::{Response, ResponseHeaders};
use crate::retry::{parse_retry_after, RetryEngine};
use crate::stats::Stats;
use crate::validator::Validator;

/// A bound applied to the *raw* (possibly still-compressed) bytes read
/// off the wire, independent of the post-decompression cap enforced by
/// [`decode_body`]. Generous multiplier so legitimate compressed
/// payloads are never the bottleneck — the decoded-size cap is the real
/// defense against decompression bombs.
const RAW_READ_SAFETY_MULTIPLIER: u64 = 10;

pub struct Client {
    config: Config,
    pool: ConnectionPool,
    validator: Validator,
    retry: RetryEngine,
    stats: Stats,
    closed: AtomicBool,
    cookie_jar: Option<Arc<dyn CookieJar>>,
}

impl Client {
    pub fn new(config: Config) -> Result<Self, HttpcError> {
        let pool = ConnectionPool::new(&config)?;
        let validator = Validator::new(config.security.clone());
        let retry = RetryEngine::new(config.retry.clone());
        let cookie_jar: Option<Arc<dyn CookieJar>> = if config.cookie_jar_enabled {
            Some(Arc::new(InMemoryCookieJar::new()))
        } else {
            None
        };
        Ok(Self {
            config,
            pool,
            validator,
            retry,
            stats: Stats::new(),
            closed: AtomicBool::new(false),
            cookie_jar,
        })
    }

    pub fn new_secure() -> Result<Self, HttpcError> {
        Self::new(Config::secure())
    }

    pub fn new_performance() -> Result<Self, HttpcError> {
        Self::new(Config::performance())
    }

    pub fn with_cookie_jar(mut self, jar: Arc<dyn CookieJar>) -> Self {
        self.cookie_jar = Some(jar);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn cookie_jar(&self) -> Option<&Arc<dyn CookieJar>> {
        self.cookie_jar.as_ref()
    }

    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.pool.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn request(&self, method: Method, url: impl Into<String>) -> Request {
        Request::new(method, url)
    }

    pub fn get(&self, url: impl Into<String>) -> Request {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: impl Into<String>) -> Request {
        self.request(Method::POST, url)
    }

    pub fn put(&self, url: impl Into<String>) -> Request {
        self.request(Method::PUT, url)
    }

    pub fn patch(&self, url: impl Into<String>) -> Request {
        self.request(Method::PATCH, url)
    }

    pub fn delete(&self, url: impl Into<String>) -> Request {
        self.request(Method::DELETE, url)
    }

    pub fn head(&self, url: impl Into<String>) -> Request {
        self.request(Method::HEAD, url)
    }

    pub fn options_method(&self, url: impl Into<String>) -> Request {
        self.request(Method::OPTIONS, url)
    }

    /// The full validate → build → execute-with-retry → decode state
    /// machine described for `executeWithRetry`.
    pub async fn send(&self, request: Request) -> Result<Response, HttpcError> {
        if self.is_closed() {
            return Err(HttpcError::new(ErrorKind::Validation, "client is closed"));
        }

        let started = Instant::now();
        let max_attempts = request.max_retries.unwrap_or(self.retry.max_attempts()).max(1);
        let cancel = resolve_cancel_token(&request);
        let redirect_policy = RedirectPolicy {
            follow: request.follow_redirects.unwrap_or(self.config.redirect.follow),
            max: request.max_redirects.unwrap_or(self.config.redirect.max),
        };

        let mut redirect_ctl = RedirectController::new();
        let mut last_error: Option<HttpcError> = None;

        for attempt in 0..max_attempts {
            if cancel.is_canceled() {
                return Err(HttpcError::canceled(attempt).with_method(request.method.clone()));
            }

            let outcome = self
                .attempt_once(&request, &cancel, &redirect_policy, &mut redirect_ctl, attempt)
                .await;

            match outcome {
                Ok(mut response) => {
                    if response.is_retryable_status() && attempt + 1 < max_attempts {
                        self.stats.record_failure(started.elapsed());
                        let retry_after = response
                            .headers
                            .get("Retry-After")
                            .and_then(|v| parse_retry_after(v, std::time::SystemTime::now()));
                        let delay = self.retry.delay_for(attempt, retry_after);
                        debug!(attempt, status = response.status, ?delay, "http.retrying");
                        self.retry.sleep(delay, &cancel).await?;
                        continue;
                    }
                    response.attempts = attempt + 1;
                    response.duration = started.elapsed();
                    self.stats.record_success(started.elapsed());
                    return Ok(response);
                }
                Err(err) => {
                    last_error = Some(err);
                    let err_ref = last_error.as_ref().unwrap();
                    if !self.retry.should_retry(attempt, err_ref) {
                        self.stats.record_failure(started.elapsed());
                        return Err(last_error.unwrap().with_attempt(attempt));
                    }
                    let delay = self.retry.delay_for(attempt, None);
                    warn!(attempt, error = %err_ref, ?delay, "http.retrying");
                    self.retry.sleep(delay, &cancel).await?;
                }
            }
        }

        self.stats.record_failure(started.elapsed());
        Err(last_error
            .unwrap_or_else(|| HttpcError::new(ErrorKind::Unknown, "retries exhausted"))
            .with_attempt(max_attempts - 1))
    }

    /// Validate and dispatch `request`, following redirects, but return
    /// the raw streaming `reqwest::Response` instead of buffering and
    /// decoding a body. No retry loop: a download already in progress to
    /// disk cannot safely be replayed from attempt zero, so callers that
    /// want resume-on-failure (like [`crate::download::Downloader`])
    /// implement it via the `Range` header instead.
    pub(crate) async fn send_streaming(
        &self,
        request: &Request,
    ) -> Result<(reqwest::Response, Vec<(String, String)>), HttpcError> {
        if self.is_closed() {
            return Err(HttpcError::new(ErrorKind::Validation, "client is closed"));
        }
        let cancel = resolve_cancel_token(request);
        let redirect_policy = RedirectPolicy {
            follow: request.follow_redirects.unwrap_or(self.config.redirect.follow),
            max: request.max_redirects.unwrap_or(self.config.redirect.max),
        };
        let mut redirect_ctl = RedirectController::new();
        let (wire_response, _method, final_headers, _url) = self
            .attempt_once_raw(request, &cancel, &redirect_policy, &mut redirect_ctl, 0)
            .await?;
        Ok((wire_response, final_headers))
    }

    async fn attempt_once(
        &self,
        request: &Request,
        cancel: &CancelToken,
        redirect_policy: &RedirectPolicy,
        redirect_ctl: &mut RedirectController,
        attempt: usize,
    ) -> Result<Response, HttpcError> {
        let (wire_response, method, final_headers, current_url) = self
            .attempt_once_raw(request, cancel, redirect_policy, redirect_ctl, attempt)
            .await?;
        let host = current_url.host_str().map(str::to_string);
        self.decode_response(wire_response, &method, final_headers, redirect_ctl, host)
            .await
            .map_err(|e| e.with_attempt(attempt).with_method(method))
    }

    /// Drives redirect-following and header/body validation exactly like
    /// [`Self::attempt_once`], but returns the still-streaming
    /// `reqwest::Response` instead of decoding it into memory. Used by
    /// [`crate::download::Downloader`] so large bodies never have to be
    /// fully buffered before they reach disk.
    pub(crate) async fn attempt_once_raw(
        &self,
        request: &Request,
        cancel: &CancelToken,
        redirect_policy: &RedirectPolicy,
        redirect_ctl: &mut RedirectController,
        attempt: usize,
    ) -> Result<(reqwest::Response, Method, Vec<(String, String)>, reqwest::Url), HttpcError> {
        let mut current_url = self
            .validator
            .validate_url(&request.url)
            .map_err(|e| e.with_attempt(attempt).with_method(request.method.clone()))?;

        for (name, value) in request.headers.iter() {
            self.validator
                .validate_header(name, value)
                .map_err(|e| e.with_attempt(attempt).with_method(request.method.clone()))?;
        }

        self.validator
            .validate_body(&request.body, self.config.max_response_body)
            .map_err(|e| e.with_attempt(attempt).with_method(request.method.clone()))?;

        let mut method = request.method.clone();
        let mut body_cleared = false;

        loop {
            let effective_request = {
                let mut cloned = if let Some(jar) = &self.cookie_jar {
                    match current_url.host_str() {
                        Some(host) => {
                            let mut merged = jar.load(host);
                            merged.extend(request.cookies.clone());
                            let mut cloned = request.clone();
                            cloned.cookies = merged;
                            cloned
                        }
                        None => request.clone(),
                    }
                } else {
                    request.clone()
                };
                if body_cleared {
                    cloned.body = crate::body::Body::Empty;
                }
                cloned
            };

            let (builder, final_headers) = request_builder::build(
                self.pool.transport(),
                &self.config,
                &effective_request,
                current_url.clone(),
            )?;
            let builder = builder.method(method.clone());

            debug!(
                attempt,
                method = %method,
                url = %current_url,
                headers = ?redact_headers(&final_headers),
                "http.request.start"
            );

            let wire_result = tokio::select! {
                res = builder.send() => res,
                _ = wait_cancel_or_deadline(cancel) => {
                    return Err(HttpcError::canceled(attempt).with_method(method).with_url(current_url.as_str()));
                }
            };

            let wire_response = wire_result.map_err(|e| {
                HttpcError::new(classify_reqwest_error(&e), e.to_string())
                    .with_attempt(attempt)
                    .with_method(method.clone())
                    .with_url(current_url.as_str())
            })?;

            let status = wire_response.status().as_u16();
            let location = wire_response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            let step = redirect_ctl.step(redirect_policy, &current_url, status, location.as_deref())?;

            match step {
                Step::Done => {
                    return Ok((wire_response, method, final_headers, current_url));
                }
                Step::Follow { next_url } => {
                    // Re-run the same scheme/host/IP checks on every hop —
                    // a redirect is as capable of pointing at a private
                    // address or a disallowed scheme as the original URL.
                    current_url = self
                        .validator
                        .validate_url(next_url.as_str())
                        .map_err(|e| e.with_attempt(attempt).with_method(method.clone()))?;
                    if status == 303 {
                        method = Method::GET;
                        body_cleared = true;
                    }
                    continue;
                }
            }
        }
    }

    async fn decode_response(
        &self,
        wire_response: reqwest::Response,
        method: &Method,
        final_headers: Vec<(String, String)>,
        redirect_ctl: &RedirectController,
        host: Option<String>,
    ) -> Result<Response, HttpcError> {
        let status = wire_response.status().as_u16();
        let status_line = format!("{:?} {}", wire_response.version(), wire_response.status());
        let proto = format!("{:?}", wire_response.version());

        let mut headers = ResponseHeaders::default();
        for (name, value) in wire_response.headers().iter() {
            headers.push(name.as_str(), value.to_str().unwrap_or_default());
        }

        let content_encoding = wire_response
            .headers()
            .get(reqwest::header::CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_length_header = wire_response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let raw_cap = self
            .config
            .max_response_body
            .saturating_mul(RAW_READ_SAFETY_MULTIPLIER);
        let raw_bytes = read_capped_stream(wire_response, raw_cap).await?;

        let decoded = decode_body(&raw_bytes, content_encoding.as_deref(), self.config.max_response_body)?;

        if self.config.strict_content_length && *method != Method::HEAD {
            if let Some(len) = content_length_header {
                if len > 0 && len != decoded.len() as u64 {
                    return Err(HttpcError::new(
                        ErrorKind::Validation,
                        format!(
                            "Content-Length {len} does not match decoded body length {}",
                            decoded.len()
                        ),
                    ));
                }
            }
        }

        let body_text = String::from_utf8_lossy(&decoded).into_owned();

        let mut cookies = Vec::new();
        for value in headers.get_all("Set-Cookie") {
            if let Some(c) = parse_set_cookie(value) {
                cookies.push(c);
            }
        }
        if let Some(jar) = &self.cookie_jar {
            if let Some(host) = host {
                jar.store(&host, cookies.clone());
            }
        }

        Ok(Response {
            status,
            status_line,
            headers,
            body: body_text,
            raw_body: decoded,
            proto,
            attempts: 1,
            duration: Duration::ZERO,
            cookies,
            redirect_chain: redirect_ctl.chain().to_vec(),
            redirect_count: redirect_ctl.count(),
            request_headers: final_headers,
        })
    }
}

/// Resolves when `cancel` is canceled, or when its deadline (if any)
/// elapses — whichever comes first.
async fn wait_cancel_or_deadline(cancel: &CancelToken) {
    match cancel.remaining() {
        Some(remaining) => {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(remaining) => {}
            }
        }
        None => cancel.cancelled().await,
    }
}

fn resolve_cancel_token(request: &Request) -> CancelToken {
    match &request.cancel {
        Some(token) if token.deadline().is_some() => token.clone(),
        Some(token) => match request.timeout {
            Some(timeout) => token.with_added_deadline(Instant::now() + timeout),
            None => token.clone(),
        },
        None => match request.timeout {
            Some(timeout) => CancelToken::with_timeout(timeout),
            None => CancelToken::new(),
        },
    }
}

async fn read_capped_stream(response: reqwest::Response, cap: u64) -> Result<Vec<u8>, HttpcError> {
    let mut stream = response.bytes_stream();
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            HttpcError::new(classify_reqwest_error(&e), format!("failed reading response body: {e}"))
        })?;
        buf.extend_from_slice(&chunk);
        if buf.len() as u64 > cap {
            return Err(HttpcError::new(
                ErrorKind::ResponseTooLarge,
                "response body exceeds configured cap",
            ));
        }
    }
    Ok(buf)
}

/// Decode a possibly-encoded body, exact-match on `Content-Encoding`
/// ("gzip"/"deflate"; `br` is explicitly unsupported; anything else
/// passes through unchanged).
fn decode_body(raw: &[u8], encoding: Option<&str>, cap: u64) -> Result<Vec<u8>, HttpcError> {
    match encoding {
        Some("gzip") => read_capped_decoder(GzDecoder::new(raw), cap),
        Some("deflate") => read_capped_decoder(DeflateDecoder::new(raw), cap),
        Some("br") => Err(HttpcError::new(
            ErrorKind::Unknown,
            "brotli not supported",
        )),
        _ => {
            if raw.len() as u64 > cap {
                Err(HttpcError::new(
                    ErrorKind::ResponseTooLarge,
                    "response body exceeds configured cap",
                ))
            } else {
                Ok(raw.to_vec())
            }
        }
    }
}

fn read_capped_decoder<R: Read>(mut reader: R, cap: u64) -> Result<Vec<u8>, HttpcError> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).map_err(|e| {
            HttpcError::new(
                ErrorKind::ResponseRead,
                format!("failed to decompress response body: {e}"),
            )
        })?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() as u64 > cap {
            return Err(HttpcError::new(
                ErrorKind::ResponseTooLarge,
                "response body exceeds configured cap",
            ));
        }
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_body_passes_through_without_encoding() {
        let raw = b"hello world".to_vec();
        let decoded = decode_body(&raw, None, 1024).unwrap();
        assert_eq!(decoded, raw);
    }

    #[test]
    fn decode_body_rejects_brotli() {
        let err = decode_body(b"whatever", Some("br"), 1024).unwrap_err();
        assert!(err.to_string().contains("brotli"));
    }

    #[test]
    fn decode_body_is_case_sensitive_on_encoding_name() {
        // "GZIP" (uppercase) does not match the exact-case "gzip" check,
        // so it's treated as passthrough rather than decompressed.
        let raw = b"not actually gzip data".to_vec();
        let decoded = decode_body(&raw, Some("GZIP"), 1024).unwrap();
        assert_eq!(decoded, raw);
    }

    #[test]
    fn decode_body_gzip_round_trips() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"{\"ok\":true}").unwrap();
        let compressed = encoder.finish().unwrap();

        let decoded = decode_body(&compressed, Some("gzip"), 1024).unwrap();
        assert_eq!(decoded, b"{\"ok\":true}");
    }

    #[test]
    fn decode_body_enforces_cap_after_inflation() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let payload = vec![b'x'; 200];
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&payload).unwrap();
        let compressed = encoder.finish().unwrap();

        let result = decode_body(&compressed, Some("gzip"), 100);
        assert!(matches!(
            result,
            Err(ref e) if e.kind == ErrorKind::ResponseTooLarge
        ));
    }
}
