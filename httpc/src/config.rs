//! Client configuration: timeouts, pool limits, TLS policy, retry policy,
//! redirect policy, size caps, security flags, and proxy selection.
//!
//! `Config` is immutable after construction — build one with
//! [`Config::builder`] or start from a named preset ([`Config::secure`],
//! [`Config::performance`]) and tweak fields before handing it to
//! [`crate::Client::new`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// TLS version floor/ceiling. Mirrors the handful of versions `reqwest`
/// actually lets you pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TlsVersion {
    Tls1_2,
    Tls1_3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    pub request: Duration,
    pub dial: Duration,
    pub keep_alive: Duration,
    pub tls_handshake: Duration,
    pub response_header: Duration,
    pub idle_conn: Duration,
    pub expect_continue: Duration,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(30),
            dial: Duration::from_secs(10),
            keep_alive: Duration::from_secs(90),
            tls_handshake: Duration::from_secs(10),
            response_header: Duration::from_secs(15),
            idle_conn: Duration::from_secs(90),
            expect_continue: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub max_idle_total: usize,
    pub max_idle_per_host: usize,
    pub max_conns_per_host: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_total: 100,
            max_idle_per_host: 10,
            max_conns_per_host: 0, // 0 == unbounded, same as reqwest's default
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub min_version: TlsVersion,
    pub max_version: Option<TlsVersion>,
    pub skip_verify: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            min_version: TlsVersion::Tls1_2,
            max_version: None,
            skip_verify: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
            jitter: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectConfig {
    pub follow: bool,
    /// 0 means "use the library default of 10".
    pub max: u32,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            follow: true,
            max: 0,
        }
    }
}

/// Library-wide default redirect cap used when [`RedirectConfig::max`] is 0.
pub const DEFAULT_MAX_REDIRECTS: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub validate_url: bool,
    pub validate_headers: bool,
    /// When `false` (the default), the [`crate::validator::Validator`]
    /// rejects requests that resolve to loopback/private/reserved/
    /// link-local/multicast addresses (SSRF guard). Set `true` to allow
    /// them — e.g. in tests that talk to `127.0.0.1`.
    pub allow_private_ips: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            validate_url: true,
            validate_headers: true,
            allow_private_ips: false,
        }
    }
}

/// Proxy selection. Precedence, evaluated once at [`crate::pool::ConnectionPool`]
/// construction: explicit `url` (if non-empty) unconditionally wins; else,
/// if `enable_system_proxy`, the host's `HTTP_PROXY`/`HTTPS_PROXY`/`NO_PROXY`
/// environment is consulted; else direct.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub url: Option<String>,
    pub enable_system_proxy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub timeouts: TimeoutsConfig,
    pub pool: PoolConfig,
    pub tls: TlsConfig,
    pub retry: RetryConfig,
    pub redirect: RedirectConfig,
    pub max_response_body: u64,
    pub strict_content_length: bool,
    pub security: SecurityConfig,
    pub proxy: ProxyConfig,
    pub user_agent: String,
    pub default_headers: Vec<(String, String)>,
    pub cookie_jar_enabled: bool,
    pub http2_enabled: bool,
}

const DEFAULT_USER_AGENT: &str = concat!("httpc/", env!("CARGO_PKG_VERSION"));
const MEBIBYTE: u64 = 1024 * 1024;

impl Default for Config {
    fn default() -> Self {
        Self {
            timeouts: TimeoutsConfig::default(),
            pool: PoolConfig::default(),
            tls: TlsConfig::default(),
            retry: RetryConfig::default(),
            redirect: RedirectConfig::default(),
            max_response_body: 50 * MEBIBYTE,
            strict_content_length: false,
            security: SecurityConfig::default(),
            proxy: ProxyConfig::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            default_headers: Vec::new(),
            cookie_jar_enabled: false,
            http2_enabled: true,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// The "Secure" preset: TLS 1.3 floor, SSRF guard on, strict
    /// content-length, lower pool limits than [`Config::default`].
    pub fn secure() -> Self {
        let mut cfg = Self::default();
        cfg.tls.min_version = TlsVersion::Tls1_3;
        cfg.security.allow_private_ips = false;
        cfg.strict_content_length = true;
        cfg.pool.max_idle_total = 20;
        cfg.pool.max_idle_per_host = 4;
        cfg
    }

    /// The "Performance" preset: higher pool limits, longer keep-alive.
    pub fn performance() -> Self {
        let mut cfg = Self::default();
        cfg.pool.max_idle_total = 500;
        cfg.pool.max_idle_per_host = 50;
        cfg.timeouts.keep_alive = Duration::from_secs(300);
        cfg.timeouts.idle_conn = Duration::from_secs(300);
        cfg
    }
}

/// Mutates a [`Config`] through chained setters, mirroring the
/// `ClientBuilder`-style option composition the transport stack already
/// uses (see `reqwest::ClientBuilder`).
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: ConfigOrPreset,
}

#[derive(Debug, Clone)]
enum ConfigOrPreset {
    Default(Config),
}

impl Default for ConfigOrPreset {
    fn default() -> Self {
        ConfigOrPreset::Default(Config::default())
    }
}

impl ConfigBuilder {
    fn cfg_mut(&mut self) -> &mut Config {
        match &mut self.config {
            ConfigOrPreset::Default(c) => c,
        }
    }

    pub fn preset(mut self, preset: Config) -> Self {
        self.config = ConfigOrPreset::Default(preset);
        self
    }

    pub fn request_timeout(mut self, d: Duration) -> Self {
        self.cfg_mut().timeouts.request = d;
        self
    }

    pub fn max_attempts(mut self, n: usize) -> Self {
        self.cfg_mut().retry.max_attempts = n;
        self
    }

    pub fn max_response_body(mut self, bytes: u64) -> Self {
        self.cfg_mut().max_response_body = bytes;
        self
    }

    pub fn allow_private_ips(mut self, allow: bool) -> Self {
        self.cfg_mut().security.allow_private_ips = allow;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.cfg_mut().user_agent = ua.into();
        self
    }

    pub fn proxy_url(mut self, url: impl Into<String>) -> Self {
        self.cfg_mut().proxy.url = Some(url.into());
        self
    }

    pub fn enable_system_proxy(mut self, enable: bool) -> Self {
        self.cfg_mut().proxy.enable_system_proxy = enable;
        self
    }

    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.cfg_mut().redirect.follow = follow;
        self
    }

    pub fn max_redirects(mut self, n: u32) -> Self {
        self.cfg_mut().redirect.max = n;
        self
    }

    pub fn http2(mut self, enable: bool) -> Self {
        self.cfg_mut().http2_enabled = enable;
        self
    }

    pub fn cookie_jar(mut self, enable: bool) -> Self {
        self.cfg_mut().cookie_jar_enabled = enable;
        self
    }

    pub fn build(self) -> Config {
        match self.config {
            ConfigOrPreset::Default(c) => c,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_preset_raises_tls_floor() {
        let cfg = Config::secure();
        assert!(matches!(cfg.tls.min_version, TlsVersion::Tls1_3));
        assert!(cfg.strict_content_length);
        assert!(!cfg.security.allow_private_ips);
    }

    #[test]
    fn performance_preset_raises_pool_limits() {
        let cfg = Config::performance();
        let default_cfg = Config::default();
        assert!(cfg.pool.max_idle_total > default_cfg.pool.max_idle_total);
        assert!(cfg.timeouts.keep_alive > default_cfg.timeouts.keep_alive);
    }

    #[test]
    fn builder_overrides_compose() {
        let cfg = Config::builder()
            .max_attempts(7)
            .allow_private_ips(true)
            .user_agent("custom-agent/1.0")
            .build();
        assert_eq!(cfg.retry.max_attempts, 7);
        assert!(cfg.security.allow_private_ips);
        assert_eq!(cfg.user_agent, "custom-agent/1.0");
    }

    #[test]
    fn redirect_zero_means_library_default() {
        let cfg = Config::default();
        assert_eq!(cfg.redirect.max, 0);
        assert_eq!(DEFAULT_MAX_REDIRECTS, 10);
    }
}
