//! Builds the pooled, reusable `reqwest::Client` transport from [`Config`].

use std::sync::Arc;

use reqwest::tls::Version as ReqwestTlsVersion;

use crate::config::{Config, TlsVersion};
use crate::dns::GuardedResolver;
use crate::error::HttpcError;
use crate::proxy;

/// Owns the underlying transport handle. Cheap to clone (it's an `Arc`
/// internally, same as `reqwest::Client`); `close` drains idle
/// connections and is idempotent.
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    transport: reqwest::Client,
}

impl ConnectionPool {
    pub fn new(config: &Config) -> Result<Self, HttpcError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.timeouts.dial)
            .timeout(config.timeouts.request)
            .tcp_keepalive(config.timeouts.keep_alive)
            .pool_idle_timeout(config.timeouts.idle_conn)
            .pool_max_idle_per_host(config.pool.max_idle_per_host)
            .user_agent(&config.user_agent)
            .min_tls_version(to_reqwest_tls_version(config.tls.min_version))
            .danger_accept_invalid_certs(config.tls.skip_verify)
            .redirect(reqwest::redirect::Policy::none());

        if config.security.validate_url {
            builder = builder.dns_resolver(Arc::new(GuardedResolver::new(
                config.security.allow_private_ips,
            )));
        }

        if let Some(max) = config.tls.max_version {
            builder = builder.max_tls_version(to_reqwest_tls_version(max));
        }

        builder = if config.http2_enabled {
            builder.http2_prior_knowledge()
        } else {
            builder.http1_only()
        };

        let decision = proxy::resolve(&config.proxy);
        match decision {
            proxy::ProxyDecision::Explicit(_) => {
                if let Some(p) = proxy::to_reqwest_proxy(&decision)? {
                    builder = builder.proxy(p);
                }
            }
            proxy::ProxyDecision::System => {
                // leave reqwest's default environment-based proxy resolution in effect
            }
            proxy::ProxyDecision::Direct => {
                builder = builder.no_proxy();
            }
        }

        let transport = builder
            .build()
            .map_err(|e| HttpcError::validation(format!("failed to build transport: {e}")))?;

        Ok(Self { transport })
    }

    pub fn transport(&self) -> &reqwest::Client {
        &self.transport
    }

    /// Idempotent. `reqwest::Client` has no explicit shutdown hook; idle
    /// connections are reclaimed when the last clone is dropped, so this
    /// is a no-op kept for interface parity with the spec's `Close`.
    pub fn close(&self) {}
}

fn to_reqwest_tls_version(v: TlsVersion) -> ReqwestTlsVersion {
    match v {
        TlsVersion::Tls1_2 => ReqwestTlsVersion::TLS_1_2,
        TlsVersion::Tls1_3 => ReqwestTlsVersion::TLS_1_3,
    }
}
