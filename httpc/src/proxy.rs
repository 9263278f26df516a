//! Proxy resolution policy.
//!
//! Precedence (see SPEC_FULL.md Open Questions): an explicit, non-empty
//! [`crate::config::ProxyConfig::url`] wins unconditionally, regardless of
//! `enable_system_proxy`. Only when no explicit URL is set does
//! `enable_system_proxy` matter, in which case `reqwest`'s own
//! environment-variable proxy resolution (`HTTP_PROXY`/`HTTPS_PROXY`/
//! `NO_PROXY`) is used. Otherwise, no proxy.

use reqwest::Proxy;

use crate::config::ProxyConfig;
use crate::error::HttpcError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyDecision {
    Explicit(String),
    System,
    Direct,
}

pub fn resolve(config: &ProxyConfig) -> ProxyDecision {
    match &config.url {
        Some(url) if !url.is_empty() => ProxyDecision::Explicit(url.clone()),
        _ if config.enable_system_proxy => ProxyDecision::System,
        _ => ProxyDecision::Direct,
    }
}

/// Turn a [`ProxyDecision`] into the `reqwest::Proxy` to install on the
/// builder, if any. `System` needs no explicit `Proxy` — `reqwest` reads
/// the environment itself unless `no_proxy()`/`no_proxy_env()` is called.
pub fn to_reqwest_proxy(decision: &ProxyDecision) -> Result<Option<Proxy>, HttpcError> {
    match decision {
        ProxyDecision::Explicit(url) => {
            let proxy = Proxy::all(url)
                .map_err(|e| HttpcError::validation(format!("invalid proxy URL: {e}")))?;
            Ok(Some(proxy))
        }
        ProxyDecision::System | ProxyDecision::Direct => Ok(None),
    }
}
