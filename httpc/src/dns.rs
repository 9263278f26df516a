//! A `reqwest::dns::Resolve` implementation that re-checks every resolved
//! address against the SSRF guard, closing the DNS-rebinding gap that a
//! host-string check alone can't: a hostname that looks public at validation
//! time can still resolve to a loopback/private address by the time the
//! transport connects.

use std::error::Error as StdError;
use std::net::SocketAddr;

use reqwest::dns::{Addrs, Name, Resolve, Resolving};

use crate::validator::is_disallowed_ip;

/// Wraps the system resolver (via `tokio::net::lookup_host`) and filters out
/// any resolved address in a disallowed range. If every resolved address is
/// disallowed, resolution fails with an error (surfaced as a transport
/// error, since `reqwest::dns::Resolve` has no room for our own taxonomy).
/// If `allow_private_ips` is set, every resolved address passes through.
#[derive(Debug, Clone, Copy)]
pub struct GuardedResolver {
    allow_private_ips: bool,
}

impl GuardedResolver {
    pub fn new(allow_private_ips: bool) -> Self {
        Self { allow_private_ips }
    }
}

impl Resolve for GuardedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let allow_private_ips = self.allow_private_ips;
        let host = name.as_str().to_string();
        Box::pin(async move {
            let resolved: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0))
                .await
                .map_err(|e| Box::new(e) as Box<dyn StdError + Send + Sync>)?
                .collect();

            let allowed = filter_addrs(resolved, allow_private_ips)
                .map_err(|e| Box::new(e) as Box<dyn StdError + Send + Sync>)?;

            Ok(Box::new(allowed.into_iter()) as Addrs)
        })
    }
}

/// Pure filtering step, split out from [`GuardedResolver::resolve`] so it
/// can be exercised with synthetic addresses instead of a live resolver.
fn filter_addrs(
    addrs: Vec<SocketAddr>,
    allow_private_ips: bool,
) -> std::io::Result<Vec<SocketAddr>> {
    if allow_private_ips {
        return Ok(addrs);
    }

    let allowed: Vec<SocketAddr> = addrs
        .into_iter()
        .filter(|addr| !is_disallowed_ip(&addr.ip()))
        .collect();

    if allowed.is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "every resolved address is in a disallowed range",
        ));
    }

    Ok(allowed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, SocketAddrV4};

    fn addr(ip: [u8; 4]) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(
            Ipv4Addr::new(ip[0], ip[1], ip[2], ip[3]),
            0,
        ))
    }

    #[test]
    fn rejects_when_every_address_is_disallowed() {
        let addrs = vec![addr([127, 0, 0, 1]), addr([10, 0, 0, 5])];
        assert!(filter_addrs(addrs, false).is_err());
    }

    #[test]
    fn keeps_public_addresses_and_drops_private_ones() {
        let addrs = vec![addr([93, 184, 216, 34]), addr([10, 0, 0, 5])];
        let allowed = filter_addrs(addrs, false).unwrap();
        assert_eq!(allowed, vec![addr([93, 184, 216, 34])]);
    }

    #[test]
    fn passes_everything_through_when_private_ips_allowed() {
        let addrs = vec![addr([127, 0, 0, 1])];
        let allowed = filter_addrs(addrs, true).unwrap();
        assert_eq!(allowed, addrs);
    }
}
