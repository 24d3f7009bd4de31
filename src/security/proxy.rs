//! Client IP resolution through trusted proxies.
//!
//! # Responsibilities
//! - Decide which forwarding hops are trusted
//! - Walk the X-Forwarded-For chain from the server outward to find the
//!   original client
//!
//! # Design Decisions
//! - Chain order is `[remote] ++ reverse(xff)`, nearest hop first
//! - Traversal stops at the first untrusted hop; what it has is the answer
//! - Once past our own configured proxies a broken chain ends quietly, but a
//!   broken hop reported by one of them is treated as spoofing and fails

use std::net::IpAddr;

use ipnet::IpNet;
use thiserror::Error;

use crate::error::IpResolutionError;
use crate::security::ip::{canonicalize, canonicalize_hop, is_public};

/// Trust predicates over proxy addresses.
///
/// Every configured proxy must also be trusted.
pub trait ProxyLookup: Send + Sync {
    /// Proxies operated by this installation (CDN, load balancers).
    fn is_configured_proxy(&self, ip: IpAddr) -> bool;

    /// Any proxy whose forwarded-for claims are believed.
    fn is_trusted_proxy(&self, ip: IpAddr) -> bool;
}

/// A proxy list entry that is neither an IP nor a CIDR range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid proxy address or range '{0}'")]
pub struct InvalidProxyEntry(pub String);

/// Proxy lookup backed by fixed address ranges.
#[derive(Debug, Clone, Default)]
pub struct StaticProxyLookup {
    configured: Vec<IpNet>,
    trusted: Vec<IpNet>,
}

impl StaticProxyLookup {
    /// `configured` ranges are trusted as well.
    pub fn new(configured: Vec<IpNet>, trusted: Vec<IpNet>) -> Self {
        Self { configured, trusted }
    }
}

impl ProxyLookup for StaticProxyLookup {
    fn is_configured_proxy(&self, ip: IpAddr) -> bool {
        self.configured.iter().any(|net| net.contains(&ip))
    }

    fn is_trusted_proxy(&self, ip: IpAddr) -> bool {
        self.is_configured_proxy(ip) || self.trusted.iter().any(|net| net.contains(&ip))
    }
}

/// Parse `1.2.3.4`, `2001:db8::1` or `10.0.0.0/8`.
pub fn parse_net(entry: &str) -> Result<IpNet, InvalidProxyEntry> {
    let entry = entry.trim();
    if let Ok(net) = entry.parse::<IpNet>() {
        return Ok(net.trunc());
    }
    let addr = entry
        .parse::<IpAddr>()
        .map_err(|_| InvalidProxyEntry(entry.to_string()))?;
    let prefix = if addr.is_ipv4() { 32 } else { 128 };
    IpNet::new(addr, prefix).map_err(|_| InvalidProxyEntry(entry.to_string()))
}

/// Resolve the original client address.
///
/// `remote` is the transport's peer address, `forwarded_for` the raw
/// X-Forwarded-For header. Private next hops are only followed when
/// `allow_private` is set or the current hop is a configured proxy.
pub fn resolve_client_ip(
    remote: Option<&str>,
    forwarded_for: Option<&str>,
    lookup: &dyn ProxyLookup,
    allow_private: bool,
) -> Result<IpAddr, IpResolutionError> {
    let raw = remote
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or(IpResolutionError::Missing)?;
    if raw.contains(',') {
        return Err(IpResolutionError::MultipleRemoteAddresses(raw.to_string()));
    }
    // The remote address keeps its own loopback spelling; only chain hops fold `::1`.
    let remote_ip = canonicalize(raw).ok_or(IpResolutionError::Missing)?;

    let Some(forwarded_for) = forwarded_for else {
        return Ok(remote_ip);
    };
    let mut ip = Some(remote_ip);

    let mut chain: Vec<&str> = vec![raw];
    chain.extend(forwarded_for.split(',').map(str::trim).rev());

    for (i, hop) in chain.iter().enumerate() {
        let Some(current) = canonicalize_hop(hop) else {
            break;
        };
        let Some(next) = chain.get(i + 1) else {
            break;
        };
        if *next == "unknown" || !lookup.is_trusted_proxy(current) {
            break;
        }

        let configured = lookup.is_configured_proxy(current);
        if !(is_public(next) || allow_private || configured) {
            break;
        }
        ip = canonicalize_hop(next);
        if ip.is_none() && configured {
            tracing::warn!(xff = %forwarded_for, hop = %current, "Invalid IP reported by configured proxy");
            return Err(IpResolutionError::InvalidForwardedFor(forwarded_for.to_string()));
        }
    }

    ip.ok_or(IpResolutionError::Unresolvable)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(configured: &[&str], trusted: &[&str]) -> StaticProxyLookup {
        let nets = |entries: &[&str]| -> Vec<IpNet> {
            entries.iter().map(|e| parse_net(e).unwrap()).collect()
        };
        StaticProxyLookup::new(nets(configured), nets(trusted))
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_no_forwarded_header() {
        let l = lookup(&[], &[]);
        assert_eq!(resolve_client_ip(Some("8.8.8.8"), None, &l, false), Ok(ip("8.8.8.8")));
        assert_eq!(resolve_client_ip(Some("::1"), None, &l, false), Ok(ip("::1")));
    }

    #[test]
    fn test_loopback_remote_spelling() {
        let l = lookup(&[], &[]);
        let got = resolve_client_ip(Some("::1"), Some("8.8.8.8"), &l, false);
        assert_eq!(got, Ok(ip("::1")));
        let got = resolve_client_ip(Some("::ffff:127.0.0.1"), None, &l, false);
        assert_eq!(got, Ok(ip("127.0.0.1")));

        // Trust is still checked against the folded form.
        let l = lookup(&[], &["127.0.0.1"]);
        let got = resolve_client_ip(Some("::1"), Some("8.8.8.8"), &l, false);
        assert_eq!(got, Ok(ip("8.8.8.8")));
    }

    #[test]
    fn test_missing_or_ambiguous_remote() {
        let l = lookup(&[], &[]);
        assert_eq!(resolve_client_ip(None, None, &l, false), Err(IpResolutionError::Missing));
        assert_eq!(resolve_client_ip(Some(""), None, &l, false), Err(IpResolutionError::Missing));
        assert_eq!(
            resolve_client_ip(Some("1.2.3.4, 5.6.7.8"), None, &l, false),
            Err(IpResolutionError::MultipleRemoteAddresses("1.2.3.4, 5.6.7.8".into()))
        );
    }

    #[test]
    fn test_untrusted_remote_ignores_xff() {
        let l = lookup(&[], &[]);
        let got = resolve_client_ip(Some("8.8.8.8"), Some("1.1.1.1"), &l, false);
        assert_eq!(got, Ok(ip("8.8.8.8")));
    }

    #[test]
    fn test_chain_stops_after_last_trusted_hop() {
        // chain [A, B, C]: A and B trusted, C is the client.
        let l = lookup(&[], &["203.0.113.1", "203.0.113.2"]);
        let got = resolve_client_ip(Some("203.0.113.1"), Some("198.51.100.7, 203.0.113.2"), &l, false);
        assert_eq!(got, Ok(ip("198.51.100.7")));
    }

    #[test]
    fn test_untrusted_middle_hop_stops() {
        let l = lookup(&[], &["203.0.113.1"]);
        let got = resolve_client_ip(Some("203.0.113.1"), Some("198.51.100.7, 203.0.113.9"), &l, false);
        assert_eq!(got, Ok(ip("203.0.113.9")));
    }

    #[test]
    fn test_private_next_hop() {
        let l = lookup(&[], &["203.0.113.1"]);
        let remote = Some("203.0.113.1");
        assert_eq!(resolve_client_ip(remote, Some("10.0.0.5"), &l, false), Ok(ip("203.0.113.1")));
        assert_eq!(resolve_client_ip(remote, Some("10.0.0.5"), &l, true), Ok(ip("10.0.0.5")));

        let l = lookup(&["203.0.113.1"], &[]);
        assert_eq!(resolve_client_ip(remote, Some("10.0.0.5"), &l, false), Ok(ip("10.0.0.5")));
    }

    #[test]
    fn test_unknown_hop_stops() {
        let l = lookup(&["10.0.0.1"], &[]);
        let got = resolve_client_ip(Some("10.0.0.1"), Some("unknown"), &l, false);
        assert_eq!(got, Ok(ip("10.0.0.1")));
    }

    #[test]
    fn test_invalid_hop_from_configured_proxy_is_fatal() {
        let l = lookup(&["10.0.0.0/8"], &[]);
        let got = resolve_client_ip(Some("10.0.0.1"), Some("not-an-ip"), &l, false);
        assert_eq!(got, Err(IpResolutionError::InvalidForwardedFor("not-an-ip".into())));
    }

    #[test]
    fn test_invalid_hop_from_trusted_proxy_is_unresolvable() {
        let l = lookup(&[], &["10.0.0.1"]);
        let got = resolve_client_ip(Some("10.0.0.1"), Some("not-an-ip"), &l, true);
        assert_eq!(got, Err(IpResolutionError::Unresolvable));
    }

    #[test]
    fn test_lookup_entries() {
        let l = lookup(&["10.0.0.0/8"], &["192.0.2.1", "2001:db8::/32"]);
        assert!(l.is_configured_proxy(ip("10.9.8.7")));
        assert!(l.is_trusted_proxy(ip("10.9.8.7")));
        assert!(l.is_trusted_proxy(ip("192.0.2.1")));
        assert!(l.is_trusted_proxy(ip("2001:db8::5")));
        assert!(!l.is_configured_proxy(ip("192.0.2.1")));
        assert_eq!(parse_net("nope"), Err(InvalidProxyEntry("nope".into())));
    }
}
