//! IP address canonicalization and classification.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Parse an address claim: trims whitespace and `[ ]`, maps IPv4-mapped IPv6
/// to IPv4.
pub fn canonicalize(raw: &str) -> Option<IpAddr> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(trimmed);
    match trimmed.parse::<IpAddr>().ok()? {
        IpAddr::V6(v6) => Some(match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        }),
        v4 => Some(v4),
    }
}

/// Like [`canonicalize`], but any spelling of the IPv6 loopback becomes 127.0.0.1.
pub fn canonicalize_hop(raw: &str) -> Option<IpAddr> {
    match canonicalize(raw)? {
        IpAddr::V6(v6) if v6 == Ipv6Addr::LOCALHOST => Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        ip => Some(ip),
    }
}

/// True if `raw` is a valid, globally routable address.
pub fn is_public(raw: &str) -> bool {
    canonicalize(raw).map(is_public_addr).unwrap_or(false)
}

pub fn is_public_addr(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            !(a == 10
                || (a == 172 && (16..=31).contains(&b))
                || (a == 192 && b == 168)
                || a == 127
                || a == 0
                || (a == 169 && b == 254))
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            !((first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80
                || v6.is_loopback()
                || v6.is_unspecified())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize() {
        assert_eq!(canonicalize(" 1.2.3.4 "), Some("1.2.3.4".parse().unwrap()));
        assert_eq!(canonicalize("[2001:db8::1]"), Some("2001:db8::1".parse().unwrap()));
        assert_eq!(canonicalize("::ffff:10.1.2.3"), Some("10.1.2.3".parse().unwrap()));
        assert_eq!(canonicalize("unknown"), None);
        assert_eq!(canonicalize(""), None);
    }

    #[test]
    fn test_loopback_hop() {
        let lo: IpAddr = "127.0.0.1".parse().unwrap();
        assert_eq!(canonicalize_hop("::1"), Some(lo));
        assert_eq!(canonicalize_hop("0:0:0:0:0:0:0:1"), Some(lo));
        assert_eq!(canonicalize_hop("[::1]"), Some(lo));
        assert_eq!(canonicalize("::1"), Some("::1".parse().unwrap()));
    }

    #[test]
    fn test_is_public() {
        for private in [
            "10.0.0.1",
            "172.16.5.4",
            "172.31.255.255",
            "192.168.1.1",
            "127.0.0.1",
            "0.1.2.3",
            "169.254.0.1",
            "fd00::1",
            "fe80::1",
            "::1",
            "::",
            "garbage",
        ] {
            assert!(!is_public(private), "{private} should not be public");
        }
        for public in ["8.8.8.8", "172.32.0.1", "2001:db8::1"] {
            assert!(is_public(public), "{public} should be public");
        }
    }
}
