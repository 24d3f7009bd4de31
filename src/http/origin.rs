//! Scheme, host and port detection.
//!
//! # Responsibilities
//! - Decide whether the request arrived over https
//! - Derive the canonical `scheme://host[:port]` origin from the transport
//!
//! # Design Decisions
//! - Only `HTTPS` and `X-Forwarded-Proto: https` signal TLS
//! - Host sources are tried in a fixed order; the first that parses wins
//! - With a forwarded protocol header and the default-ports setting on, an
//!   explicit port is ignored so internal proxy ports never leak into URLs

use std::fmt;
use std::net::Ipv6Addr;

use serde::Serialize;
use url::Host;

use crate::http::transport::RawTransport;
use crate::routing::template::decode;

/// URL scheme of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }

    pub fn standard_port(&self) -> u16 {
        match self {
            Protocol::Http => 80,
            Protocol::Https => 443,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn detect_protocol(transport: &RawTransport) -> Protocol {
    let direct = transport
        .https()
        .map(|v| !v.is_empty() && v != "off")
        .unwrap_or(false);
    let forwarded = transport.header("X-Forwarded-Proto") == Some("https");
    if direct || forwarded {
        Protocol::Https
    } else {
        Protocol::Http
    }
}

/// The request's origin, e.g. `https://wiki.example.org` or `http://[::1]:8080`.
pub fn detect_server(transport: &RawTransport, assume_default_ports: bool) -> String {
    let protocol = detect_protocol(transport);
    let std_port = protocol.standard_port();

    let candidates = [
        transport.header("Host"),
        transport.server_name(),
        transport.hostname(),
        transport.server_addr(),
    ];

    let mut host = "localhost".to_string();
    let mut port = std_port;
    for candidate in candidates.into_iter().flatten() {
        let Some((parsed_host, explicit_port)) = split_host_and_port(candidate) else {
            continue;
        };
        host = parsed_host;
        port = if assume_default_ports && transport.header("X-Forwarded-Proto").is_some() {
            std_port
        } else {
            explicit_port.or(transport.server_port()).unwrap_or(std_port)
        };
        break;
    }

    format!("{}://{}", protocol, combine_host_and_port(&host, port, std_port))
}

/// Split `host[:port]`, `[v6]:port` or a bare IPv6 address.
///
/// Returns `None` when the host is not a valid domain or IP, or the port is
/// not a number.
pub fn split_host_and_port(input: &str) -> Option<(String, Option<u16>)> {
    if let Some(rest) = input.strip_prefix('[') {
        let (addr, tail) = rest.split_once(']')?;
        addr.parse::<Ipv6Addr>().ok()?;
        let port = match tail {
            "" => None,
            t => Some(parse_port(t.strip_prefix(':')?)?),
        };
        return Some((addr.to_string(), port));
    }

    if input.matches(':').count() > 1 {
        input.parse::<Ipv6Addr>().ok()?;
        return Some((input.to_string(), None));
    }

    let (host, port) = match input.split_once(':') {
        Some((h, p)) => (h, Some(parse_port(p)?)),
        None => (input, None),
    };
    if host.is_empty() || Host::parse(host).is_err() {
        return None;
    }
    Some((host.to_string(), port))
}

fn parse_port(s: &str) -> Option<u16> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Join host and port, bracketing IPv6 and omitting the default port.
pub fn combine_host_and_port(host: &str, port: u16, default_port: u16) -> String {
    let host = if host.contains(':') {
        format!("[{host}]")
    } else {
        host.to_string()
    };
    if port == default_port {
        host
    } else {
        format!("{host}:{port}")
    }
}

/// The decoded part of `request_url`'s path after `base_path`, if it starts there.
pub fn request_path_suffix(request_url: &str, base_path: &str) -> Option<String> {
    let base = format!("{}/", base_path.trim_end_matches('/'));
    let path = request_url.split('?').next().unwrap_or(request_url);
    path.strip_prefix(base.as_str()).map(decode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_protocol() {
        assert_eq!(detect_protocol(&RawTransport::default()), Protocol::Http);
        let t = RawTransport::builder().https("on").build();
        assert_eq!(detect_protocol(&t), Protocol::Https);
        let t = RawTransport::builder().https("off").build();
        assert_eq!(detect_protocol(&t), Protocol::Http);
        let t = RawTransport::builder().header("X-Forwarded-Proto", "https").build();
        assert_eq!(detect_protocol(&t), Protocol::Https);
        let t = RawTransport::builder().header("X-Forwarded-Proto", "HTTPS").build();
        assert_eq!(detect_protocol(&t), Protocol::Http);
    }

    #[test]
    fn test_split_host_and_port() {
        assert_eq!(
            split_host_and_port("wiki.example.org:8080"),
            Some(("wiki.example.org".to_string(), Some(8080)))
        );
        assert_eq!(split_host_and_port("10.0.0.1"), Some(("10.0.0.1".to_string(), None)));
        assert_eq!(split_host_and_port("[::1]:81"), Some(("::1".to_string(), Some(81))));
        assert_eq!(split_host_and_port("::1"), Some(("::1".to_string(), None)));
        assert_eq!(split_host_and_port("host:abc"), None);
        assert_eq!(split_host_and_port("bad host"), None);
        assert_eq!(split_host_and_port(""), None);
        assert_eq!(split_host_and_port("[nope]:80"), None);
    }

    #[test]
    fn test_combine_host_and_port() {
        assert_eq!(combine_host_and_port("example.org", 80, 80), "example.org");
        assert_eq!(combine_host_and_port("example.org", 8080, 80), "example.org:8080");
        assert_eq!(combine_host_and_port("::1", 443, 443), "[::1]");
        assert_eq!(combine_host_and_port("::1", 8443, 443), "[::1]:8443");
    }

    #[test]
    fn test_detect_server_host_order() {
        let t = RawTransport::builder()
            .header("Host", "wiki.example.org")
            .server_name("internal")
            .build();
        assert_eq!(detect_server(&t, true), "http://wiki.example.org");

        let t = RawTransport::builder()
            .header("Host", "bad host")
            .server_name("fallback.example.org")
            .server_port(8080)
            .build();
        assert_eq!(detect_server(&t, true), "http://fallback.example.org:8080");

        assert_eq!(detect_server(&RawTransport::default(), true), "http://localhost");
    }

    #[test]
    fn test_forwarded_proto_uses_default_port() {
        let t = RawTransport::builder()
            .header("Host", "wiki.example.org:8443")
            .header("X-Forwarded-Proto", "https")
            .build();
        assert_eq!(detect_server(&t, true), "https://wiki.example.org");
        assert_eq!(detect_server(&t, false), "https://wiki.example.org:8443");
    }

    #[test]
    fn test_request_path_suffix() {
        assert_eq!(
            request_path_suffix("/w/img_auth.php/a/b%20c.png?x=1", "/w/img_auth.php/"),
            Some("a/b c.png".to_string())
        );
        assert_eq!(request_path_suffix("/wiki/Foo", "/w/img_auth.php"), None);
    }
}
