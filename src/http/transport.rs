//! Raw transport snapshot.
//!
//! # Responsibilities
//! - Hold everything the transport layer hands us for one request
//! - Provide case-insensitive header lookup
//!
//! # Design Decisions
//! - Immutable after build; every later stage reads from this value only
//! - Field names follow the CGI variables they replace (`REQUEST_URI`,
//!   `PATH_INFO`, ...) so rewrite setups map onto them directly
//! - Repeated headers are joined with ", " at build time

use std::time::SystemTime;

/// Immutable request metadata as delivered by the transport.
#[derive(Debug, Clone, Default)]
pub struct RawTransport {
    method: Option<String>,
    request_uri: Option<String>,
    script_name: Option<String>,
    query_string: Option<String>,
    path_info: Option<String>,
    orig_path_info: Option<String>,
    https: Option<String>,
    server_name: Option<String>,
    hostname: Option<String>,
    server_addr: Option<String>,
    server_port: Option<u16>,
    remote_addr: Option<String>,
    unique_id: Option<String>,
    request_time: Option<SystemTime>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl RawTransport {
    pub fn builder() -> RawTransportBuilder {
        RawTransportBuilder::default()
    }

    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    pub fn request_uri(&self) -> Option<&str> {
        self.request_uri.as_deref()
    }

    pub fn script_name(&self) -> Option<&str> {
        self.script_name.as_deref()
    }

    pub fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    pub fn path_info(&self) -> Option<&str> {
        self.path_info.as_deref()
    }

    pub fn orig_path_info(&self) -> Option<&str> {
        self.orig_path_info.as_deref()
    }

    /// The `HTTPS` variable: non-empty and not `off` means TLS.
    pub fn https(&self) -> Option<&str> {
        self.https.as_deref()
    }

    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    pub fn server_addr(&self) -> Option<&str> {
        self.server_addr.as_deref()
    }

    pub fn server_port(&self) -> Option<u16> {
        self.server_port
    }

    pub fn remote_addr(&self) -> Option<&str> {
        self.remote_addr.as_deref()
    }

    pub fn unique_id(&self) -> Option<&str> {
        self.unique_id.as_deref()
    }

    pub fn request_time(&self) -> Option<SystemTime> {
        self.request_time
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All headers, in arrival order, with repeats already joined.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Builder for [`RawTransport`].
#[derive(Debug, Clone, Default)]
pub struct RawTransportBuilder {
    inner: RawTransport,
}

impl RawTransportBuilder {
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.inner.method = Some(method.into());
        self
    }

    pub fn request_uri(mut self, uri: impl Into<String>) -> Self {
        self.inner.request_uri = Some(uri.into());
        self
    }

    pub fn script_name(mut self, name: impl Into<String>) -> Self {
        self.inner.script_name = Some(name.into());
        self
    }

    pub fn query_string(mut self, query: impl Into<String>) -> Self {
        self.inner.query_string = Some(query.into());
        self
    }

    pub fn path_info(mut self, path_info: impl Into<String>) -> Self {
        self.inner.path_info = Some(path_info.into());
        self
    }

    pub fn orig_path_info(mut self, path_info: impl Into<String>) -> Self {
        self.inner.orig_path_info = Some(path_info.into());
        self
    }

    pub fn https(mut self, https: impl Into<String>) -> Self {
        self.inner.https = Some(https.into());
        self
    }

    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.inner.server_name = Some(name.into());
        self
    }

    pub fn hostname(mut self, name: impl Into<String>) -> Self {
        self.inner.hostname = Some(name.into());
        self
    }

    pub fn server_addr(mut self, addr: impl Into<String>) -> Self {
        self.inner.server_addr = Some(addr.into());
        self
    }

    pub fn server_port(mut self, port: u16) -> Self {
        self.inner.server_port = Some(port);
        self
    }

    pub fn remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.inner.remote_addr = Some(addr.into());
        self
    }

    pub fn unique_id(mut self, id: impl Into<String>) -> Self {
        self.inner.unique_id = Some(id.into());
        self
    }

    pub fn request_time(mut self, time: SystemTime) -> Self {
        self.inner.request_time = Some(time);
        self
    }

    /// Add a header. A repeated name is joined onto the first with ", ".
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self
            .inner
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some((_, existing)) => {
                existing.push_str(", ");
                existing.push_str(&value);
            }
            None => self.inner.headers.push((name, value)),
        }
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.inner.body = body.into();
        self
    }

    pub fn build(self) -> RawTransport {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let t = RawTransport::builder()
            .header("X-Forwarded-For", "1.2.3.4")
            .header("x-forwarded-for", "5.6.7.8")
            .header("Host", "wiki.example.org")
            .build();
        assert_eq!(t.header("X-FORWARDED-FOR"), Some("1.2.3.4, 5.6.7.8"));
        assert_eq!(t.header("host"), Some("wiki.example.org"));
        assert_eq!(t.headers().len(), 2);
        assert_eq!(t.header("Cookie"), None);
    }

    #[test]
    fn test_unset_fields() {
        let t = RawTransport::builder().method("POST").body("a=1").build();
        assert_eq!(t.method(), Some("POST"));
        assert_eq!(t.body(), b"a=1");
        assert!(t.request_uri().is_none());
        assert!(t.server_port().is_none());
    }
}
