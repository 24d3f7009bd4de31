//! Per-request identifier.
//!
//! # Responsibilities
//! - Choose the request id once at ingress
//! - Let sub-requests (jobs, internal calls) reuse a parent's id
//!
//! # Design Decisions
//! - The id travels in an explicit context value, never a global
//! - A client-supplied `X-Request-Id` is only honored when configured
//! - Fallback ids are 24 random lowercase hex characters

use rand::Rng;

use crate::http::transport::RawTransport;

/// Header carrying the request id in both directions.
pub const X_REQUEST_ID: &str = "X-Request-Id";

const RANDOM_ID_LEN: usize = 24;

/// Context threaded through the handling of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    request_id: String,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
        }
    }

    /// Pick the id for a transport: `X-Request-Id` (if allowed), then
    /// `UNIQUE_ID`, then a random id. Empty values count as absent.
    pub fn from_transport(transport: &RawTransport, allow_external: bool) -> Self {
        let external = if allow_external {
            transport.header(X_REQUEST_ID).filter(|id| !id.is_empty())
        } else {
            None
        };

        let id = external
            .or_else(|| transport.unique_id().filter(|id| !id.is_empty()))
            .map(str::to_string)
            .unwrap_or_else(random_request_id);
        Self { request_id: id }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Overwrite the id, e.g. when a job resumes work begun by another request.
    pub fn set_request_id(&mut self, id: impl Into<String>) {
        self.request_id = id.into();
    }
}

/// 24 random lowercase hex characters.
pub fn random_request_id() -> String {
    let mut rng = rand::thread_rng();
    (0..RANDOM_ID_LEN)
        .map(|_| {
            let nibble: u32 = rng.gen_range(0..16);
            std::char::from_digit(nibble, 16).unwrap_or('0')
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_id_requires_opt_in() {
        let t = RawTransport::builder()
            .header("X-Request-Id", "from-client")
            .unique_id("from-server")
            .build();
        assert_eq!(RequestContext::from_transport(&t, true).request_id(), "from-client");
        assert_eq!(RequestContext::from_transport(&t, false).request_id(), "from-server");
    }

    #[test]
    fn test_empty_header_ignored() {
        let t = RawTransport::builder()
            .header("X-Request-Id", "")
            .unique_id("abc")
            .build();
        assert_eq!(RequestContext::from_transport(&t, true).request_id(), "abc");
    }

    #[test]
    fn test_random_fallback() {
        let ctx = RequestContext::from_transport(&RawTransport::default(), true);
        let id = ctx.request_id();
        assert_eq!(id.len(), 24);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(random_request_id(), random_request_id());
    }

    #[test]
    fn test_sub_request_override() {
        let parent = RequestContext::new("parent");
        let mut child = parent.clone();
        assert_eq!(child.request_id(), "parent");

        child.set_request_id("job-1");
        assert_eq!(child.request_id(), "job-1");
        assert_eq!(parent.request_id(), "parent");
    }
}
