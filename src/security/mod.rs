//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Transport remote address + X-Forwarded-For:
//!     → ip.rs (canonicalize each hop, classify public/private)
//!     → proxy.rs (walk the chain while hops are trusted)
//!     → Resolved client IP (cached per request)
//! ```
//!
//! # Design Decisions
//! - No trust in client input beyond configured proxies
//! - Fail closed when our own proxies report garbage

pub mod ip;
pub mod proxy;

pub use proxy::{resolve_client_ip, ProxyLookup, StaticProxyLookup};
