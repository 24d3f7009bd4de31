//! Wiki request ingress library.
//!
//! Turns raw HTTP requests into structured wiki requests: entry-point
//! detection, path template routing, parameter normalization, client IP
//! resolution through trusted proxies, and request identity.

pub mod config;
pub mod error;
pub mod http;
pub mod observability;
pub mod routing;
pub mod security;
pub mod site;

pub use config::schema::SiteConfig;
pub use error::{DispatchError, IpResolutionError, RequestError, RouteError};
pub use http::{HttpServer, WebRequest};
pub use site::Site;
