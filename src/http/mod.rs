//! HTTP request handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, snapshot into transport.rs)
//!     → request.rs (WebRequest: URL, path, entry point, interpolation)
//!         ├── query.rs + normalize.rs + params.rs (parameter store)
//!         ├── origin.rs (protocol, host, port)
//!         ├── accept_language.rs
//!         └── request_id.rs (RequestContext)
//!     → [routing::dispatch picks the entry-point handler]
//!     → response.rs (RealResponse / FauxResponse)
//!     → Send to client
//! ```

pub mod accept_language;
pub mod describe;
pub mod normalize;
pub mod origin;
pub mod params;
pub mod query;
pub mod request;
pub mod request_id;
pub mod response;
pub mod server;
pub mod transport;

pub use describe::{describe, DescribeHandler, RequestDescription};
pub use params::{ParamValue, ParameterStore};
pub use request::WebRequest;
pub use request_id::{RequestContext, X_REQUEST_ID};
pub use response::{CookieOptions, FauxResponse, RealResponse, WebResponse};
pub use server::HttpServer;
pub use transport::RawTransport;
