//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → entry_point.rs (prefix table → entry point name + subpath)
//!     → matcher.rs (subpath → first matching template's params)
//!     → dispatch.rs (entry point name → handler)
//!
//! Route Compilation (at startup and on reload):
//!     PathsConfig
//!     → site_routes.rs (fixed registration order)
//!     → template.rs (parse + validate each template)
//!     → Freeze as immutable PathRouter
//! ```
//!
//! # Design Decisions
//! - Routes compiled eagerly; a bad template is a startup error
//! - Deterministic: same path always matches the same template
//! - First match wins (registration order)

pub mod dispatch;
pub mod entry_point;
pub mod matcher;
pub mod site_routes;
pub mod template;

pub use dispatch::{Dispatcher, EntryPointHandler};
pub use entry_point::{EntryPointDescriptor, EntryPointMatch, EntryPointRouter};
pub use matcher::{PathRouter, RouteMatch};
pub use template::{Constraint, PathTemplate};
