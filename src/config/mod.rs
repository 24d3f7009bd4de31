//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize into SiteConfig)
//!     → Site::compile
//!         → validation.rs (semantic checks, builds the routers once)
//!     → Site shared via Arc
//!
//! On file change:
//!     watcher.rs ConfigWatcher signals a change
//!     → SiteReloader waits for the burst to settle, skips identical contents
//!     → loader.rs + Site::compile
//!     → the new Site is swapped into the ArcSwap
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{PathsConfig, SiteConfig};
