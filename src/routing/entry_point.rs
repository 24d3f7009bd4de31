//! Entry-point detection.
//!
//! # Responsibilities
//! - Map a request path to one of a fixed set of named entry points
//! - Derive the subpath that follows the entry point's prefix
//!
//! # Design Decisions
//! - Descriptor order is priority order; a later, more specific prefix never
//!   overrides an earlier match
//! - A prefix only matches on a `/` boundary or at end of path
//! - Exactly one descriptor, the default, may have an empty prefix; any other
//!   empty prefix is rejected when the router is built

use serde::{Deserialize, Serialize};

use crate::error::RouteError;

/// A named entry point and the path prefix that selects it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EntryPointDescriptor {
    pub name: String,
    pub prefix: String,
}

impl EntryPointDescriptor {
    pub fn new(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
        }
    }
}

/// The entry point chosen for a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryPointMatch {
    pub name: String,
    pub subpath: String,
}

/// Ordered prefix table of entry points.
#[derive(Debug, Clone)]
pub struct EntryPointRouter {
    descriptors: Vec<EntryPointDescriptor>,
    default: String,
}

impl EntryPointRouter {
    /// Build a router, failing on an empty prefix for any non-default entry point.
    pub fn new(descriptors: Vec<EntryPointDescriptor>, default: impl Into<String>) -> Result<Self, RouteError> {
        let default = default.into();
        for descriptor in &descriptors {
            if descriptor.prefix.is_empty() && descriptor.name != default {
                return Err(RouteError::EmptyEntryPointPrefix(descriptor.name.clone()));
            }
        }
        Ok(Self { descriptors, default })
    }

    /// Name of the fallback entry point.
    pub fn default_name(&self) -> &str {
        &self.default
    }

    pub fn descriptors(&self) -> &[EntryPointDescriptor] {
        &self.descriptors
    }

    /// Prefix configured for `name`, if any.
    pub fn prefix_of(&self, name: &str) -> Option<&str> {
        self.descriptors
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.prefix.as_str())
    }

    /// Select the entry point for `path`.
    pub fn detect(&self, path: &str) -> EntryPointMatch {
        for descriptor in &self.descriptors {
            if descriptor.prefix.is_empty() {
                continue;
            }
            if let Some(rest) = path.strip_prefix(descriptor.prefix.as_str()) {
                if rest.is_empty() || rest.starts_with('/') {
                    return EntryPointMatch {
                        name: descriptor.name.clone(),
                        subpath: rest.to_string(),
                    };
                }
            }
        }

        EntryPointMatch {
            name: self.default.clone(),
            subpath: path.to_string(),
        }
    }
}
