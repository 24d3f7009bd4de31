//! Prioritized path template matching.
//!
//! # Responsibilities
//! - Hold an ordered list of compiled path templates
//! - Resolve a concrete path to the first template that matches
//! - Distinguish the empty path from "nothing matched"
//!
//! # Design Decisions
//! - Registration order is priority order; first match wins
//! - No backtracking across templates
//! - Immutable once built, so it can be shared across requests without locks

use crate::error::RouteError;
use crate::routing::template::{decode, Constraint, PathTemplate};

/// Result of matching a path against a [`PathRouter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteMatch {
    /// The path was `""` or `"/"`; the caller should use its home resource.
    Empty,
    /// No template matched.
    NoMatch,
    /// A template matched.
    Matched {
        /// Index of the winning template, in registration order.
        template: usize,
        /// Output parameters, in the template's parameter order.
        params: Vec<(String, String)>,
    },
}

impl RouteMatch {
    /// Parameters bound by the match; empty for `Empty` and `NoMatch`.
    pub fn params(&self) -> &[(String, String)] {
        match self {
            RouteMatch::Matched { params, .. } => params,
            _ => &[],
        }
    }

    /// Look up a single bound parameter.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// An ordered set of path templates.
#[derive(Debug, Clone, Default)]
pub struct PathRouter {
    templates: Vec<PathTemplate>,
}

impl PathRouter {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template with its output parameters and constraints.
    pub fn add<P, K, V, C, N>(&mut self, template: &str, params: P, constraints: C) -> Result<(), RouteError>
    where
        P: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
        C: IntoIterator<Item = (N, Constraint)>,
        N: Into<String>,
    {
        let compiled = PathTemplate::new(
            template,
            params.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            constraints.into_iter().map(|(n, c)| (n.into(), c)).collect(),
        )?;
        tracing::trace!(template = %template, index = self.templates.len(), "Path template registered");
        self.templates.push(compiled);
        Ok(())
    }

    /// Register one template per `(key, template)` entry.
    ///
    /// The token `$key` in parameter values is replaced by the entry's key,
    /// so `{edit: "/edit/$1"}` with `action = $key` yields `action = edit`.
    pub fn add_keyed<'a, I>(&mut self, templates: I, params: &[(&str, &str)]) -> Result<(), RouteError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (key, template) in templates {
            let expanded: Vec<(String, String)> = params
                .iter()
                .map(|(name, value)| (name.to_string(), value.replace("$key", key)))
                .collect();
            self.add(template, expanded, Vec::<(String, Constraint)>::new())?;
        }
        Ok(())
    }

    /// Number of registered templates.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Returns true if no templates are registered.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Registered templates, in priority order.
    pub fn templates(&self) -> &[PathTemplate] {
        &self.templates
    }

    /// Match a path. Pure: depends only on the registered templates and `path`.
    pub fn parse(&self, path: &str) -> RouteMatch {
        if path.is_empty() || path == "/" {
            return RouteMatch::Empty;
        }

        for (index, template) in self.templates.iter().enumerate() {
            if let Some(params) = template.match_path(path) {
                return RouteMatch::Matched {
                    template: index,
                    params,
                };
            }
        }
        RouteMatch::NoMatch
    }
}

/// Check that an article-style path setting is usable.
pub fn validate_route(template: &str, setting: &str) -> Result<(), RouteError> {
    if !template.starts_with('/') {
        return Err(RouteError::MissingLeadingSlash(template.to_string()));
    }
    if !template.contains("$1") {
        return Err(RouteError::MissingTitlePlaceholder {
            setting: setting.to_string(),
            template: template.to_string(),
        });
    }
    Ok(())
}

/// Legacy prefix-style title extraction.
///
/// Each base is a URL prefix optionally ending in `$1`. The first base that
/// prefixes `path` with a non-empty remainder yields `title`, plus `key` set
/// to that base's key when `key` is given.
pub fn extract_title(path: &str, bases: &[(&str, &str)], key: Option<&str>) -> Vec<(String, String)> {
    for (key_value, base) in bases {
        let base = base.replace("$1", "");
        if let Some(raw) = path.strip_prefix(base.as_str()) {
            if !raw.is_empty() {
                let mut matches = vec![("title".to_string(), decode(raw))];
                if let Some(key) = key {
                    matches.push((key.to_string(), key_value.to_string()));
                }
                return matches;
            }
        }
    }
    Vec::new()
}
