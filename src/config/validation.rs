//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Compile every path template and entry-point prefix once, so a bad
//!   route is reported before the site goes live
//! - Validate addresses, proxy ranges and encodings
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Pure function: SiteConfig → Result<CompiledRoutes, Vec<ValidationError>>
//! - The routers built while checking are handed back, so a site is compiled
//!   exactly once

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::SiteConfig;
use crate::error::RouteError;
use crate::http::query::legacy_encoding;
use crate::routing::entry_point::EntryPointRouter;
use crate::routing::matcher::PathRouter;
use crate::routing::site_routes::build_site_router;
use crate::security::proxy::{parse_net, InvalidProxyEntry, StaticProxyLookup};

/// A semantic problem in a site config.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is not a valid socket address: '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("entry point '{0}' is defined more than once")]
    DuplicateEntryPoint(String),

    #[error("default_entry_point must not be empty")]
    EmptyDefaultEntryPoint,

    #[error(transparent)]
    Proxy(#[from] InvalidProxyEntry),

    #[error("unknown legacy encoding '{0}'")]
    UnknownEncoding(String),

    #[error("canonical_server must be an absolute http or https URL (got '{0}')")]
    InvalidCanonicalServer(String),
}

/// What validation built along the way.
#[derive(Debug, Clone)]
pub struct CompiledRoutes {
    pub path_router: PathRouter,
    pub entry_points: EntryPointRouter,
    pub proxies: StaticProxyLookup,
}

/// Check `config` and build its routers, reporting every problem found.
pub fn compile_config(config: &SiteConfig) -> Result<CompiledRoutes, Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "server.bind_address",
            value: config.server.bind_address.clone(),
        });
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::Zero("server.request_timeout_secs"));
    }
    if let Some(canonical) = &config.server.canonical_server {
        let valid = url::Url::parse(canonical)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
            .unwrap_or(false);
        if !valid {
            errors.push(ValidationError::InvalidCanonicalServer(canonical.clone()));
        }
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    let path_router = build_site_router(&config.paths)
        .map_err(|e| errors.push(e.into()))
        .ok();

    if config.default_entry_point.is_empty() {
        errors.push(ValidationError::EmptyDefaultEntryPoint);
    }
    let mut seen = HashSet::new();
    for descriptor in &config.entry_points {
        if !seen.insert(descriptor.name.as_str()) {
            errors.push(ValidationError::DuplicateEntryPoint(descriptor.name.clone()));
        }
    }
    let entry_points =
        EntryPointRouter::new(config.entry_points.clone(), config.default_entry_point.clone())
            .map_err(|e| errors.push(e.into()))
            .ok();

    let mut nets = |entries: &[String]| {
        entries
            .iter()
            .filter_map(|entry| parse_net(entry).map_err(|e| errors.push(e.into())).ok())
            .collect::<Vec<_>>()
    };
    let configured = nets(&config.proxies.cdn_servers);
    let trusted = nets(&config.proxies.trusted_proxies);

    let label = &config.request.legacy_encoding;
    if !label.is_empty() && legacy_encoding(label).is_none() {
        errors.push(ValidationError::UnknownEncoding(label.clone()));
    }

    match (path_router, entry_points) {
        (Some(path_router), Some(entry_points)) if errors.is_empty() => Ok(CompiledRoutes {
            path_router,
            entry_points,
            proxies: StaticProxyLookup::new(configured, trusted),
        }),
        _ => Err(errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::entry_point::EntryPointDescriptor;
    use crate::security::proxy::ProxyLookup;

    #[test]
    fn test_default_config_is_valid() {
        let compiled = compile_config(&SiteConfig::default()).unwrap();
        assert_eq!(compiled.path_router.len(), 1);
        assert_eq!(compiled.entry_points.default_name(), "index");
    }

    #[test]
    fn test_compiled_parts_follow_config() {
        let mut config = SiteConfig::default();
        config.paths.action_paths.insert("edit".into(), "/edit/$1".into());
        config.proxies.cdn_servers = vec!["10.0.0.0/8".into()];
        config.proxies.trusted_proxies = vec!["192.0.2.7".into()];

        let compiled = compile_config(&config).unwrap();
        assert_eq!(compiled.path_router.len(), 2);
        assert!(compiled.proxies.is_configured_proxy("10.9.8.7".parse().unwrap()));
        assert!(!compiled.proxies.is_configured_proxy("192.0.2.7".parse().unwrap()));
        assert!(compiled.proxies.is_trusted_proxy("192.0.2.7".parse().unwrap()));
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = SiteConfig::default();
        config.server.bind_address = "not an address".into();
        config.server.request_timeout_secs = 0;
        config.paths.article_path = "/wiki/".into();
        config.entry_points = vec![
            EntryPointDescriptor::new("api", ""),
            EntryPointDescriptor::new("index", ""),
            EntryPointDescriptor::new("index", "/x"),
        ];
        config.proxies.cdn_servers = vec!["10.0.0.0/33".into()];
        config.request.legacy_encoding = "klingon".into();
        config.server.canonical_server = Some("wiki.example.org".into());

        let errors = compile_config(&config).unwrap_err();
        assert_eq!(errors.len(), 8, "{errors:?}");
        assert!(errors.contains(&ValidationError::DuplicateEntryPoint("index".into())));
        assert!(errors.contains(&ValidationError::Route(RouteError::EmptyEntryPointPrefix("api".into()))));
        assert!(errors.contains(&ValidationError::UnknownEncoding("klingon".into())));
    }

    #[test]
    fn test_metrics_address_only_checked_when_enabled() {
        let mut config = SiteConfig::default();
        config.observability.metrics_address = "nope".into();
        assert!(compile_config(&config).is_err());
        config.observability.metrics_enabled = false;
        assert!(compile_config(&config).is_ok());
    }
}
