//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for a wiki site's
//! ingress layer. All types derive Serde traits for deserialization from
//! config files, and every section falls back to its defaults when omitted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::routing::entry_point::EntryPointDescriptor;

/// Root configuration for a site.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Listener and origin settings.
    pub server: ServerConfig,

    /// URL layout and path templates.
    pub paths: PathsConfig,

    /// Entry points in priority order.
    pub entry_points: Vec<EntryPointDescriptor>,

    /// Entry point used when no prefix matches. The only one allowed an empty prefix.
    pub default_entry_point: String,

    /// Proxy trust settings.
    pub proxies: ProxiesConfig,

    /// Request parsing settings.
    pub request: RequestConfig,

    /// Cookie naming and attributes.
    pub cookies: CookiesConfig,

    /// REST entry point settings.
    pub rest: RestConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            paths: PathsConfig::default(),
            entry_points: default_entry_points(),
            default_entry_point: "index".to_string(),
            proxies: ProxiesConfig::default(),
            request: RequestConfig::default(),
            cookies: CookiesConfig::default(),
            rest: RestConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

fn default_entry_points() -> Vec<EntryPointDescriptor> {
    vec![
        EntryPointDescriptor::new("api", "/w/api.php"),
        EntryPointDescriptor::new("rest", "/w/rest.php"),
        EntryPointDescriptor::new("load", "/w/load.php"),
        EntryPointDescriptor::new("thumb", "/w/thumb.php"),
        EntryPointDescriptor::new("thumb_handler", "/w/thumb_handler.php"),
        EntryPointDescriptor::new("opensearch_desc", "/w/opensearch_desc.php"),
        EntryPointDescriptor::new("index", ""),
    ]
}

/// Listener and origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Whether the listener itself is reached over TLS (sets the HTTPS transport field).
    pub https: bool,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Canonical origin (e.g., "https://wiki.example.org"). Detected per request when unset.
    pub canonical_server: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            https: false,
            request_timeout_secs: 30,
            canonical_server: None,
        }
    }
}

/// URL layout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Base path of the entry point scripts.
    pub script_path: String,

    /// Path of the page-view script.
    pub script: String,

    /// Prefer PATH_INFO over the request URL when detecting entry points.
    pub use_path_info: bool,

    /// Short URL for page views; must contain `$1`.
    pub article_path: String,

    /// Optional template using `$title` and `$action` (e.g. "/wiki/$action/$title").
    pub article_path_with_action: Option<String>,

    /// Actions accepted by `article_path_with_action`.
    pub valid_actions: Vec<String>,

    /// Per-action URL templates, keyed by action name.
    pub action_paths: BTreeMap<String, String>,

    /// Template for language-variant URLs; `$2` is the variant.
    pub variant_article_path: Option<String>,

    /// Known language variants.
    pub variants: Vec<String>,

    /// Additional routes, tried after action paths.
    pub extra_router_paths: Vec<ExtraRouteConfig>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            script_path: "/w".to_string(),
            script: "/w/index.php".to_string(),
            use_path_info: true,
            article_path: "/wiki/$1".to_string(),
            article_path_with_action: None,
            valid_actions: ["view", "edit", "history", "info", "raw", "purge", "watch", "unwatch"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            action_paths: BTreeMap::new(),
            variant_article_path: None,
            variants: Vec::new(),
            extra_router_paths: Vec::new(),
        }
    }
}

/// An additional path template.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtraRouteConfig {
    /// Template, e.g. "/rev/$id".
    pub template: String,

    /// Output parameters (`name -> value template`).
    pub params: BTreeMap<String, String>,

    /// Finite-set constraints per placeholder.
    pub one_of: BTreeMap<String, Vec<String>>,

    /// Regex constraints per placeholder (anchored).
    pub patterns: BTreeMap<String, String>,
}

/// Proxy trust configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxiesConfig {
    /// This installation's own proxies (IPs or CIDR ranges).
    pub cdn_servers: Vec<String>,

    /// Additional trusted forwarders (IPs or CIDR ranges).
    pub trusted_proxies: Vec<String>,

    /// Accept private addresses from X-Forwarded-For.
    pub use_private_ips: bool,

    /// Ignore explicit ports when a forwarded protocol header is present.
    pub assume_proxies_use_default_protocol_ports: bool,
}

impl Default for ProxiesConfig {
    fn default() -> Self {
        Self {
            cdn_servers: Vec::new(),
            trusted_proxies: Vec::new(),
            use_private_ips: false,
            assume_proxies_use_default_protocol_ports: true,
        }
    }
}

/// Request parsing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Honor a client-supplied X-Request-Id header.
    pub allow_external_req_id: bool,

    /// 8-bit encoding used to repair non-UTF-8 query values. Empty disables repair.
    pub legacy_encoding: String,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            allow_external_req_id: false,
            legacy_encoding: "windows-1252".to_string(),
        }
    }
}

/// Cookie configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CookiesConfig {
    /// Prefix prepended to every cookie name.
    pub prefix: String,

    /// Cookie domain; empty for host-only cookies.
    pub domain: String,

    /// Cookie path.
    pub path: String,

    /// Set the Secure attribute.
    pub secure: bool,

    /// Set the HttpOnly attribute.
    pub http_only: bool,

    /// Fall back to "ss0-" prefixed cookies for cross-site reads.
    pub use_same_site_legacy_cookies: bool,
}

impl Default for CookiesConfig {
    fn default() -> Self {
        Self {
            prefix: "wiki".to_string(),
            domain: String::new(),
            path: "/".to_string(),
            secure: false,
            http_only: true,
            use_same_site_legacy_cookies: false,
        }
    }
}

/// REST entry point configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RestConfig {
    /// Send `Access-Control-Allow-Origin: *` on REST responses.
    pub allow_cross_origin: bool,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: SiteConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
        assert_eq!(config.paths.article_path, "/wiki/$1");
        assert_eq!(config.default_entry_point, "index");
        assert_eq!(config.entry_points.last().unwrap().prefix, "");
        assert_eq!(config.request.legacy_encoding, "windows-1252");
    }

    #[test]
    fn test_partial_sections() {
        let config: SiteConfig = toml::from_str(
            r#"
            [paths]
            article_path = "/view/$1"
            variants = ["zh-hans", "zh-hant"]
            variant_article_path = "/$2/$1"

            [paths.action_paths]
            edit = "/edit/$1"

            [[paths.extra_router_paths]]
            template = "/rev/$id"
            params = { oldid = "$id" }
            patterns = { id = "[0-9]+" }

            [[entry_points]]
            name = "api"
            prefix = "/api.php"

            [[entry_points]]
            name = "index"
            prefix = ""

            [proxies]
            cdn_servers = ["10.0.0.0/8"]
            "#,
        )
        .unwrap();

        assert_eq!(config.paths.article_path, "/view/$1");
        assert!(config.paths.use_path_info);
        assert_eq!(config.paths.action_paths["edit"], "/edit/$1");
        assert_eq!(config.paths.extra_router_paths[0].params["oldid"], "$id");
        assert_eq!(config.entry_points.len(), 2);
        assert_eq!(config.proxies.cdn_servers, vec!["10.0.0.0/8"]);
        assert!(config.proxies.assume_proxies_use_default_protocol_ports);
        assert_eq!(config.cookies.path, "/");
    }
}
