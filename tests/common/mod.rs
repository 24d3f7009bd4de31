//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::extract::connect_info::MockConnectInfo;
use axum::Router;

use wiki_ingress::config::loader::parse_config;
use wiki_ingress::http::server::{build_router, default_dispatcher, AppState};
use wiki_ingress::http::{RawTransport, WebRequest};
use wiki_ingress::{Site, SiteConfig};

/// Compile a site from TOML, panicking on any config error.
pub fn site_from_toml(toml: &str) -> Arc<Site> {
    let config = parse_config(toml).expect("test config should parse");
    Arc::new(Site::compile(config).expect("test config should compile"))
}

/// The default site.
pub fn default_site() -> Arc<Site> {
    Arc::new(Site::compile(SiteConfig::default()).expect("defaults compile"))
}

/// A GET transport for `uri` from a public client address.
pub fn get(uri: &str) -> RawTransport {
    let builder = RawTransport::builder()
        .method("GET")
        .request_uri(uri)
        .remote_addr("198.51.100.20")
        .header("Host", "wiki.example.org");
    match uri.split_once('?') {
        Some((_, query)) => builder.query_string(query).build(),
        None => builder.build(),
    }
}

/// Build a request over `transport` and run title interpolation.
pub fn prepared(site: Arc<Site>, transport: RawTransport) -> WebRequest {
    let mut request = WebRequest::faux(site, transport);
    request
        .interpolate_title()
        .expect("transport has a request URL");
    request
}

/// An in-process app over `site` whose requests appear to come from `peer`.
pub fn app(site: Arc<Site>, peer: SocketAddr) -> Router {
    let dispatcher = default_dispatcher(&site);
    let state = AppState::new(Arc::new(ArcSwap::new(site)), dispatcher);
    build_router(state, std::time::Duration::from_secs(5)).layer(MockConnectInfo(peer))
}
