//! Compiled site state.
//!
//! A [`Site`] is a validated [`SiteConfig`] together with everything built
//! from it: the path router, the entry-point table, the proxy lookup and the
//! legacy encoding. It is immutable and shared across requests behind an
//! `Arc`; a config reload builds a new one.

use encoding_rs::Encoding;

use crate::config::loader::ConfigError;
use crate::config::schema::SiteConfig;
use crate::config::validation::{compile_config, CompiledRoutes};
use crate::http::query::legacy_encoding;
use crate::routing::entry_point::EntryPointRouter;
use crate::routing::matcher::PathRouter;
use crate::security::proxy::StaticProxyLookup;

#[derive(Debug, Clone)]
pub struct Site {
    config: SiteConfig,
    path_router: PathRouter,
    entry_points: EntryPointRouter,
    proxies: StaticProxyLookup,
    legacy_encoding: Option<&'static Encoding>,
}

impl Site {
    /// Validate `config` and build the site from it. This is the only place
    /// a config is validated.
    pub fn compile(config: SiteConfig) -> Result<Self, ConfigError> {
        let CompiledRoutes {
            path_router,
            entry_points,
            proxies,
        } = compile_config(&config).map_err(ConfigError::Validation)?;
        let legacy_encoding = legacy_encoding(&config.request.legacy_encoding);

        tracing::debug!(
            templates = path_router.len(),
            entry_points = entry_points.descriptors().len(),
            "Site compiled"
        );

        Ok(Self {
            config,
            path_router,
            entry_points,
            proxies,
            legacy_encoding,
        })
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn path_router(&self) -> &PathRouter {
        &self.path_router
    }

    pub fn entry_points(&self) -> &EntryPointRouter {
        &self.entry_points
    }

    pub fn proxies(&self) -> &StaticProxyLookup {
        &self.proxies
    }

    pub fn legacy_encoding(&self) -> Option<&'static Encoding> {
        self.legacy_encoding
    }
}
