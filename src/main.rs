//! Wiki ingress service.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server (axum, TraceLayer, TimeoutLayer)
//!                        │
//!                        ▼
//!                     http::request::WebRequest
//!                        │  entry point, title interpolation, client IP
//!                        ▼
//!                     routing::dispatch ──▶ entry-point handler
//!                        │
//!     Client Response    ▼
//!     ◀────────────── http::response
//!
//!     config::watcher ──▶ SiteReloader (Site::compile) ──▶ ArcSwap<Site>
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use clap::Parser;
use tokio::net::TcpListener;

use wiki_ingress::config::load_config;
use wiki_ingress::config::watcher::{ConfigWatcher, SiteReloader};
use wiki_ingress::http::server::default_dispatcher;
use wiki_ingress::observability::{logging, metrics};
use wiki_ingress::{HttpServer, Site, SiteConfig};

#[derive(Parser, Debug)]
#[command(name = "wiki-ingress", version, about = "Front controller for wiki entry points")]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => SiteConfig::default(),
    };

    logging::init(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "wiki-ingress starting");

    tracing::info!(
        bind_address = %config.server.bind_address,
        entry_points = config.entry_points.len(),
        request_timeout_secs = config.server.request_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let bind_address = config.server.bind_address.clone();
    let site = Site::compile(config)?;
    let dispatcher = default_dispatcher(&site);
    let site = Arc::new(ArcSwap::from_pointee(site));

    // The watcher handle must outlive the server.
    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, changes) = ConfigWatcher::new(path);
            tokio::spawn(SiteReloader::new(path, site.clone()).run(changes));
            match watcher.run() {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::warn!(error = %e, "Config watcher unavailable, hot reload disabled");
                    None
                }
            }
        }
        None => None,
    };

    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    HttpServer::new(site, dispatcher).run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
