use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use url::Url;

use wiki_ingress::config::load_config;
use wiki_ingress::http::describe::describe;
use wiki_ingress::http::RawTransport;
use wiki_ingress::{Site, SiteConfig, WebRequest};

#[derive(Parser)]
#[command(name = "route-inspect")]
#[command(about = "Show how wiki-ingress routes a request, without a server", long_about = None)]
struct Cli {
    /// Configuration file; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Describe a single request as JSON
    Request {
        /// Absolute URL or path with optional query, e.g. /wiki/Main_Page?action=edit
        url: String,

        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Extra header as "Name: value"; repeatable
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        #[arg(long, default_value = "127.0.0.1")]
        remote_addr: String,

        /// Request body, sent as a form when the method is POST
        #[arg(short, long)]
        body: Option<String>,
    },
    /// List entry points and path templates in match order
    Routes,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => SiteConfig::default(),
    };
    let site = Arc::new(Site::compile(config)?);

    match cli.command {
        Commands::Request {
            url,
            method,
            headers,
            remote_addr,
            body,
        } => {
            let transport = build_transport(&url, &method, &headers, &remote_addr, body)?;
            let mut request = WebRequest::faux(site, transport);
            request.interpolate_title()?;
            let description = describe(&request)?;
            println!("{}", serde_json::to_string_pretty(&description)?);
        }
        Commands::Routes => {
            println!("Entry points (default: {}):", site.entry_points().default_name());
            for descriptor in site.entry_points().descriptors() {
                let prefix = if descriptor.prefix.is_empty() {
                    "(fallback)"
                } else {
                    descriptor.prefix.as_str()
                };
                println!("  {:<18} {}", descriptor.name, prefix);
            }
            println!("Path templates:");
            for (i, template) in site.path_router().templates().iter().enumerate() {
                println!("  {:>2}. {}", i + 1, template.source());
            }
        }
    }

    Ok(())
}

fn build_transport(
    url: &str,
    method: &str,
    headers: &[String],
    remote_addr: &str,
    body: Option<String>,
) -> Result<RawTransport, Box<dyn std::error::Error>> {
    let mut builder = RawTransport::builder()
        .method(method.to_ascii_uppercase())
        .remote_addr(remote_addr);

    let request_uri = match Url::parse(url) {
        Ok(parsed) => {
            if parsed.scheme() == "https" {
                builder = builder.https("on");
            }
            if let Some(host) = parsed.host_str() {
                let host = match parsed.port() {
                    Some(port) => format!("{host}:{port}"),
                    None => host.to_string(),
                };
                builder = builder.header("Host", host);
            }
            match parsed.query() {
                Some(query) => format!("{}?{}", parsed.path(), query),
                None => parsed.path().to_string(),
            }
        }
        Err(_) => url.to_string(),
    };

    if let Some((_, query)) = request_uri.split_once('?') {
        builder = builder.query_string(query);
    }
    builder = builder.request_uri(request_uri.as_str());

    for header in headers {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| format!("header must look like 'Name: value', got '{header}'"))?;
        builder = builder.header(name.trim(), value.trim());
    }

    if let Some(body) = body {
        if method.eq_ignore_ascii_case("POST") && !headers.iter().any(|h| h.to_ascii_lowercase().starts_with("content-type")) {
            builder = builder.header("Content-Type", "application/x-www-form-urlencoded");
        }
        builder = builder.body(body);
    }

    Ok(builder.build())
}
