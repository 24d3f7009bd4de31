//! The per-request facade.
//!
//! # Responsibilities
//! - Own the transport snapshot, request context, parameters and response
//!   for one request
//! - Reconcile REQUEST_URI, PATH_INFO and SCRIPT_NAME into one request path
//! - Detect the entry point and interpolate routing parameters
//! - Resolve protocol, origin and client IP on first use and cache them
//!
//! # Design Decisions
//! - Everything is read from the immutable [`RawTransport`]; nothing global
//! - The response variant is chosen by the caller at construction
//! - Routing results are written into the parameter store so handlers read
//!   path-derived and query values the same way

use std::cell::OnceCell;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use url::form_urlencoded;

use crate::error::RequestError;
use crate::http::accept_language::parse_accept_language;
use crate::http::origin::{detect_protocol, detect_server, request_path_suffix, Protocol};
use crate::http::params::{ParamValue, ParameterStore};
use crate::http::query::{normalize_key, parse_cookies, ParamMap};
use crate::http::request_id::RequestContext;
use crate::http::response::{CookieOptions, FauxResponse, RealResponse, WebResponse};
use crate::http::transport::RawTransport;
use crate::routing::entry_point::EntryPointMatch;
use crate::routing::matcher::RouteMatch;
use crate::security::proxy::resolve_client_ip;
use crate::site::Site;

const SAFE_METHODS: [&str; 4] = ["GET", "HEAD", "OPTIONS", "TRACE"];

/// One inbound request.
#[derive(Debug)]
pub struct WebRequest {
    site: Arc<Site>,
    transport: RawTransport,
    context: RequestContext,
    params: ParameterStore,
    cookies: ParamMap,
    request_url: OnceCell<Option<String>>,
    protocol: OnceCell<Protocol>,
    ip: OnceCell<IpAddr>,
    entry_point: Option<EntryPointMatch>,
    bad_path: Option<String>,
    session_id: Option<String>,
    marked_as_safe: bool,
    response: Box<dyn WebResponse>,
    started: Instant,
}

impl WebRequest {
    /// Build a request over `transport`, writing output to `response`.
    pub fn new(site: Arc<Site>, transport: RawTransport, response: Box<dyn WebResponse>) -> Self {
        let context =
            RequestContext::from_transport(&transport, site.config().request.allow_external_req_id);
        let params = ParameterStore::from_transport(&transport, site.legacy_encoding());
        let cookies = transport
            .header("Cookie")
            .map(parse_cookies)
            .unwrap_or_default();

        Self {
            site,
            transport,
            context,
            params,
            cookies,
            request_url: OnceCell::new(),
            protocol: OnceCell::new(),
            ip: OnceCell::new(),
            entry_point: None,
            bad_path: None,
            session_id: None,
            marked_as_safe: false,
            response,
            started: Instant::now(),
        }
    }

    /// A request whose output goes over the wire.
    pub fn real(site: Arc<Site>, transport: RawTransport) -> Self {
        Self::new(site, transport, Box::new(RealResponse::new()))
    }

    /// A request whose output is only recorded.
    pub fn faux(site: Arc<Site>, transport: RawTransport) -> Self {
        Self::new(site, transport, Box::new(FauxResponse::new()))
    }

    /// Replace the request context, e.g. to carry a parent request's id.
    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    pub fn site(&self) -> &Site {
        &self.site
    }

    pub fn transport(&self) -> &RawTransport {
        &self.transport
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    pub fn request_id(&self) -> &str {
        self.context.request_id()
    }

    pub fn params(&self) -> &ParameterStore {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut ParameterStore {
        &mut self.params
    }

    // ---- URL and path ----

    /// The request URL path and query, as the client sent it, normalized.
    pub fn request_url(&self) -> Result<&str, RequestError> {
        self.request_url
            .get_or_init(|| global_request_url(&self.transport))
            .as_deref()
            .ok_or(RequestError::NoRequestUrl)
    }

    /// PATH_INFO (or ORIG_PATH_INFO), when path info is enabled.
    pub fn path_info(&self) -> Option<&str> {
        if !self.site.config().paths.use_path_info {
            return None;
        }
        self.transport
            .orig_path_info()
            .or_else(|| self.transport.path_info())
    }

    /// The path used for entry-point detection.
    ///
    /// PATH_INFO when enabled and present; otherwise the URL path with the
    /// script name stripped when what follows it starts with `/`; otherwise
    /// the URL path.
    pub fn request_path(&self) -> Result<String, RequestError> {
        if let Some(path_info) = self.path_info() {
            return Ok(path_info.to_string());
        }
        let url = self.request_url()?;
        Ok(parse_url_path(
            url,
            self.transport.script_name(),
            Some(self.site.config().paths.script.as_str()),
        ))
    }

    /// Decoded part of the request path after `base_path`, if under it.
    pub fn request_path_suffix(&self, base_path: &str) -> Result<Option<String>, RequestError> {
        Ok(request_path_suffix(self.request_url()?, base_path))
    }

    /// Detect and record the entry point for this request.
    pub fn detect_entry_point(&mut self) -> Result<&EntryPointMatch, RequestError> {
        let path = self.request_path()?;
        let detected = self.site.entry_points().detect(&path);
        tracing::debug!(
            request_id = %self.context.request_id(),
            entry_point = %detected.name,
            subpath = %detected.subpath,
            "Entry point detected"
        );
        let detected = self.entry_point.insert(detected);
        Ok(&*detected)
    }

    /// Force the entry point, deriving the subpath from `<script_path>/<name>.php`.
    pub fn set_entry_point(&mut self, name: &str) -> Result<(), RequestError> {
        let path = self.request_path()?;
        let prefix = format!("{}/{}.php", self.site.config().paths.script_path, name);
        let subpath = match path.strip_prefix(prefix.as_str()) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.to_string(),
            _ => path.clone(),
        };
        self.entry_point = Some(EntryPointMatch {
            name: name.to_string(),
            subpath,
        });
        Ok(())
    }

    /// Detected entry point name, or the default before detection.
    pub fn entry_point(&self) -> &str {
        self.entry_point
            .as_ref()
            .map(|m| m.name.as_str())
            .unwrap_or_else(|| self.site.entry_points().default_name())
    }

    /// Subpath within the entry point; empty before detection.
    pub fn entry_point_subpath(&self) -> &str {
        self.entry_point
            .as_ref()
            .map(|m| m.subpath.as_str())
            .unwrap_or("")
    }

    /// Match the entry-point subpath against the site's routes and record
    /// the resulting parameters. Skipped for the `api` entry point.
    pub fn interpolate_title(&mut self) -> Result<(), RequestError> {
        if self.entry_point.is_none() {
            self.detect_entry_point()?;
        }
        if self.entry_point() == "api" {
            return Ok(());
        }

        let subpath = self.entry_point_subpath().to_string();
        match self.site.path_router().parse(&subpath) {
            RouteMatch::Empty => {}
            RouteMatch::Matched { params, .. } => self.params.interpolate(&params),
            RouteMatch::NoMatch => {
                let path_info = self.path_info().map(str::to_string);
                let title = path_info
                    .as_deref()
                    .map(|p| p.strip_prefix('/').unwrap_or(p))
                    .unwrap_or("");
                if !title.is_empty() {
                    let title = title.to_string();
                    self.params.interpolate(&[("title".to_string(), title)]);
                } else if path_info.is_none() {
                    tracing::debug!(request_id = %self.context.request_id(), path = %subpath, "No route matched");
                    self.bad_path = Some(subpath);
                }
            }
        }
        Ok(())
    }

    /// Subpath that matched no route and had no PATH_INFO to fall back on.
    pub fn bad_path(&self) -> Option<&str> {
        self.bad_path.as_deref()
    }

    /// URL of this request with query values merged in, without `title`.
    pub fn append_query_value(&self, key: &str, value: &str) -> String {
        self.append_query_array(&[(key, value)])
    }

    /// Query-and-path values without `title`, overridden by `pairs`, form-encoded.
    pub fn append_query_array(&self, pairs: &[(&str, &str)]) -> String {
        let mut query = self.params.query_values().clone();
        query.remove("title");
        for (key, value) in pairs {
            query.insert(*key, ParamValue::from(*value));
        }

        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in query.iter() {
            match value {
                ParamValue::Scalar(s) => {
                    serializer.append_pair(key, s);
                }
                ParamValue::List(items) => {
                    for (i, item) in items.iter().enumerate() {
                        serializer.append_pair(&format!("{key}[{i}]"), item);
                    }
                }
            }
        }
        serializer.finish()
    }

    // ---- Origin ----

    pub fn protocol(&self) -> Protocol {
        *self.protocol.get_or_init(|| detect_protocol(&self.transport))
    }

    /// The detected `scheme://host[:port]` of this request.
    pub fn server(&self) -> String {
        detect_server(
            &self.transport,
            self.site
                .config()
                .proxies
                .assume_proxies_use_default_protocol_ports,
        )
    }

    /// Absolute URL: the canonical server (or detected origin) in this
    /// request's protocol, plus the request URL.
    pub fn full_request_url(&self) -> Result<String, RequestError> {
        let url = self.request_url()?;
        let server = match &self.site.config().server.canonical_server {
            Some(canonical) => {
                let host = canonical
                    .split_once("://")
                    .map(|(_, rest)| rest)
                    .unwrap_or(canonical);
                format!("{}://{}", self.protocol(), host.trim_end_matches('/'))
            }
            None => self.server(),
        };
        Ok(format!("{server}{url}"))
    }

    // ---- Headers, cookies, method ----

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.transport.header(name)
    }

    /// Header value split on commas and trimmed.
    pub fn header_list(&self, name: &str) -> Option<Vec<String>> {
        self.header(name)
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
    }

    /// All headers with upper-cased names.
    pub fn all_headers(&self) -> Vec<(String, String)> {
        self.transport
            .headers()
            .iter()
            .map(|(n, v)| (n.to_ascii_uppercase(), v.clone()))
            .collect()
    }

    /// Cookie `prefix + key`. `prefix` defaults to the configured cookie prefix.
    pub fn cookie(&self, key: &str, prefix: Option<&str>, default: Option<&str>) -> Option<String> {
        let prefix = prefix.unwrap_or(&self.site.config().cookies.prefix);
        self.cookie_value(&format!("{prefix}{key}"))
            .or_else(|| default.map(str::to_string))
    }

    /// Cookie for cross-site use, falling back to the legacy `ss0-` name
    /// when legacy SameSite cookies are enabled.
    pub fn cross_site_cookie(&self, key: &str, prefix: &str, default: Option<&str>) -> Option<String> {
        if let Some(value) = self.cookie_value(&format!("{prefix}{key}")) {
            return Some(value);
        }
        if self.site.config().cookies.use_same_site_legacy_cookies {
            if let Some(value) = self.cookie_value(&format!("{prefix}ss0-{key}")) {
                return Some(value);
            }
        }
        default.map(str::to_string)
    }

    fn cookie_value(&self, name: &str) -> Option<String> {
        self.cookies
            .get(&normalize_key(name))
            .and_then(ParamValue::as_scalar)
            .map(str::to_string)
    }

    /// Cookie options for this site, for [`WebResponse::set_cookie`].
    pub fn cookie_options(&self) -> CookieOptions {
        CookieOptions::from_config(&self.site.config().cookies)
    }

    /// HTTP method; `GET` when the transport has none.
    pub fn method(&self) -> &str {
        self.transport.method().unwrap_or("GET")
    }

    pub fn was_posted(&self) -> bool {
        self.method() == "POST"
    }

    /// GET, HEAD, OPTIONS or TRACE. False when the transport has no method.
    pub fn has_safe_method(&self) -> bool {
        self.transport
            .method()
            .map(|m| SAFE_METHODS.contains(&m))
            .unwrap_or(false)
    }

    /// Safe method, or a POST explicitly marked safe.
    pub fn is_safe_request(&self) -> bool {
        if self.marked_as_safe && self.was_posted() {
            return true;
        }
        self.has_safe_method()
    }

    pub fn mark_as_safe_request(&mut self) {
        self.marked_as_safe = true;
    }

    pub fn raw_query_string(&self) -> &str {
        self.transport.query_string().unwrap_or("")
    }

    /// Body of a POST; empty for other methods.
    pub fn raw_post_string(&self) -> &[u8] {
        if !self.was_posted() {
            return &[];
        }
        self.raw_input()
    }

    pub fn raw_input(&self) -> &[u8] {
        self.transport.body()
    }

    // ---- Client ----

    /// Accepted languages, highest preference first.
    pub fn accept_lang(&self) -> Vec<(String, f64)> {
        self.header("Accept-Language")
            .map(parse_accept_language)
            .unwrap_or_default()
    }

    /// The client IP, resolved through trusted proxies on first use.
    pub fn ip(&self) -> Result<IpAddr, RequestError> {
        if let Some(ip) = self.ip.get() {
            return Ok(*ip);
        }
        let resolved = resolve_client_ip(
            self.transport.remote_addr(),
            self.header("X-Forwarded-For"),
            self.site.proxies(),
            self.site.config().proxies.use_private_ips,
        )?;
        Ok(*self.ip.get_or_init(|| resolved))
    }

    /// Override the client IP.
    pub fn set_ip(&mut self, ip: IpAddr) {
        self.ip = OnceCell::from(ip);
    }

    /// Time since the transport received the request, or since construction.
    pub fn elapsed(&self) -> Duration {
        self.transport
            .request_time()
            .and_then(|t| SystemTime::now().duration_since(t).ok())
            .unwrap_or_else(|| self.started.elapsed())
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn set_session_id(&mut self, id: impl Into<String>) {
        self.session_id = Some(id.into());
    }

    // ---- Response ----

    pub fn response(&self) -> &dyn WebResponse {
        self.response.as_ref()
    }

    pub fn response_mut(&mut self) -> &mut dyn WebResponse {
        self.response.as_mut()
    }

    /// Give up the request, keeping its response.
    pub fn into_response(self) -> Box<dyn WebResponse> {
        self.response
    }
}

/// REQUEST_URI, else X-Original-URL, else SCRIPT_NAME?QUERY_STRING; with the
/// fragment removed, leading slashes collapsed and any `scheme://host` dropped.
pub fn global_request_url(transport: &RawTransport) -> Option<String> {
    let base = transport
        .request_uri()
        .filter(|s| !s.is_empty())
        .or_else(|| transport.header("X-Original-URL").filter(|s| !s.is_empty()))
        .map(str::to_string)
        .or_else(|| {
            let script = transport.script_name().filter(|s| !s.is_empty())?;
            Some(match transport.query_string().filter(|q| !q.is_empty()) {
                Some(query) => format!("{script}?{query}"),
                None => script.to_string(),
            })
        })?;

    let base = base.split('#').next().unwrap_or("");
    if base.is_empty() {
        return None;
    }

    if base.starts_with('/') {
        return Some(format!("/{}", base.trim_start_matches('/')));
    }

    // Absolute URL: keep only what follows the host.
    if let Some((scheme, rest)) = base.split_once("://") {
        if !scheme.is_empty() && !scheme.contains('/') {
            if let Some(slash) = rest.find('/') {
                return Some(format!("/{}", rest[slash..].trim_start_matches('/')));
            }
        }
    }
    Some(base.to_string())
}

/// Path of `url` with the script name (or `script_prefix`) removed, if what
/// remains starts with `/`; otherwise the whole path.
pub fn parse_url_path(url: &str, script_name: Option<&str>, script_prefix: Option<&str>) -> String {
    let path = url.split('?').next().unwrap_or("");

    let strip = |prefix: &str| {
        path.strip_prefix(prefix)
            .filter(|rest| rest.starts_with('/'))
            .map(str::to_string)
    };

    let script_name = script_name.filter(|s| !s.is_empty());
    if let Some(rest) = script_name.and_then(strip) {
        return rest;
    }
    if let Some(prefix) = script_prefix.filter(|p| !p.is_empty() && Some(*p) != script_name) {
        if let Some(rest) = strip(prefix) {
            return rest;
        }
    }
    path.to_string()
}
