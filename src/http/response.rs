//! Response abstraction.
//!
//! # Responsibilities
//! - Give handlers one interface for status, headers, cookies and body
//! - Turn the collected response into an HTTP response for the server
//! - Record everything in memory for tests and offline inspection
//!
//! # Design Decisions
//! - The variant is chosen by whoever builds the request, never discovered
//!   by inspecting the request
//! - Header lines use the familiar `Name: value` and `HTTP/1.1 404` forms
//! - Cookie names get the site prefix applied here so handlers never repeat it

use std::fmt;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use url::form_urlencoded;

use crate::config::schema::CookiesConfig;

/// Attributes applied to a cookie.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CookieOptions {
    pub prefix: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    /// Lifetime in seconds; `None` for a session cookie.
    pub max_age: Option<i64>,
}

impl CookieOptions {
    pub fn from_config(config: &CookiesConfig) -> Self {
        Self {
            prefix: config.prefix.clone(),
            domain: config.domain.clone(),
            path: config.path.clone(),
            secure: config.secure,
            http_only: config.http_only,
            max_age: None,
        }
    }

    pub fn with_max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    /// Render a `Set-Cookie` value.
    pub fn set_cookie_value(&self, name: &str, value: &str) -> String {
        let encoded: String = form_urlencoded::byte_serialize(value.as_bytes()).collect();
        let mut out = format!("{}{}={}", self.prefix, name, encoded);
        if let Some(max_age) = self.max_age {
            out.push_str(&format!("; Max-Age={}", max_age.max(0)));
        }
        if !self.path.is_empty() {
            out.push_str(&format!("; Path={}", self.path));
        }
        if !self.domain.is_empty() {
            out.push_str(&format!("; Domain={}", self.domain));
        }
        if self.secure {
            out.push_str("; Secure");
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        out
    }
}

/// Output side of a request.
pub trait WebResponse: Send + fmt::Debug {
    /// Add a raw header line, or set the status from an `HTTP/x.y NNN` line.
    ///
    /// With `replace`, earlier values of the same header are dropped. `status`
    /// also sets the response code.
    fn header(&mut self, line: &str, replace: bool, status: Option<u16>);

    /// Set the response status code.
    fn status_header(&mut self, code: u16);

    fn status_code(&self) -> u16;

    /// First value of a header, by case-insensitive name.
    fn get_header(&self, name: &str) -> Option<String>;

    /// Set a cookie; `options.prefix` is prepended to `name`.
    fn set_cookie(&mut self, name: &str, value: &str, options: &CookieOptions);

    /// Expire a cookie.
    fn clear_cookie(&mut self, name: &str, options: &CookieOptions) {
        let expired = options.clone().with_max_age(0);
        self.set_cookie(name, "", &expired);
    }

    /// Value of a cookie set on this response, by full (prefixed) name.
    fn get_cookie(&self, name: &str) -> Option<String>;

    /// Append to the body.
    fn write(&mut self, chunk: &[u8]);

    fn body(&self) -> &[u8];

    /// Convert into a response the server can send.
    fn into_http(self: Box<Self>) -> Response;
}

enum HeaderLine<'a> {
    Status(u16),
    Field(&'a str, &'a str),
}

fn parse_header_line(line: &str) -> Option<HeaderLine<'_>> {
    if line.starts_with("HTTP/") {
        let code = line.split_whitespace().nth(1)?.parse().ok()?;
        return Some(HeaderLine::Status(code));
    }
    let (name, value) = line.split_once(':')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some(HeaderLine::Field(name, value.trim()))
}

/// Response sent over the wire.
#[derive(Debug)]
pub struct RealResponse {
    status: StatusCode,
    headers: HeaderMap,
    cookies: Vec<(String, String)>,
    body: Vec<u8>,
}

impl RealResponse {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            body: Vec::new(),
        }
    }

    fn set_status(&mut self, code: u16) {
        match StatusCode::from_u16(code) {
            Ok(status) => self.status = status,
            Err(_) => tracing::warn!(code, "Ignoring invalid status code"),
        }
    }
}

impl Default for RealResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl WebResponse for RealResponse {
    fn header(&mut self, line: &str, replace: bool, status: Option<u16>) {
        match parse_header_line(line) {
            Some(HeaderLine::Status(code)) => self.set_status(code),
            Some(HeaderLine::Field(name, value)) => {
                let parsed = (
                    HeaderName::from_bytes(name.as_bytes()),
                    HeaderValue::from_str(value),
                );
                match parsed {
                    (Ok(name), Ok(value)) => {
                        if replace {
                            self.headers.insert(name, value);
                        } else {
                            self.headers.append(name, value);
                        }
                    }
                    _ => tracing::warn!(line = %line, "Dropping malformed header line"),
                }
            }
            None => tracing::warn!(line = %line, "Dropping malformed header line"),
        }
        if let Some(code) = status {
            self.set_status(code);
        }
    }

    fn status_header(&mut self, code: u16) {
        self.set_status(code);
    }

    fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    fn get_header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    fn set_cookie(&mut self, name: &str, value: &str, options: &CookieOptions) {
        let full_name = format!("{}{}", options.prefix, name);
        match HeaderValue::from_str(&options.set_cookie_value(name, value)) {
            Ok(header_value) => {
                self.headers.append(header::SET_COOKIE, header_value);
                self.cookies.retain(|(n, _)| *n != full_name);
                self.cookies.push((full_name, value.to_string()));
            }
            Err(_) => tracing::warn!(cookie = %full_name, "Dropping cookie with invalid characters"),
        }
    }

    fn get_cookie(&self, name: &str) -> Option<String> {
        self.cookies
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    fn write(&mut self, chunk: &[u8]) {
        self.body.extend_from_slice(chunk);
    }

    fn body(&self) -> &[u8] {
        &self.body
    }

    fn into_http(self: Box<Self>) -> Response {
        let this = *self;
        let mut response = Response::new(Body::from(this.body));
        *response.status_mut() = this.status;
        *response.headers_mut() = this.headers;
        response
    }
}

/// In-memory response for tests and offline inspection.
#[derive(Debug, Default)]
pub struct FauxResponse {
    status: Option<u16>,
    headers: Vec<(String, String)>,
    cookies: Vec<(String, String, CookieOptions)>,
    body: Vec<u8>,
}

impl FauxResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded header fields in order, names upper-cased.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Options a cookie was set with, by full (prefixed) name.
    pub fn cookie_options(&self, name: &str) -> Option<&CookieOptions> {
        self.cookies
            .iter()
            .find(|(n, _, _)| n == name)
            .map(|(_, _, o)| o)
    }
}

impl WebResponse for FauxResponse {
    fn header(&mut self, line: &str, replace: bool, status: Option<u16>) {
        match parse_header_line(line) {
            Some(HeaderLine::Status(code)) => self.status = Some(code),
            Some(HeaderLine::Field(name, value)) => {
                let key = name.to_ascii_uppercase();
                if replace {
                    self.headers.retain(|(n, _)| *n != key);
                }
                self.headers.push((key, value.to_string()));
            }
            None => {}
        }
        if status.is_some() {
            self.status = status;
        }
    }

    fn status_header(&mut self, code: u16) {
        self.status = Some(code);
    }

    fn status_code(&self) -> u16 {
        self.status.unwrap_or(200)
    }

    fn get_header(&self, name: &str) -> Option<String> {
        let key = name.to_ascii_uppercase();
        self.headers
            .iter()
            .find(|(n, _)| *n == key)
            .map(|(_, v)| v.clone())
    }

    fn set_cookie(&mut self, name: &str, value: &str, options: &CookieOptions) {
        let full_name = format!("{}{}", options.prefix, name);
        self.cookies.retain(|(n, _, _)| *n != full_name);
        self.cookies
            .push((full_name, value.to_string(), options.clone()));
    }

    fn get_cookie(&self, name: &str) -> Option<String> {
        self.cookies
            .iter()
            .find(|(n, _, _)| n == name)
            .map(|(_, v, _)| v.clone())
    }

    fn write(&mut self, chunk: &[u8]) {
        self.body.extend_from_slice(chunk);
    }

    fn body(&self) -> &[u8] {
        &self.body
    }

    fn into_http(self: Box<Self>) -> Response {
        let mut real = RealResponse::new();
        real.status_header(self.status_code());
        for (name, value) in &self.headers {
            real.header(&format!("{name}: {value}"), false, None);
        }
        for (name, value, options) in &self.cookies {
            let bare = name.strip_prefix(options.prefix.as_str()).unwrap_or(name);
            real.set_cookie(bare, value, options);
        }
        real.write(&self.body);
        Box::new(real).into_http()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> CookieOptions {
        CookieOptions {
            prefix: "wiki".into(),
            path: "/".into(),
            http_only: true,
            ..CookieOptions::default()
        }
    }

    #[test]
    fn test_set_cookie_value() {
        let value = options().with_max_age(3600).set_cookie_value("Session", "a b");
        assert_eq!(value, "wikiSession=a+b; Max-Age=3600; Path=/; HttpOnly");

        let secure = CookieOptions {
            domain: ".example.org".into(),
            secure: true,
            ..CookieOptions::default()
        };
        assert_eq!(
            secure.set_cookie_value("x", "1"),
            "x=1; Domain=.example.org; Secure"
        );
    }

    #[test]
    fn test_faux_headers() {
        let mut r = FauxResponse::new();
        r.header("Content-Type: text/plain", true, None);
        r.header("X-Multi: a", false, None);
        r.header("x-multi: b", false, None);
        r.header("content-type: application/json", true, None);
        assert_eq!(r.get_header("CONTENT-TYPE").as_deref(), Some("application/json"));
        assert_eq!(r.get_header("X-Multi").as_deref(), Some("a"));
        assert_eq!(r.headers().len(), 3);
        assert_eq!(r.status_code(), 200);

        r.header("HTTP/1.1 404 Not Found", true, None);
        assert_eq!(r.status_code(), 404);
        r.header("Location: /x", true, Some(302));
        assert_eq!(r.status_code(), 302);
    }

    #[test]
    fn test_faux_cookies() {
        let mut r = FauxResponse::new();
        r.set_cookie("Token", "abc", &options());
        assert_eq!(r.get_cookie("wikiToken").as_deref(), Some("abc"));
        assert_eq!(r.get_cookie("Token"), None);

        r.clear_cookie("Token", &options());
        assert_eq!(r.get_cookie("wikiToken").as_deref(), Some(""));
        assert_eq!(r.cookie_options("wikiToken").unwrap().max_age, Some(0));
    }

    #[test]
    fn test_real_response_into_http() {
        let mut r = RealResponse::new();
        r.header("Content-Type: application/json", true, None);
        r.header("bad header line", true, None);
        r.status_header(201);
        r.set_cookie("Token", "abc", &options());
        r.write(b"{}");
        assert_eq!(r.get_cookie("wikiToken").as_deref(), Some("abc"));

        let http = Box::new(r).into_http();
        assert_eq!(http.status(), StatusCode::CREATED);
        assert_eq!(http.headers()["content-type"], "application/json");
        assert_eq!(http.headers()["set-cookie"], "wikiToken=abc; Path=/; HttpOnly");
    }

    #[test]
    fn test_faux_into_http() {
        let mut r = FauxResponse::new();
        r.header("X-Test: yes", true, Some(418));
        r.set_cookie("A", "1", &options());
        let http = Box::new(r).into_http();
        assert_eq!(http.status().as_u16(), 418);
        assert_eq!(http.headers()["x-test"], "yes");
        assert_eq!(http.headers()["set-cookie"], "wikiA=1; Path=/; HttpOnly");
    }
}
