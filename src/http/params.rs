//! Unified request parameters.
//!
//! # Responsibilities
//! - Merge body, query-string and path-derived parameters
//! - Serve typed reads (string, list, int, float, bool) with coercion on read
//! - Keep separate views of query-only and query-plus-path values for
//!   link building
//!
//! # Design Decisions
//! - Body values win over query values for the same key
//! - Every read except the raw accessors goes through Unicode normalization
//! - Coercions never fail; non-numeric input reads as 0, absent reads as the
//!   caller's default
//! - `.` in a key is read and written as `_`

use std::borrow::Cow;

use encoding_rs::Encoding;
use serde::Serialize;

use crate::http::normalize::{normalize, normalize_all};
use crate::http::query::{normalize_key, parse_form, ParamMap};
use crate::http::transport::RawTransport;

/// Upper bound applied by [`ParameterStore::limit_offset`].
pub const MAX_LIMIT: i64 = 5000;

/// A single parameter: a string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Scalar(String),
    List(Vec<String>),
}

impl ParamValue {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            ParamValue::Scalar(s) => Some(s),
            ParamValue::List(_) => None,
        }
    }

    fn normalized(&self) -> ParamValue {
        match self {
            ParamValue::Scalar(s) => ParamValue::Scalar(normalize(s).into_owned()),
            ParamValue::List(items) => ParamValue::List(normalize_all(items)),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Scalar(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Scalar(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(value: Vec<String>) -> Self {
        ParamValue::List(value)
    }
}

/// Request parameters for one request.
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    data: ParamMap,
    query_and_path: ParamMap,
    query: ParamMap,
    post: ParamMap,
}

impl ParameterStore {
    /// Merge already-parsed query and body parameters. Body wins.
    pub fn new(query: ParamMap, post: ParamMap) -> Self {
        let mut data = post.clone();
        data.extend_missing(&query);
        Self {
            data,
            query_and_path: query.clone(),
            query,
            post,
        }
    }

    /// Parse the query string and, for form POSTs, the body of `transport`.
    pub fn from_transport(transport: &RawTransport, legacy: Option<&'static Encoding>) -> Self {
        let query = transport
            .query_string()
            .map(|q| parse_form(q.as_bytes(), legacy))
            .unwrap_or_default();

        let is_form_post = transport.method() == Some("POST")
            && transport
                .header("Content-Type")
                .map(|ct| {
                    ct.trim_start()
                        .to_ascii_lowercase()
                        .starts_with("application/x-www-form-urlencoded")
                })
                .unwrap_or(false);
        let post = if is_form_post {
            parse_form(transport.body(), None)
        } else {
            ParamMap::new()
        };

        Self::new(query, post)
    }

    /// Normalized scalar value, or `default` when absent or a list.
    pub fn get<'a>(&'a self, name: &str, default: Option<&'a str>) -> Option<Cow<'a, str>> {
        match self.lookup(name) {
            Some(ParamValue::Scalar(s)) => Some(normalize(s)),
            _ => default.map(Cow::Borrowed),
        }
    }

    /// Scalar value without normalization, or `default` when absent or a list.
    pub fn get_raw<'a>(&'a self, name: &str, default: Option<&'a str>) -> Option<&'a str> {
        match self.lookup(name) {
            Some(ParamValue::Scalar(s)) => Some(s.as_str()),
            _ => default,
        }
    }

    /// Normalized list. A scalar reads as a one-element list.
    pub fn get_array(&self, name: &str, default: Option<Vec<String>>) -> Option<Vec<String>> {
        match self.lookup(name) {
            Some(ParamValue::Scalar(s)) => Some(vec![normalize(s).into_owned()]),
            Some(ParamValue::List(items)) => Some(normalize_all(items)),
            None => default,
        }
    }

    /// List of integers, each element coerced.
    pub fn get_int_array(&self, name: &str, default: Option<Vec<i64>>) -> Option<Vec<i64>> {
        match self.get_array(name, None) {
            Some(items) => Some(items.iter().map(|s| parse_int(s)).collect()),
            None => default,
        }
    }

    pub fn get_int(&self, name: &str, default: i64) -> i64 {
        self.get(name, None).map(|s| parse_int(&s)).unwrap_or(default)
    }

    /// Integer if the value is fully numeric, otherwise `None`.
    pub fn get_int_or_none(&self, name: &str) -> Option<i64> {
        self.get(name, None)
            .filter(|s| is_numeric(s))
            .map(|s| parse_int(&s))
    }

    pub fn get_float(&self, name: &str, default: f64) -> f64 {
        self.get(name, None).map(|s| parse_float(&s)).unwrap_or(default)
    }

    /// `""` and `"0"` are false; any other present value is true.
    pub fn get_bool(&self, name: &str, default: bool) -> bool {
        self.get(name, None).map(|s| truthy(&s)).unwrap_or(default)
    }

    /// Like [`get_bool`](Self::get_bool), but `"false"` in any case is false too.
    pub fn get_fuzzy_bool(&self, name: &str, default: bool) -> bool {
        self.get_bool(name, default)
            && !self
                .get(name, None)
                .map(|s| s.eq_ignore_ascii_case("false"))
                .unwrap_or(false)
    }

    /// Presence test, for checkboxes and buttons.
    pub fn get_check(&self, name: &str) -> bool {
        self.get_raw(name, None).is_some()
    }

    /// Normalized text with CRLF line endings folded to LF.
    pub fn get_text(&self, name: &str, default: &str) -> String {
        self.get(name, Some(default))
            .map(|s| s.replace("\r\n", "\n"))
            .unwrap_or_default()
    }

    /// Set a value, returning the previous one.
    pub fn set(&mut self, name: &str, value: impl Into<ParamValue>) -> Option<ParamValue> {
        self.data.insert(normalize_key(name), value.into())
    }

    /// Remove a value, returning it.
    pub fn unset(&mut self, name: &str) -> Option<ParamValue> {
        self.data.remove(&normalize_key(name))
    }

    /// Normalized values for `names`, or for every key when `names` is empty.
    /// Absent names are skipped; results are keyed by the name as given.
    pub fn values(&self, names: &[&str]) -> ParamMap {
        let mut out = ParamMap::new();
        if names.is_empty() {
            for (key, value) in self.data.iter() {
                out.insert(key, value.normalized());
            }
            return out;
        }
        for name in names {
            if let Some(value) = self.lookup(name) {
                out.insert(*name, value.normalized());
            }
        }
        out
    }

    /// Every key except those in `exclude`.
    pub fn value_names(&self, exclude: &[&str]) -> Vec<String> {
        self.data
            .keys()
            .filter(|k| !exclude.contains(k))
            .map(str::to_string)
            .collect()
    }

    /// Query-string values plus values derived from the path.
    pub fn query_values(&self) -> &ParamMap {
        &self.query_and_path
    }

    /// Query-string values only.
    pub fn query_values_only(&self) -> &ParamMap {
        &self.query
    }

    /// Body values only.
    pub fn post_values(&self) -> &ParamMap {
        &self.post
    }

    /// Record routing results in the merged and query-and-path views.
    pub fn interpolate(&mut self, params: &[(String, String)]) {
        for (key, value) in params {
            self.data.insert(key.clone(), ParamValue::Scalar(value.clone()));
            self.query_and_path
                .insert(key.clone(), ParamValue::Scalar(value.clone()));
        }
    }

    /// `(limit, offset)` from the `limit` and `offset` parameters.
    ///
    /// A missing or non-positive limit reads as `default_limit`; the limit is
    /// capped at [`MAX_LIMIT`]. A negative offset reads as 0.
    pub fn limit_offset(&self, default_limit: i64) -> (i64, i64) {
        let mut limit = self.get_int("limit", 0);
        if limit <= 0 {
            limit = default_limit;
        }
        let limit = limit.min(MAX_LIMIT);
        let offset = self.get_int("offset", 0).max(0);
        (limit, offset)
    }

    fn lookup(&self, name: &str) -> Option<&ParamValue> {
        self.data.get(&normalize_key(name))
    }
}

fn truthy(s: &str) -> bool {
    !(s.is_empty() || s == "0")
}

/// The leading numeric part of `s`, and whether it is a plain integer.
///
/// Accepts leading whitespace, an optional sign, digits, an optional fraction
/// and an optional exponent. Returns `("", true)` when there is no digit.
pub fn numeric_prefix(s: &str) -> (&str, bool) {
    let bytes = s.as_bytes();
    let len = bytes.len();
    let mut i = 0;
    while i < len && matches!(bytes[i], b' ' | b'\t' | b'\n' | b'\r' | 0x0B | 0x0C) {
        i += 1;
    }
    let start = i;
    if i < len && matches!(bytes[i], b'+' | b'-') {
        i += 1;
    }

    let int_start = i;
    while i < len && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;
    let mut integral = true;

    if i < len && bytes[i] == b'.' {
        let mut j = i + 1;
        while j < len && bytes[j].is_ascii_digit() {
            j += 1;
        }
        let frac = j - (i + 1);
        if digits + frac > 0 {
            digits += frac;
            i = j;
            integral = false;
        }
    }
    if digits == 0 {
        return ("", true);
    }

    if i < len && matches!(bytes[i], b'e' | b'E') {
        let mut j = i + 1;
        if j < len && matches!(bytes[j], b'+' | b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < len && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
            integral = false;
        }
    }

    (&s[start..i], integral)
}

/// True if `s` is entirely numeric, allowing surrounding whitespace.
pub fn is_numeric(s: &str) -> bool {
    let trimmed = s.trim_end_matches([' ', '\t', '\n', '\r', '\u{B}', '\u{C}']);
    let (prefix, _) = numeric_prefix(trimmed);
    if prefix.is_empty() {
        return false;
    }
    let leading = trimmed.len() - trimmed.trim_start_matches([' ', '\t', '\n', '\r', '\u{B}', '\u{C}']).len();
    leading + prefix.len() == trimmed.len()
}

/// Integer coercion of the numeric prefix. Saturates at the `i64` bounds.
pub fn parse_int(s: &str) -> i64 {
    let (prefix, integral) = numeric_prefix(s);
    if prefix.is_empty() {
        return 0;
    }
    if integral {
        return prefix.parse::<i64>().unwrap_or(if prefix.starts_with('-') {
            i64::MIN
        } else {
            i64::MAX
        });
    }
    // `as` saturates and maps NaN to 0.
    prefix.parse::<f64>().map(|f| f as i64).unwrap_or(0)
}

/// Float coercion of the numeric prefix.
pub fn parse_float(s: &str) -> f64 {
    let (prefix, _) = numeric_prefix(s);
    prefix.parse::<f64>().unwrap_or(0.0)
}
