//! Form and cookie parsing.
//!
//! # Responsibilities
//! - Parse `application/x-www-form-urlencoded` input into an ordered map
//! - Parse the `Cookie` header
//! - Repair query values that are not valid UTF-8 using a legacy encoding
//!
//! # Design Decisions
//! - Work on bytes until the very end so `%E9`-style legacy input can be
//!   recognized before it is forced into a `String`
//! - Key mangling matches what CGI front ends have always done: `.` and
//!   ` ` become `_`, `name[]` and `name[sub]` collect into a list
//! - Insertion order is preserved; a repeated scalar key keeps its first
//!   position and takes the last value

use std::collections::HashMap;

use encoding_rs::Encoding;
use percent_encoding::percent_decode;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::http::params::ParamValue;

/// An ordered string-keyed map of parameter values.
///
/// Entries keep first-insertion order; `index` maps each key to its slot so
/// lookups and inserts stay constant time on large forms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamMap {
    entries: Vec<(String, ParamValue)>,
    index: HashMap<String, usize>,
}

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Insert or replace, returning the previous value. Replacement keeps position.
    pub fn insert(&mut self, key: impl Into<String>, value: ParamValue) -> Option<ParamValue> {
        let key = key.into();
        match self.index.get(&key) {
            Some(&i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.append(key, value);
                None
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        let removed = self.index.remove(key)?;
        let (_, value) = self.entries.remove(removed);
        for (k, _) in &self.entries[removed..] {
            if let Some(slot) = self.index.get_mut(k) {
                *slot -= 1;
            }
        }
        Some(value)
    }

    /// Append `value` to the list under `key`, turning a scalar into a list.
    pub fn push(&mut self, key: impl Into<String>, value: String) {
        let key = key.into();
        match self.index.get(&key) {
            Some(&i) => match &mut self.entries[i].1 {
                ParamValue::List(list) => list.push(value),
                existing => *existing = ParamValue::List(vec![value]),
            },
            None => self.append(key, ParamValue::List(vec![value])),
        }
    }

    /// Add every entry of `other` whose key is not already present.
    pub fn extend_missing(&mut self, other: &ParamMap) {
        for (key, value) in &other.entries {
            if !self.contains_key(key) {
                self.append(key.clone(), value.clone());
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    fn append(&mut self, key: String, value: ParamValue) {
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
    }
}

impl<K: Into<String>> FromIterator<(K, ParamValue)> for ParamMap {
    fn from_iter<I: IntoIterator<Item = (K, ParamValue)>>(iter: I) -> Self {
        let mut map = ParamMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl Serialize for ParamMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Look up a legacy encoding by WHATWG label. Empty or unknown → `None`.
pub fn legacy_encoding(label: &str) -> Option<&'static Encoding> {
    if label.is_empty() {
        return None;
    }
    Encoding::for_label(label.as_bytes())
}

/// Parse a form-encoded string.
///
/// Values that are not valid UTF-8 after percent-decoding are decoded with
/// `legacy` when given, otherwise lossily.
pub fn parse_form(input: &[u8], legacy: Option<&'static Encoding>) -> ParamMap {
    let mut map = ParamMap::new();

    for pair in input.split(|b| *b == b'&') {
        if pair.is_empty() {
            continue;
        }
        let (raw_key, raw_value) = match pair.iter().position(|b| *b == b'=') {
            Some(eq) => (&pair[..eq], &pair[eq + 1..]),
            None => (pair, &b""[..]),
        };

        let key = String::from_utf8_lossy(&form_decode(raw_key)).into_owned();
        let value = decode_value(form_decode(raw_value), legacy);

        match split_key(&key) {
            Some((name, true)) => map.push(name, value),
            Some((name, false)) => {
                map.insert(name, ParamValue::Scalar(value));
            }
            None => {}
        }
    }
    map
}

/// Parse a `Cookie` header. The first occurrence of a name wins.
pub fn parse_cookies(header: &str) -> ParamMap {
    let mut map = ParamMap::new();

    for pair in header.split(';') {
        let pair = pair.trim_start();
        if pair.is_empty() {
            continue;
        }
        let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = String::from_utf8_lossy(&form_decode(raw_value.as_bytes())).into_owned();

        if let Some((name, _)) = split_key(raw_key) {
            if !map.contains_key(&name) {
                map.insert(name, ParamValue::Scalar(value));
            }
        }
    }
    map
}

/// Map a key to its stored name: `.` → `_`. Applied to every lookup.
pub fn normalize_key(name: &str) -> String {
    name.replace('.', "_")
}

/// `+` → space, then percent-decode.
fn form_decode(raw: &[u8]) -> Vec<u8> {
    let plus: Vec<u8> = raw.iter().map(|b| if *b == b'+' { b' ' } else { *b }).collect();
    percent_decode(&plus).collect()
}

fn decode_value(bytes: Vec<u8>, legacy: Option<&'static Encoding>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => match legacy {
            Some(encoding) => encoding
                .decode_without_bom_handling(e.as_bytes())
                .0
                .into_owned(),
            None => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        },
    }
}

/// Mangle a raw key, returning `(name, is_list)`. Empty names are dropped.
fn split_key(raw: &str) -> Option<(String, bool)> {
    let raw = raw.trim_start_matches(' ');
    let (base, is_list) = match raw.find('[') {
        Some(open) if raw[open..].contains(']') => (&raw[..open], true),
        Some(open) => {
            // An unclosed bracket is kept as a literal, mangled like a dot.
            return mangle(&format!("{}_{}", &raw[..open], &raw[open + 1..])).map(|n| (n, false));
        }
        None => (raw, false),
    };
    mangle(base).map(|n| (n, is_list))
}

fn mangle(base: &str) -> Option<String> {
    if base.is_empty() {
        return None;
    }
    Some(base.replace(['.', ' '], "_"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(s: &str) -> ParamValue {
        ParamValue::Scalar(s.to_string())
    }

    #[test]
    fn test_parse_form_basic() {
        let map = parse_form(b"title=Main+Page&action=view&x=a%2Bb", None);
        assert_eq!(map.get("title"), Some(&scalar("Main Page")));
        assert_eq!(map.get("action"), Some(&scalar("view")));
        assert_eq!(map.get("x"), Some(&scalar("a+b")));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["title", "action", "x"]);
    }

    #[test]
    fn test_key_mangling() {
        let map = parse_form(b"a.b=1&c+d=2&=skipped&flag", None);
        assert_eq!(map.get("a_b"), Some(&scalar("1")));
        assert_eq!(map.get("c_d"), Some(&scalar("2")));
        assert_eq!(map.get("flag"), Some(&scalar("")));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_list_keys() {
        let map = parse_form(b"ids[]=1&ids[]=2&opt[x]=3&opt[y]=4&bad[=5", None);
        assert_eq!(
            map.get("ids"),
            Some(&ParamValue::List(vec!["1".into(), "2".into()]))
        );
        assert_eq!(
            map.get("opt"),
            Some(&ParamValue::List(vec!["3".into(), "4".into()]))
        );
        assert_eq!(map.get("bad_"), Some(&scalar("5")));
    }

    #[test]
    fn test_repeated_scalar_keeps_position() {
        let map = parse_form(b"a=1&b=2&a=3", None);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(map.get("a"), Some(&scalar("3")));
    }

    #[test]
    fn test_legacy_encoding_repair() {
        let latin = legacy_encoding("windows-1252");
        let map = parse_form(b"title=Caf%E9&ok=Caf%C3%A9", latin);
        assert_eq!(map.get("title"), Some(&scalar("Café")));
        assert_eq!(map.get("ok"), Some(&scalar("Café")));

        let map = parse_form(b"title=Caf%E9", None);
        assert_eq!(map.get("title"), Some(&scalar("Caf\u{FFFD}")));
        assert!(legacy_encoding("").is_none());
        assert!(legacy_encoding("no-such-charset").is_none());
    }

    #[test]
    fn test_parse_cookies() {
        let map = parse_cookies("wikiSession=abc%20def; wiki.Token=x+y; wikiSession=later");
        assert_eq!(map.get("wikiSession"), Some(&scalar("abc def")));
        assert_eq!(map.get("wiki_Token"), Some(&scalar("x y")));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_map_operations() {
        let mut map = ParamMap::new();
        assert_eq!(map.insert("a", scalar("1")), None);
        assert_eq!(map.insert("a", scalar("2")), Some(scalar("1")));
        map.push("a", "3".into());
        assert_eq!(map.get("a"), Some(&ParamValue::List(vec!["3".into()])));

        let other: ParamMap = [("a", scalar("x")), ("b", scalar("y"))].into_iter().collect();
        map.extend_missing(&other);
        assert_eq!(map.get("b"), Some(&scalar("y")));
        assert_eq!(map.remove("a"), Some(ParamValue::List(vec!["3".into()])));
        assert_eq!(map.len(), 1);

        let json = serde_json::to_string(&other).unwrap();
        assert_eq!(json, r#"{"a":"x","b":"y"}"#);
    }

    #[test]
    fn test_remove_keeps_lookup_consistent() {
        let mut map: ParamMap = [("a", scalar("1")), ("b", scalar("2")), ("c", scalar("3"))]
            .into_iter()
            .collect();
        assert_eq!(map.remove("a"), Some(scalar("1")));
        assert_eq!(map.get("b"), Some(&scalar("2")));
        assert_eq!(map.get("c"), Some(&scalar("3")));
        map.insert("c", scalar("4"));
        map.insert("a", scalar("5"));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["b", "c", "a"]);
        assert_eq!(map.remove("zzz"), None);
    }

    #[test]
    fn test_many_keys_parse_in_linear_time() {
        let n = 100_000;
        let body: Vec<String> = (0..n).map(|i| format!("k{i}")).collect();
        let body = body.join("&");

        let start = std::time::Instant::now();
        let map = parse_form(body.as_bytes(), None);
        let elapsed = start.elapsed();

        assert_eq!(map.len(), n);
        assert_eq!(map.get("k99999"), Some(&scalar("")));
        assert_eq!(map.keys().next(), Some("k0"));
        assert!(elapsed < std::time::Duration::from_secs(5), "took {elapsed:?}");
    }
}
