//! Accept-Language parsing.

use std::sync::OnceLock;

use regex::Regex;

static LANGUAGE_RANGE: OnceLock<Regex> = OnceLock::new();

fn language_range() -> &'static Regex {
    LANGUAGE_RANGE.get_or_init(|| {
        Regex::new(
            r"([a-z]{1,8}(?:-[a-z]{1,8})*|\*)\s*(?:;\s*q\s*=\s*(1(?:\.0{0,3})?|0(?:\.[0-9]{0,3})?)?)?",
        )
        .expect("static Accept-Language pattern compiles")
    })
}

/// Parse an Accept-Language header into `(code, q)` pairs, highest q first.
///
/// Codes are lower-cased. A missing q-value means 1; q = 0 entries are
/// dropped. A code listed twice keeps its first position and its last
/// q-value. Equal q-values keep header order.
pub fn parse_accept_language(header: &str) -> Vec<(String, f64)> {
    let header = header.to_lowercase();
    let mut langs: Vec<(String, f64)> = Vec::new();

    for caps in language_range().captures_iter(&header) {
        let code = &caps[1];
        let q = caps
            .get(2)
            .map(|m| m.as_str().parse::<f64>().unwrap_or(0.0))
            .unwrap_or(1.0);
        if q == 0.0 {
            continue;
        }
        match langs.iter_mut().find(|(c, _)| c == code) {
            Some((_, existing)) => *existing = q,
            None => langs.push((code.to_string(), q)),
        }
    }

    // Vec::sort_by is stable.
    langs.sort_by(|a, b| b.1.total_cmp(&a.1));
    langs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(header: &str) -> Vec<(String, f64)> {
        parse_accept_language(header)
    }

    #[test]
    fn test_sorted_by_quality() {
        assert_eq!(
            codes("en-US;q=0.8,en;q=0.9,fr"),
            vec![
                ("fr".to_string(), 1.0),
                ("en".to_string(), 0.9),
                ("en-us".to_string(), 0.8)
            ]
        );
    }

    #[test]
    fn test_ties_keep_header_order() {
        let langs = codes("de;q=0.5, nl, fr;q=0.5, en");
        let order: Vec<&str> = langs.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(order, vec!["nl", "en", "de", "fr"]);
    }

    #[test]
    fn test_zero_quality_dropped() {
        let langs = codes("en;q=0, fr;q=0.000, *;q=0.1");
        assert_eq!(langs, vec![("*".to_string(), 0.1)]);
    }

    #[test]
    fn test_repeated_code() {
        let langs = codes("en;q=0.2, fr;q=0.5, en;q=0.7");
        assert_eq!(
            langs,
            vec![("en".to_string(), 0.7), ("fr".to_string(), 0.5)]
        );
    }

    #[test]
    fn test_empty_and_garbage() {
        assert!(codes("").is_empty());
        assert!(codes(";;;,,,").is_empty());
        assert_eq!(codes("EN-gb")[0].0, "en-gb");
    }
}
