//! Path template parsing and single-template matching.
//!
//! # Responsibilities
//! - Parse templates such as `/wiki/$1` or `/$2/$1` into literal and
//!   placeholder segments
//! - Validate parameter value templates and constraints against the
//!   placeholders a template declares
//! - Match one concrete path against one template
//!
//! # Design Decisions
//! - A placeholder followed by a literal binds the shortest non-empty run
//!   without `/`; a trailing placeholder binds the rest of the path
//! - First literal mismatch rejects the template, no partial-match retry
//! - Bound values are percent-decoded before constraints are checked

use percent_encoding::percent_decode_str;
use regex::Regex;

use crate::error::RouteError;

/// One piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text that must appear verbatim.
    Literal(String),
    /// A named placeholder (`$1`, `$variant`, ...), stored without the `$`.
    Placeholder(String),
}

/// A restriction on the value a placeholder may bind.
#[derive(Debug, Clone)]
pub enum Constraint {
    /// The value must be one of a finite set.
    OneOf(Vec<String>),
    /// The value must fully match a regular expression.
    Pattern(Regex),
}

impl Constraint {
    /// Build a finite-set constraint.
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Constraint::OneOf(values.into_iter().map(Into::into).collect())
    }

    /// Build a regex constraint. The expression is anchored on both ends.
    pub fn pattern(name: &str, expr: &str) -> Result<Self, RouteError> {
        Regex::new(&format!("^(?:{expr})$"))
            .map(Constraint::Pattern)
            .map_err(|e| RouteError::InvalidConstraint {
                name: name.trim_start_matches('$').to_string(),
                reason: e.to_string(),
            })
    }

    /// Returns true if `value` satisfies this constraint.
    pub fn allows(&self, value: &str) -> bool {
        match self {
            Constraint::OneOf(values) => values.iter().any(|v| v == value),
            Constraint::Pattern(re) => re.is_match(value),
        }
    }
}

/// A compiled path template with its output parameters and constraints.
#[derive(Debug, Clone)]
pub struct PathTemplate {
    source: String,
    segments: Vec<Segment>,
    params: Vec<(String, Vec<Segment>)>,
    constraints: Vec<(String, Constraint)>,
}

impl PathTemplate {
    /// Parse and validate a template.
    ///
    /// `params` maps output names to value templates (`"$1"`, `"edit"`,
    /// `"$2-x"`). When the template uses `$1` and no `title` parameter is
    /// given, `title = $1` is implied. Constraint keys may be written with or
    /// without the leading `$`.
    pub fn new(
        template: &str,
        params: Vec<(String, String)>,
        constraints: Vec<(String, Constraint)>,
    ) -> Result<Self, RouteError> {
        if template.is_empty() {
            return Err(RouteError::EmptyTemplate);
        }
        if !template.starts_with('/') {
            return Err(RouteError::MissingLeadingSlash(template.to_string()));
        }

        let segments = parse_segments(template)?;
        let declared: Vec<&str> = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Placeholder(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect();

        let mut compiled_params = Vec::with_capacity(params.len() + 1);
        if declared.contains(&"1") && !params.iter().any(|(name, _)| name == "title") {
            compiled_params.push(("title".to_string(), vec![Segment::Placeholder("1".into())]));
        }
        for (name, value) in params {
            let value_segments = parse_segments(&value)?;
            for seg in &value_segments {
                if let Segment::Placeholder(p) = seg {
                    if !declared.contains(&p.as_str()) {
                        return Err(RouteError::UnknownPlaceholder {
                            template: template.to_string(),
                            name: p.clone(),
                        });
                    }
                }
            }
            compiled_params.push((name, value_segments));
        }

        let mut compiled_constraints = Vec::with_capacity(constraints.len());
        for (name, constraint) in constraints {
            let name = name.trim_start_matches('$').to_string();
            if !declared.contains(&name.as_str()) {
                return Err(RouteError::UnknownPlaceholder {
                    template: template.to_string(),
                    name,
                });
            }
            compiled_constraints.push((name, constraint));
        }

        Ok(Self {
            source: template.to_string(),
            segments,
            params: compiled_params,
            constraints: compiled_constraints,
        })
    }

    /// The template as configured.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parsed segments, in order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Match `path` against this template, returning the output parameters.
    pub fn match_path(&self, path: &str) -> Option<Vec<(String, String)>> {
        let mut bindings: Vec<(&str, String)> = Vec::new();
        let mut rest = path;
        let mut iter = self.segments.iter().peekable();

        while let Some(segment) = iter.next() {
            match segment {
                Segment::Literal(lit) => {
                    rest = rest.strip_prefix(lit.as_str())?;
                }
                Segment::Placeholder(name) => {
                    let raw = match iter.peek() {
                        Some(Segment::Literal(next)) => {
                            let first = rest.chars().next()?.len_utf8();
                            let end = rest[first..].find(next.as_str())? + first;
                            let candidate = &rest[..end];
                            if candidate.contains('/') {
                                return None;
                            }
                            rest = &rest[end..];
                            candidate
                        }
                        _ => {
                            if rest.is_empty() {
                                return None;
                            }
                            std::mem::take(&mut rest)
                        }
                    };
                    bindings.push((name.as_str(), decode(raw)));
                }
            }
        }

        if !rest.is_empty() {
            return None;
        }

        for (name, constraint) in &self.constraints {
            let value = bindings
                .iter()
                .find(|(n, _)| *n == name.as_str())
                .map(|(_, v)| v.as_str())?;
            if !constraint.allows(value) {
                return None;
            }
        }

        Some(
            self.params
                .iter()
                .map(|(name, value)| (name.clone(), render(value, &bindings)))
                .collect(),
        )
    }
}

/// Split a template or value template into segments.
pub(crate) fn parse_segments(template: &str) -> Result<Vec<Segment>, RouteError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.char_indices().peekable();

    while let Some((offset, ch)) = chars.next() {
        if ch != '$' {
            literal.push(ch);
            continue;
        }

        let mut name = String::new();
        while let Some(&(_, next)) = chars.peek() {
            if next.is_ascii_alphanumeric() || next == '_' {
                name.push(next);
                chars.next();
            } else {
                break;
            }
        }
        if name.is_empty() {
            return Err(RouteError::DanglingPlaceholder {
                template: template.to_string(),
                offset,
            });
        }

        if literal.is_empty() {
            if let Some(Segment::Placeholder(_)) = segments.last() {
                return Err(RouteError::AdjacentPlaceholders(template.to_string()));
            }
        } else {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Placeholder(name));
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn render(value: &[Segment], bindings: &[(&str, String)]) -> String {
    let mut out = String::new();
    for segment in value {
        match segment {
            Segment::Literal(lit) => out.push_str(lit),
            Segment::Placeholder(name) => {
                if let Some((_, bound)) = bindings.iter().find(|(n, _)| *n == name.as_str()) {
                    out.push_str(bound);
                }
            }
        }
    }
    out
}

/// Percent-decode a path piece. `+` is left alone.
pub(crate) fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(src: &str) -> PathTemplate {
        PathTemplate::new(src, Vec::new(), Vec::new()).unwrap()
    }

    #[test]
    fn test_parse_segments() {
        let segs = parse_segments("/wiki/$1").unwrap();
        assert_eq!(
            segs,
            vec![
                Segment::Literal("/wiki/".into()),
                Segment::Placeholder("1".into())
            ]
        );

        let segs = parse_segments("/$variant/$1").unwrap();
        assert_eq!(segs.len(), 4);
    }

    #[test]
    fn test_invalid_templates() {
        assert_eq!(
            PathTemplate::new("", vec![], vec![]).unwrap_err(),
            RouteError::EmptyTemplate
        );
        assert!(matches!(
            PathTemplate::new("wiki/$1", vec![], vec![]),
            Err(RouteError::MissingLeadingSlash(_))
        ));
        assert!(matches!(
            PathTemplate::new("/wiki/$", vec![], vec![]),
            Err(RouteError::DanglingPlaceholder { offset: 6, .. })
        ));
        assert!(matches!(
            PathTemplate::new("/$1$2", vec![], vec![]),
            Err(RouteError::AdjacentPlaceholders(_))
        ));
        assert!(matches!(
            PathTemplate::new("/wiki/$1", vec![("action".into(), "$2".into())], vec![]),
            Err(RouteError::UnknownPlaceholder { .. })
        ));
        assert!(matches!(
            PathTemplate::new("/wiki/$1", vec![], vec![("$3".into(), Constraint::one_of(["a"]))]),
            Err(RouteError::UnknownPlaceholder { .. })
        ));
    }

    #[test]
    fn test_implicit_title() {
        let t = template("/wiki/$1");
        assert_eq!(
            t.match_path("/wiki/Main_Page"),
            Some(vec![("title".to_string(), "Main_Page".to_string())])
        );
    }

    #[test]
    fn test_trailing_placeholder_takes_rest() {
        let t = template("/wiki/$1");
        let params = t.match_path("/wiki/Foo/Bar%20Baz").unwrap();
        assert_eq!(params[0].1, "Foo/Bar Baz");
        assert!(t.match_path("/wiki/").is_none());
        assert!(t.match_path("/w/index.php").is_none());
    }

    #[test]
    fn test_middle_placeholder_stops_at_literal() {
        let t = PathTemplate::new(
            "/$2/$1",
            vec![("variant".into(), "$2".into())],
            vec![],
        )
        .unwrap();
        let params = t.match_path("/zh-hans/Foo/Bar").unwrap();
        assert_eq!(
            params,
            vec![
                ("title".to_string(), "Foo/Bar".to_string()),
                ("variant".to_string(), "zh-hans".to_string()),
            ]
        );
    }

    #[test]
    fn test_literal_suffix() {
        let t = PathTemplate::new("/$1.json", vec![], vec![]).unwrap();
        assert_eq!(t.match_path("/Foo.json").unwrap()[0].1, "Foo");
        assert!(t.match_path("/Foo.xml").is_none());
        assert!(t.match_path("/a/b.json").is_none());
    }

    #[test]
    fn test_constraints() {
        let t = PathTemplate::new(
            "/$2/$1",
            vec![("variant".into(), "$2".into())],
            vec![("$2".into(), Constraint::one_of(["zh-hans", "zh-hant"]))],
        )
        .unwrap();
        assert!(t.match_path("/zh-hant/Foo").is_some());
        assert!(t.match_path("/en/Foo").is_none());

        let t = PathTemplate::new(
            "/rev/$id",
            vec![("oldid".into(), "$id".into())],
            vec![("id".into(), Constraint::pattern("id", "[0-9]+").unwrap())],
        )
        .unwrap();
        assert_eq!(
            t.match_path("/rev/42"),
            Some(vec![("oldid".to_string(), "42".to_string())])
        );
        assert!(t.match_path("/rev/42a").is_none());
    }

    #[test]
    fn test_invalid_pattern_constraint() {
        assert!(matches!(
            Constraint::pattern("$2", "(unclosed"),
            Err(RouteError::InvalidConstraint { ref name, .. }) if name == "2"
        ));
    }

    #[test]
    fn test_literal_param_values() {
        let t = PathTemplate::new("/edit/$1", vec![("action".into(), "edit".into())], vec![])
            .unwrap();
        assert_eq!(
            t.match_path("/edit/Foo"),
            Some(vec![
                ("title".to_string(), "Foo".to_string()),
                ("action".to_string(), "edit".to_string()),
            ])
        );
    }
}
