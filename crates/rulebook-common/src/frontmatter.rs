/// Parser for the `---` delimited header block at the top of a rule document.
///
/// The header is a flat mapping:
/// - `key: value` sets a scalar (`true`/`false` become booleans, matching quotes are stripped)
/// - `key:` with nothing after the colon opens a list
/// - `- item` lines append to the most recently opened list
///
/// Parser approach: line-by-line state machine with two states, "expecting a key"
/// and "consuming list items for key K". Any line that is not a list item moves the
/// machine back to "expecting a key". Lines matching neither shape are skipped;
/// the parser never fails.
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

pub const DELIMITER: &str = "---";

static KEY_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9_][A-Za-z0-9_.-]*)\s*:(.*)$").expect("valid regex"));

/// A single header value. Nested structures are not supported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Bool(bool),
    Text(String),
    List(Vec<String>),
}

/// Header mapping that keeps keys in the order they were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frontmatter {
    entries: Vec<(String, HeaderValue)>,
}

impl Frontmatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Set `key`, replacing an existing value in place so the key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: HeaderValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn push_item(&mut self, key: &str, item: String) {
        if let Some((_, HeaderValue::List(items))) = self.entries.iter_mut().find(|(k, _)| k == key) {
            items.push(item);
        }
    }

    /// True only for a boolean `true` or the string literal `"true"`.
    pub fn always_apply(&self) -> bool {
        match self.get("alwaysApply") {
            Some(HeaderValue::Bool(b)) => *b,
            Some(HeaderValue::Text(s)) => s == "true",
            _ => false,
        }
    }

    /// File patterns from `globs`: a list, or a comma-separated string such as
    /// `*.ts, *.tsx` (optionally bracketed).
    pub fn globs(&self) -> Vec<String> {
        match self.get("globs") {
            Some(HeaderValue::List(items)) => items
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Some(HeaderValue::Text(s)) => {
                let inner = s
                    .trim()
                    .strip_prefix('[')
                    .and_then(|rest| rest.strip_suffix(']'))
                    .unwrap_or(s.as_str());
                inner
                    .split(',')
                    .map(|p| unquote(p.trim()).trim())
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect()
            }
            _ => Vec::new(),
        }
    }
}

impl Serialize for Frontmatter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Frontmatter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FrontmatterVisitor;

        impl<'de> Visitor<'de> for FrontmatterVisitor {
            type Value = Frontmatter;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a flat header mapping")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Frontmatter, A::Error> {
                let mut header = Frontmatter::new();
                while let Some((key, value)) = access.next_entry::<String, HeaderValue>()? {
                    header.insert(key, value);
                }
                Ok(header)
            }
        }

        deserializer.deserialize_map(FrontmatterVisitor)
    }
}

enum LineState {
    ExpectKey,
    ListItems(String),
}

/// Split a document into its header mapping and body.
///
/// Documents without a header, or whose header is never closed, come back with an
/// empty mapping and the whole input as body.
pub fn parse(raw: &str) -> (Frontmatter, String) {
    if !opens_header(raw) {
        return (Frontmatter::new(), raw.to_string());
    }

    match split_header(raw) {
        Some((block, rest)) => (parse_header_block(block), strip_leading_blank_lines(rest).to_string()),
        None => {
            warn!("header block opened but never closed, treating document as body");
            (Frontmatter::new(), raw.to_string())
        }
    }
}

/// True when the first line is the delimiter and nothing else.
fn opens_header(raw: &str) -> bool {
    raw.lines().next().is_some_and(|first| first.trim_end() == DELIMITER)
}

/// Returns `(header_block, rest)` for a document whose first line opens a header,
/// once a later line consists solely of the delimiter.
fn split_header(raw: &str) -> Option<(&str, &str)> {
    let mut lines = raw.split_inclusive('\n');
    let first = lines.next()?;

    let start = first.len();
    let mut offset = start;
    for line in lines {
        if line.trim_end() == DELIMITER {
            return Some((&raw[start..offset], &raw[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

fn parse_header_block(block: &str) -> Frontmatter {
    let mut header = Frontmatter::new();
    let mut state = LineState::ExpectKey;

    for line in block.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(item) = trimmed.strip_prefix("- ") {
            // Items outside an open list have nowhere to go.
            if let LineState::ListItems(key) = &state {
                header.push_item(key, unquote(item.trim()).to_string());
            }
            continue;
        }

        state = LineState::ExpectKey;
        let Some(caps) = KEY_LINE_RE.captures(trimmed) else {
            continue;
        };
        let key = caps[1].to_string();
        let value = caps[2].trim();

        if value.is_empty() {
            header.insert(key.clone(), HeaderValue::List(Vec::new()));
            state = LineState::ListItems(key);
        } else {
            header.insert(key, scalar(value));
        }
    }

    header
}

fn scalar(value: &str) -> HeaderValue {
    match value {
        "true" => HeaderValue::Bool(true),
        "false" => HeaderValue::Bool(false),
        _ => HeaderValue::Text(unquote(value).to_string()),
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn strip_leading_blank_lines(text: &str) -> &str {
    let mut rest = text;
    while let Some(idx) = rest.find('\n') {
        if !rest[..idx].trim().is_empty() {
            return rest;
        }
        rest = &rest[idx + 1..];
    }
    if rest.trim().is_empty() {
        ""
    } else {
        rest
    }
}

/// Rebuild a document from a header mapping and body. `parse(compose(h, b))`
/// yields an equivalent header and the same body.
pub fn compose(header: &Frontmatter, body: &str) -> String {
    if header.is_empty() {
        // A body that itself starts with the delimiter needs an empty header in
        // front, or it would be read back as a header.
        if body.starts_with(DELIMITER) {
            return format!("{DELIMITER}\n{DELIMITER}\n{body}");
        }
        return body.to_string();
    }

    let mut out = String::new();
    out.push_str(DELIMITER);
    out.push('\n');
    for (key, value) in header.iter() {
        match value {
            HeaderValue::Bool(b) => out.push_str(&format!("{key}: {b}\n")),
            HeaderValue::Text(s) => out.push_str(&format!("{key}: {}\n", quote_if_needed(s))),
            HeaderValue::List(items) => {
                out.push_str(&format!("{key}:\n"));
                for item in items {
                    out.push_str(&format!("  - {}\n", quote_if_needed(item)));
                }
            }
        }
    }
    out.push_str(DELIMITER);
    out.push('\n');
    if !body.is_empty() {
        out.push('\n');
        out.push_str(body);
    }
    out
}

/// Strings that would be re-read as something else get wrapped in double quotes.
fn quote_if_needed(value: &str) -> String {
    let ambiguous = value.is_empty()
        || value == "true"
        || value == "false"
        || value != value.trim()
        || value.starts_with('"')
        || value.starts_with('\'');
    if ambiguous {
        format!("\"{value}\"")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_header_returns_input_as_body() {
        let raw = "# Title\n\nJust prose.\n";
        let (header, body) = parse(raw);
        assert!(header.is_empty());
        assert_eq!(body, raw);
    }

    #[test]
    fn parse_scalars_and_lists() {
        let raw = r#"---
description: "Use strict TypeScript"
alwaysApply: false
priority: high
globs:
  - "*.ts"
  - '*.tsx'
---


# Strict mode

Body text.
"#;
        let (header, body) = parse(raw);
        assert_eq!(
            header.get("description"),
            Some(&HeaderValue::Text("Use strict TypeScript".to_string()))
        );
        assert_eq!(header.get("alwaysApply"), Some(&HeaderValue::Bool(false)));
        assert_eq!(header.get("priority"), Some(&HeaderValue::Text("high".to_string())));
        assert_eq!(
            header.get("globs"),
            Some(&HeaderValue::List(vec!["*.ts".to_string(), "*.tsx".to_string()]))
        );
        assert_eq!(body, "# Strict mode\n\nBody text.\n");
        assert!(!header.always_apply());
        assert_eq!(header.globs(), vec!["*.ts", "*.tsx"]);
    }

    #[test]
    fn unclosed_header_degrades_to_body() {
        let raw = "---\ndescription: never closed\n\nBody.";
        let (header, body) = parse(raw);
        assert!(header.is_empty());
        assert_eq!(body, raw);
    }

    #[test]
    fn delimiter_must_be_alone_on_first_line() {
        let raw = "---- not a header\nkey: value\n---\nbody";
        let (header, body) = parse(raw);
        assert!(header.is_empty());
        assert_eq!(body, raw);
        assert!(!opens_header(raw));
        assert!(opens_header("---\r\nkey: value\r\n---\r\n"));
        assert!(opens_header("---  \nkey: value"));
        assert!(!opens_header(""));
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let raw = "---\n: no key\n- orphan item\nnot a pair\nname: kept\n---\nbody";
        let (header, body) = parse(raw);
        assert_eq!(header.len(), 1);
        assert_eq!(header.get("name"), Some(&HeaderValue::Text("kept".to_string())));
        assert_eq!(body, "body");
    }

    #[test]
    fn scalar_line_closes_open_list() {
        let raw = "---\ntags:\n  - a\nname: x\n  - b\n---\n";
        let (header, body) = parse(raw);
        assert_eq!(header.get("tags"), Some(&HeaderValue::List(vec!["a".to_string()])));
        assert_eq!(body, "");
    }

    #[test]
    fn crlf_documents_parse() {
        let raw = "---\r\nalwaysApply: true\r\n---\r\n\r\nBody\r\n";
        let (header, body) = parse(raw);
        assert!(header.always_apply());
        assert_eq!(body, "Body\r\n");
    }

    #[test]
    fn always_apply_accepts_quoted_true() {
        let (header, _) = parse("---\nalwaysApply: \"true\"\n---\n");
        assert_eq!(header.get("alwaysApply"), Some(&HeaderValue::Text("true".to_string())));
        assert!(header.always_apply());

        let (header, _) = parse("---\nalwaysApply: yes\n---\n");
        assert!(!header.always_apply());
    }

    #[test]
    fn globs_from_comma_separated_string() {
        let (header, _) = parse("---\nglobs: *.rs, Cargo.toml,\n---\n");
        assert_eq!(header.globs(), vec!["*.rs", "Cargo.toml"]);

        let (header, _) = parse("---\nglobs: [\"src/**\", tests/**]\n---\n");
        assert_eq!(header.globs(), vec!["src/**", "tests/**"]);

        let (header, _) = parse("---\ndescription: none\n---\n");
        assert!(header.globs().is_empty());
    }

    #[test]
    fn duplicate_key_keeps_first_position() {
        let (header, _) = parse("---\na: 1\nb: 2\na: 3\n---\n");
        let keys: Vec<&str> = header.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(header.get("a"), Some(&HeaderValue::Text("3".to_string())));
    }

    #[test]
    fn compose_then_parse_preserves_header_and_body() {
        let raw = "---\ndescription: Rust error handling\nalwaysApply: false\nnote: \"true\"\nempty: \"\"\nglobs:\n  - \"**/*.rs\"\n  - build.rs\nseeAlso:\n---\n\nUse `thiserror` for libraries.\n";
        let (header, body) = parse(raw);
        let rebuilt = compose(&header, &body);
        let (header2, body2) = parse(&rebuilt);
        assert_eq!(header, header2);
        assert_eq!(body, body2);
        assert_eq!(header2.get("seeAlso"), Some(&HeaderValue::List(Vec::new())));

        // An empty header in front of a body that looks like a header.
        let raw = "---\n---\n---\nname: x\n---\nbody";
        let (header, body) = parse(raw);
        assert!(header.is_empty());
        assert_eq!(body, "---\nname: x\n---\nbody");
        let rebuilt = compose(&header, &body);
        assert_eq!(parse(&rebuilt), (header, body));
    }

    #[test]
    fn compose_without_header_is_body() {
        assert_eq!(compose(&Frontmatter::new(), "plain"), "plain");
    }

    #[test]
    fn serializes_as_ordered_map() {
        let (header, _) = parse("---\nz: last\nalwaysApply: true\nglobs:\n  - a\n---\n");
        let json = serde_json::to_string(&header).unwrap();
        assert_eq!(json, r#"{"z":"last","alwaysApply":true,"globs":["a"]}"#);

        let back: Frontmatter = serde_json::from_str(&json).unwrap();
        assert_eq!(back, header);
    }
}
