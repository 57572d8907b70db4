//! Identity and display names derived from a guide's file name.

use std::cmp::Ordering;
use std::path::Path;

use deunicode::deunicode;

/// File stems treated as a stack's overview document.
const OVERVIEW_STEMS: &[&str] = &["readme"];

/// Lowercase, runs of non-alphanumerics collapsed to `-`, no leading/trailing `-`.
pub fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_dash = false;
    for ch in s.chars() {
        let lc = ch.to_ascii_lowercase();
        if lc.is_ascii_alphanumeric() {
            out.push(lc);
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    out.trim_matches('-').to_string()
}

/// File name without its final extension.
pub fn file_stem(file_name: &str) -> &str {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
}

pub fn guide_id(file_name: &str) -> String {
    slugify(file_stem(file_name))
}

/// `error-handling_rules.mdc` becomes `Error Handling Rules`.
pub fn guide_title(file_name: &str) -> String {
    file_stem(file_name)
        .split(['-', '_', ' '])
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn is_overview(file_name: &str) -> bool {
    let stem = file_stem(file_name).to_lowercase();
    OVERVIEW_STEMS.contains(&stem.as_str())
}

/// Title ordering close to a locale collation: accents and case are folded
/// first, so `Émile` sorts with `Emile` rather than after `Zeta`. Titles equal
/// after folding fall back to codepoints, then lowercase before uppercase.
pub fn compare_titles(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
        .then_with(|| case_order(a, b))
}

fn collation_key(title: &str) -> String {
    deunicode(title).to_lowercase()
}

fn case_order(a: &str, b: &str) -> Ordering {
    a.chars()
        .zip(b.chars())
        .find_map(|(x, y)| match (x.is_lowercase(), y.is_lowercase()) {
            (true, false) => Some(Ordering::Less),
            (false, true) => Some(Ordering::Greater),
            _ => None,
        })
        .unwrap_or(Ordering::Equal)
}
