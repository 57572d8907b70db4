/// Markdown-to-HTML renderer for guide bodies.
///
/// The dialect is deliberately small:
/// - ATX headings `#` through `######`
/// - horizontal rules `---` and `***`
/// - `>` quotes, one `<blockquote>` per line
/// - `-`/`*` and `1.` list items; a run of consecutive items becomes one list,
///   ordered if the run's first item is numbered
/// - fenced code blocks with an optional language
/// - emphasis with `*` or `_` (single, double, triple), inline code, links, images
///
/// Rendering runs in two passes. The block pass classifies lines into headings,
/// rules, quotes, lists, fences, raw HTML and paragraphs. The inline pass then runs
/// only over text-bearing blocks, so code fences and code spans are never touched
/// by emphasis or link parsing.
///
/// By default only fenced code is escaped and raw HTML passes through untouched,
/// which guide authors rely on for embedded markup. `RenderOptions::escape_html`
/// escapes every text leaf instead.
use std::sync::LazyLock;

use regex::Regex;

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.*?)\s*$").expect("valid regex"));
static UNORDERED_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[-*]\s+(.*?)\s*$").expect("valid regex"));
static ORDERED_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+\.\s+(.*?)\s*$").expect("valid regex"));
static HTML_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*</?(?:blockquote|details|div|figure|h[1-6]|hr|li|ol|p|pre|section|summary|table|ul)(?:\s|/?>|$)",
    )
    .expect("valid regex")
});

const FENCE: &str = "```";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Escape `&`, `<` and `>` in all text, not just fenced code.
    pub escape_html: bool,
}

/// Render a guide body with the default pass-through behaviour.
pub fn render(body: &str) -> String {
    render_with(body, RenderOptions::default())
}

pub fn render_with(body: &str, options: RenderOptions) -> String {
    parse_blocks(body, options)
        .iter()
        .filter_map(|block| render_block(block, options))
        .collect::<Vec<_>>()
        .join("\n")
}

// --- Block pass ---

#[derive(Debug, PartialEq)]
enum Block<'a> {
    Heading { level: usize, text: &'a str },
    Rule,
    Quote(&'a str),
    List { ordered: bool, items: Vec<&'a str> },
    Code { lang: &'a str, lines: Vec<&'a str> },
    Html(Vec<&'a str>),
    Paragraph(Vec<&'a str>),
}

#[derive(Debug, PartialEq)]
enum Line<'a> {
    Blank,
    Fence(&'a str),
    Heading(usize, &'a str),
    Rule,
    Quote(&'a str),
    Item { ordered: bool, text: &'a str },
    Html,
    Text,
}

fn classify(line: &str, options: RenderOptions) -> Line<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Line::Blank;
    }
    if let Some(lang) = trimmed.strip_prefix(FENCE) {
        return Line::Fence(lang.trim());
    }
    if let Some(caps) = HEADING_RE.captures(trimmed) {
        let level = caps.get(1).map_or(1, |m| m.len());
        let text = caps.get(2).map_or("", |m| m.as_str());
        return Line::Heading(level, text);
    }
    if trimmed == "---" || trimmed == "***" {
        return Line::Rule;
    }
    if let Some(rest) = trimmed.strip_prefix('>') {
        return Line::Quote(rest.strip_prefix(' ').unwrap_or(rest).trim_end());
    }
    if let Some(caps) = ORDERED_ITEM_RE.captures(line) {
        let text = caps.get(1).map_or("", |m| m.as_str());
        return Line::Item { ordered: true, text };
    }
    if let Some(caps) = UNORDERED_ITEM_RE.captures(line) {
        let text = caps.get(1).map_or("", |m| m.as_str());
        return Line::Item { ordered: false, text };
    }
    if !options.escape_html && HTML_BLOCK_RE.is_match(line) {
        return Line::Html;
    }
    Line::Text
}

fn parse_blocks(body: &str, options: RenderOptions) -> Vec<Block<'_>> {
    let lines: Vec<&str> = body.lines().collect();
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        match classify(lines[i], options) {
            Line::Blank => i += 1,
            Line::Fence(lang) => {
                let close = (i + 1..lines.len()).find(|&j| lines[j].trim().starts_with(FENCE));
                match close {
                    Some(end) => {
                        blocks.push(Block::Code {
                            lang,
                            lines: lines[i + 1..end].to_vec(),
                        });
                        i = end + 1;
                    }
                    // An unterminated fence is ordinary text.
                    None => i = push_paragraph(&lines, i, options, &mut blocks),
                }
            }
            Line::Heading(level, text) => {
                blocks.push(Block::Heading { level, text });
                i += 1;
            }
            Line::Rule => {
                blocks.push(Block::Rule);
                i += 1;
            }
            Line::Quote(text) => {
                blocks.push(Block::Quote(text));
                i += 1;
            }
            Line::Item { ordered, text } => {
                let mut items = vec![text];
                i += 1;
                while i < lines.len() {
                    match classify(lines[i], options) {
                        Line::Item { text, .. } => items.push(text),
                        _ => break,
                    }
                    i += 1;
                }
                blocks.push(Block::List { ordered, items });
            }
            Line::Html => {
                let start = i;
                while i < lines.len() && !lines[i].trim().is_empty() {
                    i += 1;
                }
                blocks.push(Block::Html(lines[start..i].to_vec()));
            }
            Line::Text => i = push_paragraph(&lines, i, options, &mut blocks),
        }
    }

    blocks
}

/// Collect a paragraph starting at `start` and return the index after it. Any
/// structural line interrupts the paragraph.
fn push_paragraph<'a>(
    lines: &[&'a str],
    start: usize,
    options: RenderOptions,
    blocks: &mut Vec<Block<'a>>,
) -> usize {
    let mut end = start + 1;
    while end < lines.len() && classify(lines[end], options) == Line::Text {
        end += 1;
    }
    let para = lines[start..end].iter().map(|&l| l.trim()).collect();
    blocks.push(Block::Paragraph(para));
    end
}

fn render_block(block: &Block<'_>, options: RenderOptions) -> Option<String> {
    let html = match block {
        Block::Heading { level, text } => {
            format!("<h{level}>{}</h{level}>", render_inline(text, options))
        }
        Block::Rule => "<hr>".to_string(),
        Block::Quote(text) => format!("<blockquote>{}</blockquote>", render_inline(text, options)),
        Block::List { ordered, items } => {
            let tag = if *ordered { "ol" } else { "ul" };
            let mut out = format!("<{tag}>\n");
            for item in items {
                out.push_str(&format!("<li>{}</li>\n", render_inline(item, options)));
            }
            out.push_str(&format!("</{tag}>"));
            out
        }
        Block::Code { lang, lines } => {
            let code = escape_html(&lines.join("\n"));
            match lang.split_whitespace().next() {
                Some(lang) => format!(
                    "<pre><code class=\"language-{}\">{code}</code></pre>",
                    escape_attr(lang)
                ),
                None => format!("<pre><code>{code}</code></pre>"),
            }
        }
        Block::Html(lines) => lines.join("\n"),
        Block::Paragraph(lines) => return render_paragraph(lines, options),
    };
    Some(html)
}

/// Wrap a paragraph in `<p>`, joining its lines with `<br>`. Empty paragraphs are
/// dropped, and a paragraph holding exactly one inline element is emitted bare.
fn render_paragraph(lines: &[&str], options: RenderOptions) -> Option<String> {
    if let [line] = lines {
        let nodes = parse_inline(line);
        if let [node] = nodes.as_slice() {
            if !matches!(node, Inline::Text(_)) {
                return Some(render_nodes(&nodes, options));
            }
        }
    }

    let rendered: Vec<String> = lines
        .iter()
        .map(|line| render_inline(line, options))
        .filter(|line| !line.is_empty())
        .collect();
    if rendered.is_empty() {
        return None;
    }
    Some(format!("<p>{}</p>", rendered.join("<br>\n")))
}

// --- Inline pass ---

#[derive(Debug, PartialEq)]
enum Inline<'a> {
    Text(&'a str),
    Code(&'a str),
    Em(Vec<Inline<'a>>),
    Strong(Vec<Inline<'a>>),
    StrongEm(Vec<Inline<'a>>),
    Link { text: Vec<Inline<'a>>, href: &'a str },
    Image { alt: &'a str, src: &'a str },
}

fn render_inline(text: &str, options: RenderOptions) -> String {
    render_nodes(&parse_inline(text), options)
}

fn parse_inline(s: &str) -> Vec<Inline<'_>> {
    InlineParser::new(s, 0).parse()
}

/// Links and emphasis nested deeper than this are kept as literal text.
const MAX_NESTING: usize = 32;

/// Single pass over one line of text. Bracket pairs and code spans are matched
/// up front, and a scan that finds no closer is remembered, so stray markers
/// cost constant time after the first miss.
///
/// All markers are ASCII, so every slice boundary below lands on a char boundary.
struct InlineParser<'a> {
    s: &'a str,
    depth: usize,
    /// Matching `]` for each `[`, by byte offset.
    bracket_close: Vec<Option<usize>>,
    /// For each backtick opening a code span, the offset just past its closer.
    code_end: Vec<Option<usize>>,
    /// No `)` exists at or after this offset.
    no_paren_from: usize,
    /// No closing run exists at or after this offset, per marker and run length.
    no_closer_from: [[usize; 3]; 2],
}

impl<'a> InlineParser<'a> {
    fn new(s: &'a str, depth: usize) -> Self {
        let bytes = s.as_bytes();

        let mut bracket_close = vec![None; bytes.len()];
        let mut open = Vec::new();
        for (j, &b) in bytes.iter().enumerate() {
            match b {
                b'[' => open.push(j),
                b']' => {
                    if let Some(o) = open.pop() {
                        bracket_close[o] = Some(j);
                    }
                }
                _ => {}
            }
        }

        let mut code_end = vec![None; bytes.len()];
        let mut j = 0;
        while j < bytes.len() {
            if bytes[j] != b'`' {
                j += 1;
                continue;
            }
            match s[j + 1..].find('`') {
                // Empty span: the first backtick is literal.
                Some(0) => j += 1,
                Some(len) => {
                    code_end[j] = Some(j + len + 2);
                    j += len + 2;
                }
                None => break,
            }
        }

        Self {
            s,
            depth,
            bracket_close,
            code_end,
            no_paren_from: usize::MAX,
            no_closer_from: [[usize::MAX; 3]; 2],
        }
    }

    fn parse(mut self) -> Vec<Inline<'a>> {
        let s = self.s;
        let bytes = s.as_bytes();
        let mut nodes = Vec::new();
        let mut text_start = 0;
        let mut i = 0;

        while i < bytes.len() {
            let parsed = match bytes[i] {
                b'`' => self.code_end[i].map(|end| (Inline::Code(&s[i + 1..end - 1]), end)),
                b'!' if bytes.get(i + 1) == Some(&b'[') => self
                    .parse_link(i + 1)
                    .map(|(alt, src, end)| (Inline::Image { alt, src }, end)),
                b'[' => self.parse_link(i).map(|(text, href, end)| {
                    let text = self.nested(text);
                    (Inline::Link { text, href }, end)
                }),
                b'*' | b'_' => match self.parse_emphasis(i) {
                    Ok(found) => Some(found),
                    Err(skip) => {
                        i += skip;
                        continue;
                    }
                },
                _ => None,
            };

            match parsed {
                Some((node, end)) => {
                    if text_start < i {
                        nodes.push(Inline::Text(&s[text_start..i]));
                    }
                    nodes.push(node);
                    i = end;
                    text_start = end;
                }
                None => i += 1,
            }
        }

        if text_start < s.len() {
            nodes.push(Inline::Text(&s[text_start..]));
        }
        nodes
    }

    /// Parse the inside of a link or emphasis one level down.
    fn nested(&self, inner: &'a str) -> Vec<Inline<'a>> {
        if self.depth + 1 >= MAX_NESTING {
            if inner.is_empty() {
                return Vec::new();
            }
            return vec![Inline::Text(inner)];
        }
        InlineParser::new(inner, self.depth + 1).parse()
    }

    /// Parses `[text](target)` starting at the `[`. Returns the text, the target
    /// and the index after the closing parenthesis. Brackets in the text may nest
    /// so an image can sit inside a link.
    fn parse_link(&mut self, open: usize) -> Option<(&'a str, &'a str, usize)> {
        let s = self.s;
        let close = self.bracket_close[open]?;
        if s.as_bytes().get(close + 1) != Some(&b'(') {
            return None;
        }
        let target_start = close + 2;
        if target_start >= self.no_paren_from {
            return None;
        }
        let Some(target_len) = s[target_start..].find(')') else {
            self.no_paren_from = self.no_paren_from.min(target_start);
            return None;
        };
        let target = s[target_start..target_start + target_len]
            .split_whitespace()
            .next()
            .unwrap_or("");
        Some((&s[open + 1..close], target, target_start + target_len + 1))
    }

    /// Parses an emphasis run at `open`. On failure returns how many bytes to
    /// treat as literal text so a run is never split.
    ///
    /// A triple run with no triple closer can still open two nested spans, as in
    /// `***bold** italic*`.
    fn parse_emphasis(&mut self, open: usize) -> Result<(Inline<'a>, usize), usize> {
        let s = self.s;
        let bytes = s.as_bytes();
        let marker = bytes[open];
        let run = bytes[open..].iter().take_while(|&&b| b == marker).count();
        if run > 3 {
            return Err(run);
        }

        let content_start = open + run;
        let opens_word = s[content_start..]
            .chars()
            .next()
            .is_some_and(|c| !c.is_whitespace());
        let intraword =
            marker == b'_' && s[..open].chars().next_back().is_some_and(char::is_alphanumeric);
        if !opens_word || intraword {
            return Err(run);
        }

        let (width, close) = match self.find_closing_run(content_start, marker, run) {
            Some(close) => (run, close),
            None if run == 3 => {
                let single = self.find_closing_run(content_start, marker, 1);
                let double = self.find_closing_run(content_start, marker, 2);
                match (single, double) {
                    (Some(one), Some(two)) if one > two => (1, one),
                    (Some(one), Some(two)) if two > one => (2, two),
                    _ => return Err(run),
                }
            }
            None => return Err(run),
        };

        let children = self.nested(&s[open + width..close]);
        let node = match width {
            3 => Inline::StrongEm(children),
            2 => Inline::Strong(children),
            _ => Inline::Em(children),
        };
        Ok((node, close + width))
    }

    /// Finds a run of exactly `len` markers that can close emphasis opened before
    /// `from`. Code spans are skipped so markers inside them never close anything.
    fn find_closing_run(&mut self, from: usize, marker: u8, len: usize) -> Option<usize> {
        let slot = &mut self.no_closer_from[usize::from(marker == b'_')][len - 1];
        if from >= *slot {
            return None;
        }

        let s = self.s;
        let bytes = s.as_bytes();
        let mut j = from;
        while j < bytes.len() {
            let b = bytes[j];
            if b == b'`' {
                j = self.code_end[j].unwrap_or(j + 1);
                continue;
            }
            if b != marker {
                j += 1;
                continue;
            }

            let run = bytes[j..].iter().take_while(|&&c| c == marker).count();
            let after = j + run;
            let closes_word =
                j > from && !s[..j].chars().next_back().is_some_and(char::is_whitespace);
            let intraword =
                marker == b'_' && s[after..].chars().next().is_some_and(char::is_alphanumeric);
            if run == len && closes_word && !intraword {
                return Some(j);
            }
            j = after;
        }

        let slot = &mut self.no_closer_from[usize::from(marker == b'_')][len - 1];
        *slot = (*slot).min(from);
        None
    }
}

fn render_nodes(nodes: &[Inline<'_>], options: RenderOptions) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            Inline::Text(text) => out.push_str(&text_leaf(text, options)),
            Inline::Code(code) => {
                out.push_str(&format!("<code>{}</code>", text_leaf(code, options)));
            }
            Inline::Em(children) => {
                out.push_str(&format!("<em>{}</em>", render_nodes(children, options)));
            }
            Inline::Strong(children) => {
                out.push_str(&format!("<strong>{}</strong>", render_nodes(children, options)));
            }
            Inline::StrongEm(children) => out.push_str(&format!(
                "<strong><em>{}</em></strong>",
                render_nodes(children, options)
            )),
            Inline::Link { text, href } => out.push_str(&format!(
                "<a href=\"{}\">{}</a>",
                escape_attr(href),
                render_nodes(text, options)
            )),
            Inline::Image { alt, src } => out.push_str(&format!(
                "<img src=\"{}\" alt=\"{}\">",
                escape_attr(src),
                escape_attr(alt)
            )),
        }
    }
    out
}

fn text_leaf(text: &str, options: RenderOptions) -> String {
    if options.escape_html {
        escape_html(text)
    } else {
        text.to_string()
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

fn escape_attr(value: &str) -> String {
    escape_html(value).replace('"', "&quot;")
}
