//! Link and transclusion tokens found in note text.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

// Captures:
// 1: `!` for embeds
// 2: inner text `target#anchor|alias`
static WIKILINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(!?)\[\[([^\[\]\n]+?)\]\]").unwrap());

// Captures:
// 1: alt text
// 2: destination, optionally in angle brackets
static MARKDOWN_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"!\[([^\]\n]*)\]\(\s*(<[^>\n]+>|[^)\s]+)(?:\s+"[^"\n]*")?\s*\)"#).unwrap()
});

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "svg", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Link,
    Embed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum RefTarget {
    /// `[[#Heading]]`: the referencing note itself.
    SelfNote,
    /// Target as written, without anchor and alias.
    Note(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum Anchor {
    None,
    Heading(String),
    Block(String),
}

/// A parsed `[[...]]` or `![[...]]` token pointing at a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    pub kind: ReferenceKind,
    pub target: RefTarget,
    pub anchor: Anchor,
    pub alias: Option<String>,
    /// Token text exactly as written.
    pub raw: String,
    /// 1-based line in the scanned text.
    pub line: usize,
    #[serde(skip)]
    pub span: Range<usize>,
}

impl Reference {
    /// Text shown for the link: alias, else anchor text, else the target as written.
    pub fn display(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        match (&self.anchor, &self.target) {
            (Anchor::Heading(text) | Anchor::Block(text), _) => text.clone(),
            (Anchor::None, RefTarget::Note(target)) => target.clone(),
            (Anchor::None, RefTarget::SelfNote) => String::new(),
        }
    }

    /// Target text for diagnostics (`B#Intro`).
    pub fn describe(&self) -> String {
        let target = match &self.target {
            RefTarget::SelfNote => "",
            RefTarget::Note(t) => t.as_str(),
        };
        match &self.anchor {
            Anchor::None => target.to_string(),
            Anchor::Heading(h) => format!("{target}#{h}"),
            Anchor::Block(b) => format!("{target}#^{b}"),
        }
    }
}

/// An image embed (`![[img.png|300]]` or `![alt](img.png)`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReference {
    pub target: String,
    /// Width hint from `|300` / `|300x200`.
    pub size: Option<String>,
    pub alt: String,
    pub line: usize,
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Note(Reference),
    Asset(AssetReference),
}

impl Token {
    pub fn span(&self) -> Range<usize> {
        match self {
            Token::Note(r) => r.span.clone(),
            Token::Asset(a) => a.span.clone(),
        }
    }
}

pub fn is_image_target(target: &str) -> bool {
    target
        .rsplit_once('.')
        .is_some_and(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Find every reference token, in text order. Fenced code blocks and inline
/// code spans are skipped.
pub fn parse_references(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut offset = 0;
    let mut fence: Option<String> = None;

    for (line_idx, line) in text.split_inclusive('\n').enumerate() {
        let line_start = offset;
        offset += line.len();

        let content = line.trim_end_matches(['\n', '\r']);
        let unquoted = content.trim_start_matches(['>', ' ', '\t']);

        if let Some(marker) = &fence {
            if unquoted.starts_with(marker.as_str()) {
                fence = None;
            }
            continue;
        }
        if let Some(marker) = fence_marker(unquoted) {
            fence = Some(marker);
            continue;
        }

        let code_spans = code_spans(content);
        let in_code = |range: &Range<usize>| {
            code_spans.iter().any(|c| c.start < range.end && range.start < c.end)
        };
        let line_number = line_idx + 1;

        for caps in WIKILINK_RE.captures_iter(content) {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            if in_code(&whole) {
                continue;
            }
            let embed = !caps[1].is_empty();
            let span = line_start + whole.start..line_start + whole.end;
            if let Some(token) = parse_wikilink(&caps[2], embed, &caps[0], line_number, span) {
                tokens.push(token);
            }
        }

        for caps in MARKDOWN_IMAGE_RE.captures_iter(content) {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            if in_code(&whole) {
                continue;
            }
            let dest = caps[2].trim_start_matches('<').trim_end_matches('>');
            tokens.push(Token::Asset(AssetReference {
                target: dest.replace("%20", " "),
                size: None,
                alt: caps[1].to_string(),
                line: line_number,
                span: line_start + whole.start..line_start + whole.end,
            }));
        }
    }

    tokens.sort_by_key(|t| t.span().start);
    tokens
}

fn parse_wikilink(
    inner: &str,
    embed: bool,
    raw: &str,
    line: usize,
    span: Range<usize>,
) -> Option<Token> {
    let (link, alias) = match inner.split_once('|') {
        Some((link, alias)) => (link, Some(alias.trim().to_string())),
        None => (inner, None),
    };
    let link = link.trim();

    let (file_part, anchor) = if let Some((file, rest)) = link.split_once('#') {
        // `A#H1#H2` targets the last heading
        let last = rest.rsplit('#').next().unwrap_or(rest).trim();
        let anchor = match last.strip_prefix('^') {
            Some(block) => Anchor::Block(block.to_string()),
            None if last.is_empty() => Anchor::None,
            None => Anchor::Heading(last.to_string()),
        };
        (file.trim(), anchor)
    } else if let Some((file, block)) = link.split_once('^') {
        (file.trim(), Anchor::Block(block.trim().to_string()))
    } else {
        (link, Anchor::None)
    };

    if embed && is_image_target(file_part) {
        let size = alias
            .as_deref()
            .map(|a| a.split('x').next().unwrap_or(a).trim())
            .filter(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
            .map(str::to_string);
        return Some(Token::Asset(AssetReference {
            target: file_part.to_string(),
            size,
            alt: String::new(),
            line,
            span,
        }));
    }

    let target = if file_part.is_empty() {
        if anchor == Anchor::None {
            return None;
        }
        RefTarget::SelfNote
    } else {
        RefTarget::Note(file_part.to_string())
    };

    Some(Token::Note(Reference {
        kind: if embed { ReferenceKind::Embed } else { ReferenceKind::Link },
        target,
        anchor,
        alias: alias.filter(|a| !a.is_empty()),
        raw: raw.to_string(),
        line,
        span,
    }))
}

/// Opening fence marker (the run of backticks or tildes), if the line opens one.
fn fence_marker(line: &str) -> Option<String> {
    let ch = line.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let run = line.chars().take_while(|c| *c == ch).count();
    (run >= 3).then(|| ch.to_string().repeat(run))
}

/// Byte ranges of inline code spans within one line.
fn code_spans(line: &str) -> Vec<Range<usize>> {
    let bytes = line.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'`' {
            i += 1;
            continue;
        }
        let open_start = i;
        while i < bytes.len() && bytes[i] == b'`' {
            i += 1;
        }
        let run = i - open_start;

        // Look for a closing run of the same length
        let mut j = i;
        let mut closed = None;
        while j < bytes.len() {
            if bytes[j] == b'`' {
                let close_start = j;
                while j < bytes.len() && bytes[j] == b'`' {
                    j += 1;
                }
                if j - close_start == run {
                    closed = Some(j);
                    break;
                }
            } else {
                j += 1;
            }
        }

        match closed {
            Some(end) => {
                spans.push(open_start..end);
                i = end;
            }
            None => i = open_start + run,
        }
    }

    spans
}
