//! Note content extraction: headings with slugs, block anchors, title.

use std::collections::BTreeMap;
use std::ops::Range;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::index::types::{BlockAnchor, Heading};
use crate::markdown_ast;
use crate::vault::frontmatter::Frontmatter;
use crate::vault::slug::Slugger;

/// `^block-id` at the end of a line, preceded by whitespace or alone on the line.
pub static BLOCK_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)\^([A-Za-z0-9-]+)\s*$").unwrap());

/// Extract headings with collision-free slugs and section bounds.
pub fn extract_headings(body: &str) -> Vec<Heading> {
    let mut slugger = Slugger::new();
    markdown_ast::find_headings(body)
        .into_iter()
        .map(|h| Heading {
            slug: slugger.slug(&h.title),
            text: h.title,
            level: h.level,
            offset: h.start,
            section_end: h.section_end,
        })
        .collect()
}

/// Extract block anchors. A marker only counts at the end of a block's last line.
/// A marker alone on its own line after a blank line names the preceding block.
pub fn extract_blocks(body: &str) -> BTreeMap<String, BlockAnchor> {
    let mut blocks = BTreeMap::new();

    let lines: Vec<(usize, &str)> = {
        let mut pos = 0;
        body.split_inclusive('\n')
            .map(|line| {
                let start = pos;
                pos += line.len();
                (start, line.trim_end_matches(['\n', '\r']))
            })
            .collect()
    };

    let mut in_fence = false;
    let mut block_start: Option<usize> = None;
    let mut previous_block: Option<Range<usize>> = None;

    for (i, (start, line)) in lines.iter().enumerate() {
        let trimmed = line.trim_start_matches(['>', ' ', '\t']);
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
        }

        if line.trim().is_empty() {
            block_start = None;
            continue;
        }

        let first_line_of_block = block_start.is_none();
        let current_start = *block_start.get_or_insert(*start);
        let line_end = start + line.len();

        if in_fence {
            continue;
        }

        let next_is_blank = lines.get(i + 1).is_none_or(|(_, next)| next.trim().is_empty());

        if next_is_blank && let Some(caps) = BLOCK_MARKER_RE.captures(line) {
            let id = caps[1].to_string();
            let marker_start = start + caps.get(0).map_or(0, |m| m.start());

            let span = if first_line_of_block && line.trim() == format!("^{id}") {
                previous_block.clone()
            } else {
                let end = current_start + body[current_start..marker_start].trim_end().len();
                Some(current_start..end)
            };

            if let Some(span) = span {
                if blocks.contains_key(&id) {
                    tracing::warn!("duplicate block anchor ^{} ignored", id);
                } else {
                    blocks.insert(id, BlockAnchor { span });
                }
            }
        }

        if next_is_blank {
            previous_block = Some(current_start..line_end);
        }
    }

    blocks
}

/// Title: frontmatter `title`, else the file stem.
pub fn extract_title(fm: Option<&Frontmatter>, file_path: &Path) -> String {
    if let Some(title) = fm.and_then(|fm| fm.get_str("title")) {
        return title;
    }

    file_path.file_stem().and_then(|s| s.to_str()).unwrap_or("Untitled").to_string()
}

/// Banner image target from frontmatter (`banner: "[[image.png]]"` or a plain path).
pub fn extract_banner(fm: Option<&Frontmatter>) -> Option<String> {
    let raw = fm?.get_str("banner")?;
    let raw = raw.trim();
    let inner = raw
        .strip_prefix("![[")
        .or_else(|| raw.strip_prefix("[["))
        .and_then(|s| s.strip_suffix("]]"))
        .unwrap_or(raw);
    let target = inner.split('|').next().unwrap_or(inner).trim();
    (!target.is_empty()).then(|| target.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_headings_get_suffixes() {
        let body = "# Intro\n\n## Intro\n\n## Other\n";
        let headings = extract_headings(body);
        let slugs: Vec<_> = headings.iter().map(|h| h.slug.as_str()).collect();
        assert_eq!(slugs, vec!["intro", "intro-1", "other"]);
        assert_eq!(headings[1].level, 2);
        assert_eq!(headings[1].offset, body.find("## Intro").unwrap());
    }

    #[test]
    fn test_block_anchor_at_paragraph_end() {
        let body = "First line\nsecond line ^abc123\n\nOther paragraph\n";
        let blocks = extract_blocks(body);
        let span = blocks["abc123"].span.clone();
        assert_eq!(&body[span], "First line\nsecond line");
    }

    #[test]
    fn test_marker_not_at_block_end_is_ignored() {
        let body = "line one ^early\nline two\n";
        assert!(extract_blocks(body).is_empty());
    }

    #[test]
    fn test_marker_on_own_line_names_previous_block() {
        let body = "- item one\n- item two\n\n^list-1\n\nafter\n";
        let blocks = extract_blocks(body);
        assert_eq!(&body[blocks["list-1"].span.clone()], "- item one\n- item two");
    }

    #[test]
    fn test_marker_inside_code_fence_is_ignored() {
        let body = "```\ncode ^nope\n\n```\n";
        assert!(extract_blocks(body).is_empty());
    }

    #[test]
    fn test_caret_without_space_is_not_marker() {
        let body = "x^2\n";
        assert!(extract_blocks(body).is_empty());
    }

    #[test]
    fn test_title_and_banner() {
        let fm: Frontmatter =
            serde_yaml::from_str("title: Custom\nbanner: \"[[img/cover.png|200]]\"").unwrap();
        assert_eq!(extract_title(Some(&fm), Path::new("notes/file.md")), "Custom");
        assert_eq!(extract_title(None, Path::new("notes/file.md")), "file");
        assert_eq!(extract_banner(Some(&fm)).as_deref(), Some("img/cover.png"));
    }
}
