use comrak::nodes::{AstNode, NodeValue, Sourcepos};
use comrak::{Arena, Options, parse_document};

use crate::markdown_ast::types::HeadingInfo;

/// Parse options used everywhere a note is parsed, so the index and the renderer
/// agree on what is a heading.
pub fn options() -> Options<'static> {
    let mut options = Options::default();
    // GFM extensions plus `$` math
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.extension.math_dollars = true;

    // Don't convert quotes/dashes
    options.parse.smart = false;

    options
}

/// Find all headings in the document along with their section bounds.
pub fn find_headings(input: &str) -> Vec<HeadingInfo> {
    let arena = Arena::new();
    let options = options();
    let root = parse_document(&arena, input, &options);

    let mut found: Vec<(String, u8, Sourcepos)> = Vec::new();
    for node in root.descendants() {
        if let NodeValue::Heading(ref heading) = node.data.borrow().value {
            found.push((collect_text(node), heading.level, node.data.borrow().sourcepos));
        }
    }

    found
        .iter()
        .enumerate()
        .map(|(i, (title, level, pos))| HeadingInfo {
            title: title.trim().to_string(),
            level: *level,
            start: line_start_offset(input, pos.start.line),
            section_end: find_section_end_offset(input, *level, &found[i + 1..]),
        })
        .collect()
}

/// Find the byte offset where a section ends: the start of the next heading of the
/// same or higher level, or EOF.
fn find_section_end_offset(
    input: &str,
    level: u8,
    following: &[(String, u8, Sourcepos)],
) -> usize {
    following
        .iter()
        .find(|(_, other, _)| *other <= level)
        .map_or(input.len(), |(_, _, pos)| line_start_offset(input, pos.start.line))
}

/// Get the byte offset at the start of a line (1-based)
pub fn line_start_offset(input: &str, line_num: usize) -> usize {
    if line_num <= 1 {
        return 0;
    }

    let mut current_line = 1;

    for (i, ch) in input.char_indices() {
        if ch == '\n' {
            current_line += 1;
            if current_line == line_num {
                return i + 1;
            }
        }
    }

    input.len()
}

/// Concatenate the literal text below a node.
pub fn collect_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut text = String::new();
    for child in node.descendants() {
        match child.data.borrow().value {
            NodeValue::Text(ref t) => text.push_str(t),
            NodeValue::Code(ref c) => text.push_str(&c.literal),
            NodeValue::Math(ref m) => text.push_str(&m.literal),
            _ => {}
        }
    }
    text
}
