//! Frontmatter parsing from markdown documents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use thiserror::Error;

/// Errors that can occur during frontmatter parsing.
#[derive(Debug, Error)]
pub enum FrontmatterParseError {
    #[error("invalid YAML frontmatter: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),
}

/// Represents parsed YAML frontmatter from a markdown document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Frontmatter {
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl Frontmatter {
    /// String value of a field, if present and scalar.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

/// Result of splitting frontmatter from markdown.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub frontmatter: Option<Frontmatter>,
    /// The markdown body (everything after frontmatter).
    pub body: String,
}

/// Parse frontmatter from markdown content.
///
/// Frontmatter is delimited by `---` at the very start of the document:
/// ```markdown
/// ---
/// key: value
/// ---
/// # Document content
/// ```
pub fn parse(content: &str) -> Result<ParsedDocument, FrontmatterParseError> {
    let no_frontmatter = || ParsedDocument { frontmatter: None, body: content.to_string() };

    let Some(after_first) = content.strip_prefix("---") else {
        return Ok(no_frontmatter());
    };

    // The opening delimiter must be alone on its line
    let Some(after_newline) = after_first
        .strip_prefix('\n')
        .or_else(|| after_first.strip_prefix("\r\n"))
    else {
        return Ok(no_frontmatter());
    };

    let Some(end_pos) = find_closing_delimiter(after_newline) else {
        return Ok(no_frontmatter());
    };

    let yaml_content = &after_newline[..end_pos];
    let after_closing = &after_newline[end_pos + 3..];
    let body = after_closing
        .strip_prefix('\n')
        .or_else(|| after_closing.strip_prefix("\r\n"))
        .unwrap_or(after_closing)
        .to_string();

    let frontmatter: Frontmatter = if yaml_content.trim().is_empty() {
        Frontmatter::default()
    } else {
        serde_yaml::from_str(yaml_content.trim())?
    };

    Ok(ParsedDocument { frontmatter: Some(frontmatter), body })
}

/// Find the byte position of the closing `---` delimiter.
fn find_closing_delimiter(content: &str) -> Option<usize> {
    let mut pos = 0;
    for line in content.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Some(pos);
        }
        pos += line.len();
    }
    None
}
