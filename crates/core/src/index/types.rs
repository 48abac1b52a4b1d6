//! Index data types for vault notes.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::vault::frontmatter::Frontmatter;
use crate::vault::walker::to_slash;

/// Stable note identifier: path relative to the vault root, `/`-separated,
/// without the `.md` extension, lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    /// Build an id from a path relative to the vault root.
    pub fn from_relative_path(path: &Path) -> Self {
        Self::normalize(&to_slash(path))
    }

    /// Normalize user-written text (`Notes/A.md`, `./notes/a`) into an id.
    pub fn normalize(raw: &str) -> Self {
        let cleaned = raw.trim().replace('\\', "/");
        let cleaned = cleaned.trim_start_matches("./").trim_start_matches('/');
        let lower = cleaned.to_lowercase();
        let stripped = lower.strip_suffix(".md").unwrap_or(&lower);
        Self(stripped.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path component.
    pub fn stem(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Directory part of the id, empty for notes at the vault root.
    pub fn parent_dir(&self) -> &str {
        self.0.rsplit_once('/').map_or("", |(dir, _)| dir)
    }

    pub fn depth(&self) -> usize {
        self.0.matches('/').count()
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A heading inside a note body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub text: String,
    /// Unique within the note.
    pub slug: String,
    pub level: u8,
    /// Byte offset of the heading line in the note body.
    pub offset: usize,
    /// Exclusive end of the heading's section in the note body.
    pub section_end: usize,
}

/// A `^id` block anchor; `span` indexes the note body and excludes the marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockAnchor {
    pub span: Range<usize>,
}

/// One indexed source note. Immutable once the index is built.
#[derive(Debug, Clone)]
pub struct Note {
    pub id: NoteId,
    /// Path relative to the vault root, original case.
    pub path: PathBuf,
    pub absolute_path: PathBuf,
    pub title: String,
    /// Full file contents.
    pub raw: String,
    /// Contents after the frontmatter block.
    pub body: String,
    pub frontmatter: Option<Frontmatter>,
    pub banner: Option<String>,
    pub modified: DateTime<Utc>,
    pub headings: Vec<Heading>,
    pub blocks: BTreeMap<String, BlockAnchor>,
}

impl Note {
    /// Find a heading by anchor text (compared by slug).
    pub fn heading(&self, anchor: &str) -> Option<&Heading> {
        let wanted = crate::vault::slug::slugify(anchor);
        self.headings
            .iter()
            .find(|h| h.slug == wanted)
            .or_else(|| self.headings.iter().find(|h| h.text.eq_ignore_ascii_case(anchor.trim())))
    }

    pub fn block(&self, id: &str) -> Option<&BlockAnchor> {
        self.blocks.get(id)
    }

    /// Text of a heading's section, heading line included.
    pub fn section_text(&self, heading: &Heading) -> &str {
        &self.body[heading.offset..heading.section_end]
    }

    /// Text of a block anchor's span, marker excluded.
    pub fn block_text(&self, block: &BlockAnchor) -> &str {
        &self.body[block.span.clone()]
    }

    /// 1-based line in the source file of a byte offset into `body`.
    pub fn line_at(&self, body_offset: usize) -> usize {
        let frontmatter_len = self.raw.len().saturating_sub(self.body.len());
        let before_body = self.raw[..frontmatter_len].matches('\n').count();
        let end = body_offset.min(self.body.len());
        before_body + self.body[..end].matches('\n').count() + 1
    }

    /// File name shown in embed titles.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| self.id.to_string(), |n| n.to_string_lossy().into_owned())
    }
}

/// Problems found while building the index; the affected file is left out.
#[derive(Debug, Clone, Serialize)]
pub struct IndexWarning {
    pub path: PathBuf,
    pub message: String,
}
