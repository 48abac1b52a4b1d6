//! Reference resolution: wikilinks, transclusions and image embeds.
//!
//! [`Resolver::expand_note`] rewrites a note body into plain CommonMark in
//! which every reference has been turned into something the converter
//! understands:
//!
//! - `[display](<xref:ID#h:slug>)` for a resolved link (`#b:id` for blocks),
//! - `[display](<broken:target>)` for anything that could not be resolved,
//! - a `> [!embed] Title` callout holding an expanded transclusion,
//! - `![](<asset:/abs/path> "300")` for a located image.

pub mod reference;
pub mod resolver;

use std::fmt;

use serde::Serialize;

use crate::index::NoteId;

pub use reference::{Anchor, RefTarget, Reference, ReferenceKind, Token, parse_references};
pub use resolver::{Expansion, ResolveError, ResolvedAnchor, ResolvedTarget, Resolver};

/// Link destination schemes produced by the resolver.
pub const XREF_SCHEME: &str = "xref:";
pub const BROKEN_SCHEME: &str = "broken:";
pub const ASSET_SCHEME: &str = "asset:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    UnresolvedReference,
    CyclicTransclusion,
    MissingAsset,
    AssetConversion,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WarningKind::UnresolvedReference => "unresolved reference",
            WarningKind::CyclicTransclusion => "cyclic transclusion",
            WarningKind::MissingAsset => "missing asset",
            WarningKind::AssetConversion => "asset conversion",
        };
        f.write_str(name)
    }
}

/// A recoverable problem in one note; compilation continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    /// Note containing the offending reference.
    pub note: NoteId,
    pub line: Option<usize>,
    pub message: String,
}

impl Warning {
    /// Warnings that count as broken references for the book policy.
    pub fn is_broken_reference(&self) -> bool {
        matches!(self.kind, WarningKind::UnresolvedReference | WarningKind::CyclicTransclusion)
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}: {}: {}", self.note, line, self.kind, self.message),
            None => write!(f, "{}: {}: {}", self.note, self.kind, self.message),
        }
    }
}
