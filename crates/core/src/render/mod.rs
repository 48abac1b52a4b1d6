//! Markdown to LaTeX conversion.
//!
//! [`LatexRenderer`] turns the expanded Markdown of one note into a LaTeX
//! body. It never touches the filesystem: images are looked up in the map of
//! already staged assets carried by the [`RenderContext`].

pub mod document;
pub mod latex;

use std::collections::HashMap;
use std::path::PathBuf;

use crate::index::{Heading, NoteId};

pub use document::{BookMaster, MasterPart, chapter_document, master_document, standalone_document};
pub use latex::{LatexRenderer, escape_latex};

/// Label given to each chapter heading; links to a note without anchor target it.
pub const CHAPTER_LABEL: &str = "note";

/// An asset copied (or converted) into the build directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedAsset {
    /// Path written into the generated LaTeX.
    pub tex_path: PathBuf,
    /// Included with `\includesvg` instead of `\includegraphics`.
    pub svg: bool,
}

/// How cross-note links are rendered.
#[derive(Debug, Clone, Copy)]
pub enum RenderMode<'a> {
    /// One PDF per note: only links within the note are navigable.
    Standalone,
    /// A chapter of a book: links to other chapters are qualified with the
    /// target's namespace.
    Chapter { namespaces: &'a HashMap<NoteId, String> },
}

#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    /// The note being rendered.
    pub note: &'a NoteId,
    pub mode: RenderMode<'a>,
    /// Staged assets keyed by their absolute source path.
    pub assets: &'a HashMap<PathBuf, StagedAsset>,
    /// The note's indexed headings, in order. Rendered headings take their
    /// slugs from here so labels match resolved anchors.
    pub headings: &'a [Heading],
}
