//! Book assembly: ordering compiled chapters, namespacing their labels and
//! producing one master document.

pub mod assembler;
pub mod namespace;
pub mod sorter;
pub mod spec;

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::EngineError;
use crate::index::NoteId;
use crate::scripting::ScriptingError;

pub use assembler::{BookArtifact, BookAssembler};
pub use namespace::{namespace_for, qualify_labels};
pub use sorter::{SortEntry, Sorter};
pub use spec::{BookSpec, Part};

/// Invalid `[book]` configuration, detected before compilation.
#[derive(Debug, Error)]
pub enum BookSpecError {
    #[error("empty entry in book note list")]
    EmptyEntry,

    #[error("invalid glob '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("pattern '{0}' matches no note")]
    NoMatch(String),

    #[error("note '{0}' appears more than once in the book")]
    Duplicate(NoteId),

    #[error("the book contains no notes")]
    Empty,

    #[error("cover image not found: {}", .0.display())]
    MissingCover(PathBuf),

    #[error("unknown sorter '{0}': expected $alphabetical, $modified, $created or 'path.lua:function'")]
    UnknownSorter(String),

    #[error("failed to load sorter '{binding}': {source}")]
    SorterPlugin {
        binding: String,
        #[source]
        source: ScriptingError,
    },
}

fn join_ids(ids: &[NoteId]) -> String {
    ids.iter().map(NoteId::as_str).collect::<Vec<_>>().join(", ")
}

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("book notes missing or failed to compile: {}", join_ids(.missing))]
    MissingDependency { missing: Vec<NoteId> },

    #[error("sorter for part '{part}' did not return a permutation of its notes")]
    NotAPermutation { part: String },

    #[error("sorter for part '{part}' failed: {source}")]
    Sorter {
        part: String,
        #[source]
        source: ScriptingError,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),
}
