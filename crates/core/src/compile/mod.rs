//! Per-note compilation, run in parallel with failures isolated per note.

pub mod scheduler;
pub mod task;

use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;

use crate::engine::{AssetStager, EngineError, TypesetEngine};
use crate::index::{NoteId, VaultIndex};
use crate::pipeline::{Pipeline, StageError};
use crate::resolve::{Reference, Resolver, Warning};

pub use scheduler::{SchedulerError, compile_all, default_jobs};
pub use task::compile_note;

/// What a compile task produces.
pub enum OutputMode<'a> {
    /// A complete document per note, written to `dir/<id>.tex` and typeset
    /// when an engine is given.
    Standalone { dir: PathBuf, engine: Option<&'a dyn TypesetEngine> },
    /// A chapter fragment kept in memory for book assembly.
    Chapter { namespaces: &'a HashMap<NoteId, String> },
}

/// Everything a compile task needs. Built before scheduling and only read
/// afterwards, so it is shared by reference across workers.
pub struct CompileContext<'a> {
    pub index: &'a VaultIndex,
    pub resolver: Resolver<'a>,
    pub pre: &'a Pipeline,
    pub post: &'a Pipeline,
    pub stager: &'a AssetStager,
    pub mode: OutputMode<'a>,
    pub author: &'a str,
    /// Fail a note whose expansion left unresolved or cyclic references.
    pub fail_on_broken_references: bool,
}

#[derive(Debug, Clone)]
pub struct Artifact {
    pub title: String,
    /// The LaTeX produced: a full document or a chapter.
    pub fragment: String,
    pub resolved: Vec<Reference>,
    pub warnings: Vec<Warning>,
    pub tex_path: Option<PathBuf>,
    pub pdf_path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum NoteCompileError {
    #[error("note '{0}' is not in the index")]
    UnknownNote(NoteId),

    #[error("{count} broken reference(s)")]
    BrokenReferences { count: usize },

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("compilation panicked: {0}")]
    Panic(String),
}

#[derive(Debug)]
pub struct CompileResult {
    pub note: NoteId,
    pub outcome: Result<Artifact, NoteCompileError>,
}

impl CompileResult {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.outcome.as_ref().ok()
    }

    pub fn warnings(&self) -> &[Warning] {
        self.artifact().map_or(&[], |a| a.warnings.as_slice())
    }
}
