//! External tools: the LaTeX typesetting engine and the vector converter.

pub mod assets;
pub mod merge;
pub mod typeset;

use std::path::PathBuf;

use thiserror::Error;

pub use assets::{AssetStager, StageOutcome, VectorConverter};
pub use merge::merge_pdfs;
pub use typeset::{TypesetEngine, Xelatex, extract_relevant_error};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} failed on {}:\n{excerpt}", file.display())]
    Failed { program: String, file: PathBuf, excerpt: String },

    #[error("{program} finished but produced no {}", output.display())]
    MissingOutput { program: String, output: PathBuf },

    #[error("converter '{program}' failed on {}: {message}", input.display())]
    Conversion { program: String, input: PathBuf, message: String },

    #[error("empty converter command")]
    EmptyCommand,

    #[error("failed to merge PDFs into {}: {message}", output.display())]
    Merge { output: PathBuf, message: String },
}
