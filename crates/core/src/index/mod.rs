//! Vault index: every note with its headings and block anchors.
//!
//! The index is built once per run, before any compilation starts, and is
//! read-only afterwards. Worker threads share it by reference.
//!
//! # Example
//!
//! ```no_run
//! use mdpress_core::index::IndexBuilder;
//! use std::path::Path;
//!
//! let index = IndexBuilder::new(Path::new("vault"), &[]).build().unwrap();
//! if let Some(note) = index.lookup("Intro", None) {
//!     println!("{} has {} headings", note.id, note.headings.len());
//! }
//! ```

pub mod builder;
pub mod types;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub use builder::{IndexBuilder, IndexError};
pub use types::{BlockAnchor, Heading, IndexWarning, Note, NoteId};

#[derive(Debug)]
pub struct VaultIndex {
    root: PathBuf,
    /// Notes in traversal order.
    notes: Vec<Note>,
    by_id: HashMap<NoteId, usize>,
    by_stem: HashMap<String, Vec<usize>>,
    warnings: Vec<IndexWarning>,
}

impl VaultIndex {
    /// Assemble an index from already-extracted notes. A note whose id collides
    /// (case-insensitively) with an earlier one is dropped with a warning.
    pub fn from_notes(
        root: PathBuf,
        notes: Vec<Note>,
        mut warnings: Vec<IndexWarning>,
    ) -> Self {
        let mut kept: Vec<Note> = Vec::with_capacity(notes.len());
        let mut by_id = HashMap::new();
        let mut by_stem: HashMap<String, Vec<usize>> = HashMap::new();

        for note in notes {
            if let Some(&existing) = by_id.get(&note.id) {
                let existing: &Note = &kept[existing];
                let message = format!(
                    "note id '{}' collides with {}",
                    note.id,
                    existing.path.display()
                );
                tracing::warn!("skipping {}: {}", note.path.display(), message);
                warnings.push(IndexWarning { path: note.path.clone(), message });
                continue;
            }
            let position = kept.len();
            by_id.insert(note.id.clone(), position);
            by_stem.entry(note.id.stem().to_string()).or_default().push(position);
            kept.push(note);
        }

        Self { root, notes: kept, by_id, by_stem, warnings }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Notes in vault traversal order.
    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.notes.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &NoteId> {
        self.notes.iter().map(|n| &n.id)
    }

    pub fn get(&self, id: &NoteId) -> Option<&Note> {
        self.by_id.get(id).map(|&i| &self.notes[i])
    }

    pub fn warnings(&self) -> &[IndexWarning] {
        &self.warnings
    }

    /// Resolve link text to a note, case-insensitively.
    ///
    /// An exact id wins. Otherwise any note whose id ends with `/<target>` is a
    /// candidate; ties prefer the directory of `from`, then the shallowest path,
    /// then the lexicographically smallest id.
    pub fn lookup(&self, target: &str, from: Option<&NoteId>) -> Option<&Note> {
        let wanted = NoteId::normalize(target);
        if wanted.as_str().is_empty() {
            return None;
        }
        if let Some(note) = self.get(&wanted) {
            return Some(note);
        }

        let suffix = format!("/{wanted}");
        let from_dir = from.map(NoteId::parent_dir);

        self.by_stem
            .get(wanted.stem())?
            .iter()
            .map(|&i| &self.notes[i])
            .filter(|n| n.id.as_str().ends_with(&suffix))
            .min_by_key(|n| {
                let same_dir = from_dir == Some(n.id.parent_dir());
                (!same_dir, n.id.depth(), n.id.as_str().to_string())
            })
    }

    /// Find the note stored at an absolute or vault-relative file path.
    pub fn lookup_path(&self, path: &Path) -> Option<&Note> {
        let relative = if path.is_absolute() {
            let canonical = path.canonicalize().ok()?;
            canonical.strip_prefix(&self.root).ok()?.to_path_buf()
        } else {
            path.to_path_buf()
        };
        self.get(&NoteId::from_relative_path(&relative))
    }
}
