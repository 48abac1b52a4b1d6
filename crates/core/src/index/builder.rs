//! Index building orchestration.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::VaultIndex;
use super::types::{IndexWarning, Note, NoteId};
use crate::vault::frontmatter::{self, ParsedDocument};
use crate::vault::{
    VaultWalker, VaultWalkerError, WalkedFile, extract_banner, extract_blocks,
    extract_headings, extract_title,
};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("vault walker error: {0}")]
    Walker(#[from] VaultWalkerError),
}

/// Builds a [`VaultIndex`] from the files under a vault root.
pub struct IndexBuilder<'a> {
    vault_root: &'a Path,
    exclusions: &'a [String],
}

impl<'a> IndexBuilder<'a> {
    pub fn new(vault_root: &'a Path, exclusions: &'a [String]) -> Self {
        Self { vault_root, exclusions }
    }

    /// Walk the vault and index every readable note.
    ///
    /// Only an unusable root (or an invalid exclusion pattern) fails the build.
    /// Unreadable files and id collisions are recorded as warnings and left out.
    pub fn build(&self) -> Result<VaultIndex, IndexError> {
        let start = std::time::Instant::now();

        let walker = VaultWalker::with_exclusions(self.vault_root, self.exclusions)?;
        let files = walker.walk()?;

        let mut notes = Vec::with_capacity(files.len());
        let mut warnings = Vec::new();

        for file in &files {
            match read_note(file) {
                Ok(note) => notes.push(note),
                Err(message) => {
                    tracing::warn!("skipping {}: {}", file.relative_path.display(), message);
                    warnings.push(IndexWarning { path: file.relative_path.clone(), message });
                }
            }
        }

        let index = VaultIndex::from_notes(walker.root().to_path_buf(), notes, warnings);

        tracing::info!(
            "indexed {} notes from {} files in {}ms",
            index.len(),
            files.len(),
            start.elapsed().as_millis()
        );

        Ok(index)
    }
}

fn read_note(file: &WalkedFile) -> Result<Note, String> {
    let raw = fs::read_to_string(&file.absolute_path)
        .map_err(|e| format!("failed to read file: {e}"))?;

    let parsed = frontmatter::parse(&raw).unwrap_or_else(|e| {
        tracing::warn!(
            "{}: {}; treating it as body text",
            file.relative_path.display(),
            e
        );
        ParsedDocument { frontmatter: None, body: raw.clone() }
    });

    let fm = parsed.frontmatter.as_ref();

    Ok(Note {
        id: NoteId::from_relative_path(&file.relative_path),
        path: file.relative_path.clone(),
        absolute_path: file.absolute_path.clone(),
        title: extract_title(fm, &file.relative_path),
        banner: extract_banner(fm),
        modified: DateTime::<Utc>::from(file.modified),
        headings: extract_headings(&parsed.body),
        blocks: extract_blocks(&parsed.body),
        frontmatter: parsed.frontmatter,
        body: parsed.body,
        raw,
    })
}
