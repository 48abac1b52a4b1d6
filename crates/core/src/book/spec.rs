//! Resolving the `[book]` configuration against the index.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use globset::GlobBuilder;

use super::namespace::namespace_for;
use super::{BookSpecError, Sorter};
use crate::config::types::BookConfig;
use crate::index::{NoteId, VaultIndex};
use crate::scripting::PluginLoader;

#[derive(Debug)]
pub struct Part {
    pub title: Option<String>,
    /// Notes in configuration order.
    pub notes: Vec<NoteId>,
    pub sorter: Option<Sorter>,
}

impl Part {
    /// Label used in errors: the title, else the 1-based position.
    pub fn label(&self, position: usize) -> String {
        self.title.clone().unwrap_or_else(|| format!("#{}", position + 1))
    }
}

/// The book's structure with every entry resolved to note ids.
///
/// Ids that match no note are kept: assembly reports them as missing.
#[derive(Debug)]
pub struct BookSpec {
    pub title: String,
    pub author: String,
    pub cover: Option<PathBuf>,
    pub front: Vec<NoteId>,
    pub parts: Vec<Part>,
    pub back: Vec<NoteId>,
}

impl BookSpec {
    pub fn resolve(
        config: &BookConfig,
        author: &str,
        index: &VaultIndex,
        loader: &mut PluginLoader,
    ) -> Result<Self, BookSpecError> {
        if let Some(cover) = &config.cover_image
            && !cover.is_file()
        {
            return Err(BookSpecError::MissingCover(cover.clone()));
        }

        let front = resolve_entries(&config.front_matter, index)?;
        let back = resolve_entries(&config.back_matter, index)?;
        let parts = config
            .parts
            .iter()
            .map(|part| -> Result<Part, BookSpecError> {
                Ok(Part {
                    title: part.title.clone(),
                    notes: resolve_entries(&part.notes, index)?,
                    sorter: part
                        .sort
                        .as_deref()
                        .map(|s| Sorter::from_identifier(s, loader))
                        .transpose()?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let spec = Self {
            title: config.title.clone(),
            author: author.to_string(),
            cover: config.cover_image.clone(),
            front,
            parts,
            back,
        };

        let mut seen = HashSet::new();
        for id in spec.members() {
            if !seen.insert(id) {
                return Err(BookSpecError::Duplicate(id.clone()));
            }
        }
        if seen.is_empty() {
            return Err(BookSpecError::Empty);
        }

        tracing::info!("book '{}': {} notes in {} parts", spec.title, seen.len(), spec.parts.len());
        Ok(spec)
    }

    /// Every note named by the book, in configuration order.
    pub fn members(&self) -> impl Iterator<Item = &NoteId> {
        self.front
            .iter()
            .chain(self.parts.iter().flat_map(|p| p.notes.iter()))
            .chain(self.back.iter())
    }

    /// Label namespace of every member.
    pub fn namespaces(&self) -> HashMap<NoteId, String> {
        self.members().map(|id| (id.clone(), namespace_for(id))).collect()
    }
}

fn is_glob(entry: &str) -> bool {
    entry.contains(['*', '?', '[', '{'])
}

fn resolve_entries(entries: &[String], index: &VaultIndex) -> Result<Vec<NoteId>, BookSpecError> {
    let mut ids = Vec::new();
    for entry in entries {
        ids.extend(resolve_entry(entry, index)?);
    }
    Ok(ids)
}

/// A note reference, a directory (its direct children, sorted by id) or a
/// glob over note ids.
fn resolve_entry(entry: &str, index: &VaultIndex) -> Result<Vec<NoteId>, BookSpecError> {
    let entry = entry.trim();
    if entry.is_empty() {
        return Err(BookSpecError::EmptyEntry);
    }

    if is_glob(entry) {
        let pattern = NoteId::normalize(entry);
        let matcher = GlobBuilder::new(pattern.as_str())
            .literal_separator(true)
            .build()
            .map_err(|e| BookSpecError::InvalidPattern { pattern: entry.to_string(), message: e.to_string() })?
            .compile_matcher();

        let mut matches: Vec<NoteId> =
            index.ids().filter(|id| matcher.is_match(id.as_str())).cloned().collect();
        if matches.is_empty() {
            return Err(BookSpecError::NoMatch(entry.to_string()));
        }
        matches.sort();
        return Ok(matches);
    }

    if let Some(note) = index.lookup(entry, None) {
        return Ok(vec![note.id.clone()]);
    }

    let dir = NoteId::normalize(entry.trim_end_matches('/'));
    let mut children: Vec<NoteId> =
        index.ids().filter(|id| id.parent_dir() == dir.as_str()).cloned().collect();
    if !children.is_empty() {
        children.sort();
        return Ok(children);
    }

    tracing::warn!("book entry '{}' matches no note", entry);
    Ok(vec![NoteId::normalize(entry)])
}
