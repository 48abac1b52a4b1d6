//! Turning compiled chapters into the master book file.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::namespace::{namespace_for, qualify_labels};
use super::{AssemblyError, BookSpec};
use crate::compile::{Artifact, CompileResult};
use crate::engine::TypesetEngine;
use crate::index::{NoteId, VaultIndex};
use crate::render::{BookMaster, MasterPart, master_document};

pub const CHAPTER_DIR: &str = "tex_chapters";
pub const MASTER_FILE: &str = "_master_book.tex";

#[derive(Debug, Clone)]
pub struct BookArtifact {
    /// Notes in final book order.
    pub order: Vec<NoteId>,
    pub master: PathBuf,
    pub pdf: Option<PathBuf>,
}

/// Everything computed before the first write.
struct Plan {
    order: Vec<NoteId>,
    chapters: Vec<(PathBuf, String)>,
    master: String,
}

pub struct BookAssembler<'a> {
    index: &'a VaultIndex,
    output_dir: PathBuf,
    engine: Option<&'a dyn TypesetEngine>,
}

impl<'a> BookAssembler<'a> {
    /// Chapters and the master file are written below `output_dir`; without
    /// an engine the book is left as LaTeX sources.
    pub fn new(index: &'a VaultIndex, output_dir: &Path, engine: Option<&'a dyn TypesetEngine>) -> Self {
        Self { index, output_dir: output_dir.to_path_buf(), engine }
    }

    pub fn assemble(&self, spec: &BookSpec, results: &[CompileResult]) -> Result<BookArtifact, AssemblyError> {
        let plan = self.plan(spec, results)?;

        let chapter_dir = self.output_dir.join(CHAPTER_DIR);
        fs::create_dir_all(&chapter_dir)
            .map_err(|source| AssemblyError::Write { path: chapter_dir.clone(), source })?;
        for (path, content) in &plan.chapters {
            write(path, content)?;
        }
        let master = self.output_dir.join(MASTER_FILE);
        write(&master, &plan.master)?;
        tracing::info!("wrote {} with {} chapters", master.display(), plan.chapters.len());

        let pdf = match self.engine {
            Some(engine) => {
                let built = engine.typeset(&master)?;
                let named = self.output_dir.join(pdf_name(&spec.title));
                fs::rename(&built, &named)
                    .map_err(|source| AssemblyError::Write { path: named.clone(), source })?;
                tracing::info!("book written to {}", named.display());
                Some(named)
            }
            None => None,
        };

        Ok(BookArtifact { order: plan.order, master, pdf })
    }

    /// Validate, order, namespace and render without touching the disk.
    fn plan(&self, spec: &BookSpec, results: &[CompileResult]) -> Result<Plan, AssemblyError> {
        let compiled: HashMap<&NoteId, &Artifact> =
            results.iter().filter_map(|r| r.artifact().map(|a| (&r.note, a))).collect();

        let missing: Vec<NoteId> =
            spec.members().filter(|id| !compiled.contains_key(id)).cloned().collect();
        if !missing.is_empty() {
            return Err(AssemblyError::MissingDependency { missing });
        }

        let mut parts = Vec::with_capacity(spec.parts.len());
        for (position, part) in spec.parts.iter().enumerate() {
            let notes = match &part.sorter {
                None => part.notes.clone(),
                Some(sorter) => {
                    let sorted = sorter.sort(&part.notes, self.index).map_err(|source| {
                        AssemblyError::Sorter { part: part.label(position), source }
                    })?;
                    if !is_permutation(&part.notes, &sorted) {
                        return Err(AssemblyError::NotAPermutation { part: part.label(position) });
                    }
                    sorted
                }
            };
            parts.push((part.title.clone(), notes));
        }

        let mut order = Vec::new();
        let mut chapters = Vec::new();
        let mut include = |id: &NoteId| {
            let namespace = namespace_for(id);
            let path = self.output_dir.join(CHAPTER_DIR).join(format!("{namespace}.tex"));
            chapters.push((path, qualify_labels(&compiled[id].fragment, &namespace)));
            order.push(id.clone());
            format!("{CHAPTER_DIR}/{namespace}")
        };

        let front: Vec<String> = spec.front.iter().map(&mut include).collect();
        let master_parts: Vec<MasterPart> = parts
            .iter()
            .map(|(title, notes)| MasterPart {
                title: title.clone(),
                chapters: notes.iter().map(&mut include).collect(),
            })
            .collect();
        let back: Vec<String> = spec.back.iter().map(&mut include).collect();

        let cover = spec.cover.as_ref().map(|c| c.display().to_string().replace('\\', "/"));
        let master = master_document(&BookMaster {
            title: &spec.title,
            author: &spec.author,
            cover: cover.as_deref(),
            front: &front,
            parts: &master_parts,
            back: &back,
        });

        Ok(Plan { order, chapters, master })
    }
}

fn is_permutation(original: &[NoteId], sorted: &[NoteId]) -> bool {
    let mut a = original.to_vec();
    let mut b = sorted.to_vec();
    a.sort();
    b.sort();
    a == b
}

fn pdf_name(title: &str) -> String {
    let stem: String = title
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() || c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("{}.pdf", if stem.is_empty() { "book" } else { &stem })
}

fn write(path: &Path, content: &str) -> Result<(), AssemblyError> {
    fs::write(path, content).map_err(|source| AssemblyError::Write { path: path.to_path_buf(), source })
}
