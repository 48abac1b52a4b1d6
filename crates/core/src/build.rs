//! One run over a vault: everything that can fail for configuration reasons
//! is checked in [`BuildSession::open`], before any note is compiled.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::book::{AssemblyError, BookArtifact, BookAssembler, BookSpec, BookSpecError};
use crate::compile::{
    CompileContext, CompileResult, OutputMode, SchedulerError, compile_all, default_jobs,
};
use crate::config::{CompileMode, ConfigError, ResolvedConfig};
use crate::engine::{AssetStager, EngineError, TypesetEngine, VectorConverter, Xelatex, merge_pdfs};
use crate::index::{IndexBuilder, IndexError, IndexWarning, NoteId, VaultIndex};
use crate::pipeline::{Phase, Pipeline, PipelineError, StageRegistry};
use crate::resolve::{Resolver, Warning};
use crate::scripting::PluginLoader;

pub const STANDALONE_DIR: &str = "individual_pdfs";
pub const ASSET_DIR: &str = "build_assets";

/// Fatal errors: the run stops before compiling anything.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to index vault: {0}")]
    Index(#[from] IndexError),

    #[error("invalid processor configuration: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("invalid book configuration: {0}")]
    BookSpec(#[from] BookSpecError),

    #[error("markdown_file {} is not a note in the vault", .0.display())]
    UnknownNote(PathBuf),

    #[error("invalid svg_converter: {0}")]
    Converter(#[source] EngineError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    /// Worker threads; configured concurrency, else host parallelism.
    pub jobs: Option<usize>,
    /// Run the LaTeX engine. Without it only `.tex` files are written.
    pub typeset: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { jobs: None, typeset: true }
    }
}

/// Outcome of a build that got past configuration.
#[derive(Debug)]
pub struct RunReport {
    /// Standalone compilations, in note order.
    pub standalone: Vec<CompileResult>,
    /// Chapter compilations for the book, in configuration order.
    pub chapters: Vec<CompileResult>,
    pub book: Option<Result<BookArtifact, AssemblyError>>,
    /// The merged PDF of a batch run without a book, when one was made.
    pub merged: Option<Result<PathBuf, EngineError>>,
    pub index_warnings: Vec<IndexWarning>,
}

impl RunReport {
    pub fn results(&self) -> impl Iterator<Item = &CompileResult> {
        self.standalone.iter().chain(self.chapters.iter())
    }

    pub fn failed(&self) -> impl Iterator<Item = &CompileResult> {
        self.results().filter(|r| !r.is_ok())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Warning> {
        self.results().flat_map(CompileResult::warnings)
    }

    /// 0: everything succeeded. 1: some notes failed or the PDFs could not
    /// be merged. 2: the book could not be assembled.
    pub fn exit_code(&self) -> i32 {
        if matches!(self.book, Some(Err(_))) {
            2
        } else if self.failed().next().is_some() || matches!(self.merged, Some(Err(_))) {
            1
        } else {
            0
        }
    }
}

/// PDFs of the successful compilations, in result order.
pub fn merge_inputs(results: &[CompileResult]) -> Vec<PathBuf> {
    results
        .iter()
        .filter_map(CompileResult::artifact)
        .filter_map(|a| a.pdf_path.clone())
        .collect()
}

/// `<output_dir>/<vault name> - Compiled Vault.pdf`
pub fn merged_pdf_path(output_dir: &Path, vault_root: &Path) -> PathBuf {
    let name = vault_root
        .file_name()
        .map_or_else(|| "vault".to_string(), |n| n.to_string_lossy().into_owned());
    output_dir.join(format!("{name} - Compiled Vault.pdf"))
}

/// Result of `check`: every note resolved, nothing written.
#[derive(Debug)]
pub struct CheckReport {
    pub notes: usize,
    pub warnings: Vec<Warning>,
    pub index_warnings: Vec<IndexWarning>,
    pub book_notes: Option<usize>,
}

/// Immutable state shared by every compile task of a run.
#[derive(Debug)]
pub struct BuildSession {
    config: ResolvedConfig,
    index: VaultIndex,
    pre: Pipeline,
    post: Pipeline,
    book: Option<BookSpec>,
    converter: Option<VectorConverter>,
}

impl BuildSession {
    /// Index the vault and validate processors, the book and the converter.
    pub fn open(config: ResolvedConfig) -> Result<Self, BuildError> {
        let index = IndexBuilder::new(&config.vault_root, &config.excluded).build()?;

        let mut loader = PluginLoader::new(&config.base_dir);
        let mut registry = StageRegistry::new(&mut loader);
        let pre = registry.build(Phase::Pre, &config.processors.pre)?;
        let post = registry.build(Phase::Post, &config.processors.post)?;

        let book = match &config.book {
            Some(book) => Some(BookSpec::resolve(book, &config.author, &index, &mut loader)?),
            None => None,
        };

        let converter = config
            .svg_converter
            .clone()
            .map(VectorConverter::new)
            .transpose()
            .map_err(BuildError::Converter)?;

        Ok(Self { config, index, pre, post, book, converter })
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn index(&self) -> &VaultIndex {
        &self.index
    }

    pub fn book(&self) -> Option<&BookSpec> {
        self.book.as_ref()
    }

    /// Notes compiled standalone in this run.
    pub fn standalone_targets(&self) -> Result<Vec<NoteId>, BuildError> {
        if self.config.mode == CompileMode::Single {
            let file = self.config.markdown_file.clone().unwrap_or_default();
            let note = self.index.lookup_path(&file).ok_or(BuildError::UnknownNote(file))?;
            return Ok(vec![note.id.clone()]);
        }
        match &self.config.book {
            Some(book) if !book.also_standalone => Ok(Vec::new()),
            _ => Ok(self.index.ids().cloned().collect()),
        }
    }

    /// Book members present in the index; absent ones surface as missing at
    /// assembly.
    fn chapter_targets(&self) -> Vec<NoteId> {
        self.book
            .iter()
            .flat_map(|spec| spec.members())
            .filter(|id| self.index.get(id).is_some())
            .cloned()
            .collect()
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.index, self.config.resolver.max_depth)
    }

    fn context<'s>(&'s self, stager: &'s AssetStager, mode: OutputMode<'s>) -> CompileContext<'s> {
        CompileContext {
            index: &self.index,
            resolver: self.resolver(),
            pre: &self.pre,
            post: &self.post,
            stager,
            mode,
            author: &self.config.author,
            fail_on_broken_references: self.config.resolver.fail_on_broken_references,
        }
    }

    /// Resolve every note and report reference problems without writing.
    pub fn check(&self) -> CheckReport {
        let resolver = self.resolver();
        let warnings = self.index.notes().flat_map(|note| resolver.expand_note(note).warnings).collect();
        CheckReport {
            notes: self.index.len(),
            warnings,
            index_warnings: self.index.warnings().to_vec(),
            book_notes: self.book.as_ref().map(|b| b.members().count()),
        }
    }

    pub fn build<F>(&self, options: &BuildOptions, progress: F) -> Result<RunReport, BuildError>
    where
        F: Fn(usize, usize, &NoteId) + Sync,
    {
        let jobs = options.jobs.or(self.config.concurrency).unwrap_or_else(default_jobs);
        let engine = options.typeset.then(|| Xelatex::new(&self.config.engine));
        let engine_ref = engine.as_ref().map(|e| e as &dyn TypesetEngine);
        let stager = AssetStager::new(self.config.output_dir.join(ASSET_DIR), self.converter.clone());

        let targets = self.standalone_targets()?;
        let standalone = if targets.is_empty() {
            Vec::new()
        } else {
            tracing::info!("compiling {} standalone notes", targets.len());
            let dir = self.config.output_dir.join(STANDALONE_DIR);
            let context = self.context(&stager, OutputMode::Standalone { dir, engine: engine_ref });
            compile_all(&targets, &context, jobs, &progress)?
        };

        let merged = if self.merges(options) {
            let inputs = merge_inputs(&standalone);
            (!inputs.is_empty()).then(|| {
                let output = merged_pdf_path(&self.config.output_dir, &self.config.vault_root);
                let merged = merge_pdfs(&inputs, &output).map(|_| output);
                if let Err(e) = &merged {
                    tracing::error!("{}", e);
                }
                merged
            })
        } else {
            None
        };

        let (chapters, book) = match &self.book {
            Some(spec) => {
                let namespaces = spec.namespaces();
                let chapter_ids = self.chapter_targets();
                tracing::info!("compiling {} book chapters", chapter_ids.len());
                let context = self.context(&stager, OutputMode::Chapter { namespaces: &namespaces });
                let chapters = compile_all(&chapter_ids, &context, jobs, &progress)?;

                let assembler = BookAssembler::new(&self.index, &self.config.output_dir, engine_ref);
                let book = assembler.assemble(spec, &chapters);
                if let Err(e) = &book {
                    tracing::error!("book assembly failed: {}", e);
                }
                (chapters, Some(book))
            }
            None => (Vec::new(), None),
        };

        Ok(RunReport {
            standalone,
            chapters,
            book,
            merged,
            index_warnings: self.index.warnings().to_vec(),
        })
    }

    /// The simple merge applies to typeset batch runs without a book.
    fn merges(&self, options: &BuildOptions) -> bool {
        self.config.enable_simple_merge
            && options.typeset
            && self.config.mode == CompileMode::Batch
            && self.book.is_none()
    }
}
