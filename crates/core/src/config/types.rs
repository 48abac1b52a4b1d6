use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ConfigFile {
    pub version: u32,
    pub vault_root: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_author")]
    pub author: String,
    #[serde(default)]
    pub mode: CompileMode,
    /// Note to compile when `mode = "single"`.
    pub markdown_file: Option<String>,
    /// Glob patterns (relative to vault_root) of notes to leave out of the index.
    #[serde(default)]
    pub excluded: Vec<String>,
    /// Worker threads for note compilation. Defaults to host parallelism.
    pub concurrency: Option<usize>,
    /// Merge the standalone PDFs of a batch run into one file.
    #[serde(default = "default_true")]
    pub enable_simple_merge: bool,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub processors: ProcessorsConfig,
    #[serde(default)]
    pub book: BookFileConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub assets: AssetsFileConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompileMode {
    Single,
    #[default]
    Batch,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResolverConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Treat unresolved or cyclic references as note failures.
    #[serde(default)]
    pub fail_on_broken_references: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { max_depth: default_max_depth(), fail_on_broken_references: false }
    }
}

fn default_max_depth() -> usize {
    5
}

/// Ordered stage identifiers: `$builtin` or `path/to/plugin.lua:symbol`.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ProcessorsConfig {
    #[serde(default)]
    pub pre: Vec<String>,
    #[serde(default)]
    pub post: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct BookFileConfig {
    #[serde(default)]
    pub enabled: bool,
    pub title: Option<String>,
    pub cover_image: Option<String>,
    #[serde(default)]
    pub front_matter: Vec<String>,
    #[serde(default)]
    pub back_matter: Vec<String>,
    #[serde(default)]
    pub parts: Vec<PartConfig>,
    /// Also produce one standalone PDF per book note.
    #[serde(default)]
    pub also_standalone: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PartConfig {
    pub title: Option<String>,
    /// Note identifiers, directories or globs, in order.
    pub notes: Vec<String>,
    /// Sorter identifier: `$builtin` or `path/to/sorter.lua:symbol`.
    pub sort: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_engine_program")]
    pub program: String,
    #[serde(default = "default_engine_args")]
    pub args: Vec<String>,
    #[serde(default = "default_engine_passes")]
    pub passes: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: default_engine_program(),
            args: default_engine_args(),
            passes: default_engine_passes(),
        }
    }
}

fn default_engine_program() -> String {
    "xelatex".to_string()
}

fn default_engine_args() -> Vec<String> {
    ["-interaction=nonstopmode", "-halt-on-error", "-shell-escape"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_engine_passes() -> u32 {
    2
}

#[derive(Debug, Deserialize, Default)]
pub struct AssetsFileConfig {
    /// Command template converting one SVG; `{input}` and `{output}` are substituted.
    pub svg_converter: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file_level: Option<String>,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), file_level: None, file: None }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_output_dir() -> String {
    "./output".to_string()
}

fn default_true() -> bool {
    true
}

fn default_author() -> String {
    "Anonymous".to_string()
}

/// Book settings with every path resolved.
#[derive(Debug, Clone)]
pub struct BookConfig {
    pub title: String,
    pub cover_image: Option<PathBuf>,
    pub front_matter: Vec<String>,
    pub back_matter: Vec<String>,
    pub parts: Vec<PartConfig>,
    pub also_standalone: bool,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// File the configuration was read from.
    pub source: PathBuf,
    /// Directory plugin and relative paths are resolved against.
    pub base_dir: PathBuf,
    pub vault_root: PathBuf,
    pub output_dir: PathBuf,
    pub author: String,
    pub mode: CompileMode,
    pub markdown_file: Option<PathBuf>,
    pub excluded: Vec<String>,
    pub concurrency: Option<usize>,
    pub enable_simple_merge: bool,
    pub resolver: ResolverConfig,
    pub processors: ProcessorsConfig,
    /// `None` unless `[book] enabled = true`.
    pub book: Option<BookConfig>,
    pub engine: EngineConfig,
    pub svg_converter: Option<Vec<String>>,
    pub logging: LoggingConfig,
}
