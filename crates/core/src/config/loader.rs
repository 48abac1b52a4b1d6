use crate::config::types::{
    BookConfig, BookFileConfig, CompileMode, ConfigFile, LoggingConfig, ResolvedConfig,
};
use shellexpand::full;
use std::path::{Path, PathBuf};
use std::{env, fs};

use dirs::home_dir;
use thiserror::Error;

/// File name looked up in the working directory before falling back to XDG.
pub const LOCAL_CONFIG_NAME: &str = "mdpress.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found at {0}")]
    NotFound(String),

    #[error("failed to read config file {0}: {1}")]
    ReadError(String, #[source] std::io::Error),

    #[error("failed to parse TOML in {0}: {1}")]
    ParseError(String, #[source] toml::de::Error),

    #[error("version {0} is unsupported (expected 1)")]
    BadVersion(u32),

    #[error("home directory not available to expand '~'")]
    NoHome,

    #[error("mode = \"single\" requires markdown_file")]
    MissingMarkdownFile,

    #[error("book compilation requires mode = \"batch\"")]
    BookRequiresBatch,

    #[error("concurrency must be at least 1")]
    InvalidConcurrency,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load(config_path: Option<&Path>) -> Result<ResolvedConfig, ConfigError> {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => default_config_path(),
        };

        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let s = fs::read_to_string(&path)
            .map_err(|e| ConfigError::ReadError(path.display().to_string(), e))?;

        let cf: ConfigFile = toml::from_str(&s)
            .map_err(|e| ConfigError::ParseError(path.display().to_string(), e))?;

        if cf.version != 1 {
            return Err(ConfigError::BadVersion(cf.version));
        }

        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        Self::resolve(cf, path, base_dir)
    }

    fn resolve(
        cf: ConfigFile,
        source: PathBuf,
        base_dir: PathBuf,
    ) -> Result<ResolvedConfig, ConfigError> {
        let vault_root = anchor(expand_path(&cf.vault_root)?, &base_dir);
        let sub = |s: &str| s.replace("{{vault_root}}", &vault_root.to_string_lossy());

        let output_dir = anchor(expand_path(&sub(&cf.output_dir))?, &base_dir);

        let markdown_file = match (&cf.mode, &cf.markdown_file) {
            (CompileMode::Single, None) => return Err(ConfigError::MissingMarkdownFile),
            (_, Some(file)) => Some(anchor(expand_path(&sub(file))?, &vault_root)),
            (CompileMode::Batch, None) => None,
        };

        if cf.concurrency == Some(0) {
            return Err(ConfigError::InvalidConcurrency);
        }

        let book = if cf.book.enabled {
            if cf.mode == CompileMode::Single {
                return Err(ConfigError::BookRequiresBatch);
            }
            Some(resolve_book(cf.book, &vault_root, &sub)?)
        } else {
            None
        };

        // Resolve log file path if present
        let logging = if let Some(ref file) = cf.logging.file {
            let expanded_file = anchor(expand_path(&sub(&file.to_string_lossy()))?, &base_dir);
            LoggingConfig {
                level: cf.logging.level.clone(),
                file_level: cf.logging.file_level.clone(),
                file: Some(expanded_file),
            }
        } else {
            cf.logging.clone()
        };

        Ok(ResolvedConfig {
            source,
            base_dir,
            vault_root,
            output_dir,
            author: cf.author,
            mode: cf.mode,
            markdown_file,
            excluded: cf.excluded,
            concurrency: cf.concurrency,
            enable_simple_merge: cf.enable_simple_merge,
            resolver: cf.resolver,
            processors: cf.processors,
            book,
            engine: cf.engine,
            svg_converter: cf.assets.svg_converter,
            logging,
        })
    }
}

fn resolve_book(
    book: BookFileConfig,
    vault_root: &Path,
    sub: &dyn Fn(&str) -> String,
) -> Result<BookConfig, ConfigError> {
    let cover_image = match book.cover_image {
        Some(ref cover) => Some(anchor(expand_path(&sub(cover))?, vault_root)),
        None => None,
    };

    Ok(BookConfig {
        title: book.title.unwrap_or_else(|| "Untitled Book".to_string()),
        cover_image,
        front_matter: book.front_matter,
        back_matter: book.back_matter,
        parts: book.parts,
        also_standalone: book.also_standalone,
    })
}

/// Default config location: `./mdpress.toml`, else `$XDG_CONFIG_HOME/mdpress/config.toml`.
pub fn default_config_path() -> PathBuf {
    let local = PathBuf::from(LOCAL_CONFIG_NAME);
    if local.exists() {
        return local;
    }
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        return Path::new(&xdg).join("mdpress").join("config.toml");
    }
    let home = home_dir().unwrap_or_else(|| PathBuf::from("~"));
    home.join(".config").join("mdpress").join("config.toml")
}

/// Resolve a relative path against `base`, leaving absolute paths alone.
pub fn anchor(path: PathBuf, base: &Path) -> PathBuf {
    if path.is_absolute() { path } else { base.join(path) }
}

fn expand_path(input: &str) -> Result<PathBuf, ConfigError> {
    let expanded = full(input).map_err(|_| ConfigError::NoHome)?;
    Ok(PathBuf::from(expanded.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("mdpress.toml");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_relative_paths_resolve_against_config_dir() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
version = 1
vault_root = "vault"
output_dir = "{{vault_root}}/_build"
"#,
        );

        let rc = ConfigLoader::load(Some(&path)).unwrap();
        assert_eq!(rc.vault_root, dir.path().join("vault"));
        assert_eq!(rc.output_dir, dir.path().join("vault").join("_build"));
        assert_eq!(rc.mode, CompileMode::Batch);
        assert_eq!(rc.resolver.max_depth, 5);
        assert_eq!(rc.engine.program, "xelatex");
        assert!(rc.book.is_none());
    }

    #[test]
    fn test_single_mode_requires_markdown_file() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "version = 1\nvault_root = \".\"\nmode = \"single\"\n");
        let err = ConfigLoader::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingMarkdownFile));
    }

    #[test]
    fn test_markdown_file_relative_to_vault() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "version = 1\nvault_root = \"v\"\nmode = \"single\"\nmarkdown_file = \"notes/a.md\"\n",
        );
        let rc = ConfigLoader::load(Some(&path)).unwrap();
        assert_eq!(rc.markdown_file, Some(dir.path().join("v/notes/a.md")));
    }

    #[test]
    fn test_book_requires_batch_mode() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
version = 1
vault_root = "."
mode = "single"
markdown_file = "a.md"

[book]
enabled = true
"#,
        );
        let err = ConfigLoader::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::BookRequiresBatch));
    }

    #[test]
    fn test_book_parts_parsed() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
version = 1
vault_root = "."

[book]
enabled = true
title = "Notes"
cover_image = "cover.png"
back_matter = ["C"]

[[book.parts]]
title = "One"
notes = ["A", "B"]

[[book.parts]]
notes = ["chapters/*"]
sort = "$modified"
"#,
        );
        let rc = ConfigLoader::load(Some(&path)).unwrap();
        let book = rc.book.unwrap();
        assert_eq!(book.title, "Notes");
        assert_eq!(book.parts.len(), 2);
        assert_eq!(book.parts[0].notes, vec!["A", "B"]);
        assert_eq!(book.parts[1].sort.as_deref(), Some("$modified"));
        assert_eq!(book.back_matter, vec!["C"]);
        assert_eq!(book.cover_image, Some(dir.path().join("./cover.png")));
    }

    #[test]
    fn test_bad_version() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "version = 2\nvault_root = \".\"\n");
        assert!(matches!(ConfigLoader::load(Some(&path)), Err(ConfigError::BadVersion(2))));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "version = 1\nvault_root = \".\"\nconcurrency = 0\n");
        assert!(matches!(
            ConfigLoader::load(Some(&path)),
            Err(ConfigError::InvalidConcurrency)
        ));
    }
}
