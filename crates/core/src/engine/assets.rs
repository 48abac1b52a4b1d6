//! Copying referenced images into the build directory.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use super::EngineError;
use crate::render::StagedAsset;
use crate::vault::asset_file_name;

/// Converts one SVG into a PDF with an external command.
///
/// The command template is split into program and arguments; `{input}` and
/// `{output}` are replaced in every argument.
#[derive(Debug, Clone)]
pub struct VectorConverter {
    template: Vec<String>,
}

impl VectorConverter {
    pub fn new(template: Vec<String>) -> Result<Self, EngineError> {
        if template.first().is_none_or(|p| p.trim().is_empty()) {
            return Err(EngineError::EmptyCommand);
        }
        Ok(Self { template })
    }

    pub fn convert(&self, input: &Path, output: &Path) -> Result<(), EngineError> {
        let substitute = |arg: &String| {
            arg.replace("{input}", &input.to_string_lossy())
                .replace("{output}", &output.to_string_lossy())
        };
        let program = &self.template[0];
        let args: Vec<String> = self.template[1..].iter().map(substitute).collect();

        let result = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| EngineError::Spawn { program: program.clone(), source })?;

        if !result.status.success() {
            return Err(EngineError::Conversion {
                program: program.clone(),
                input: input.to_path_buf(),
                message: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        if !output.exists() {
            return Err(EngineError::MissingOutput { program: program.clone(), output: output.to_path_buf() });
        }
        Ok(())
    }
}

/// Result of staging one asset. A failed SVG conversion still stages the
/// original file for `\includesvg`; the conversion message is reported to
/// every note that stages the same file.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    pub asset: StagedAsset,
    pub conversion_error: Option<String>,
}

type StageCell = Arc<OnceLock<Result<StageOutcome, String>>>;

/// Stages every asset once per run into `build_assets/<hash16>.<ext>`.
/// Shared by all compile tasks.
pub struct AssetStager {
    dir: PathBuf,
    converter: Option<VectorConverter>,
    staged: Mutex<HashMap<PathBuf, StageCell>>,
}

impl AssetStager {
    pub fn new(dir: PathBuf, converter: Option<VectorConverter>) -> Self {
        Self { dir, converter, staged: Mutex::new(HashMap::new()) }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stage `source`, or return the cached outcome of an earlier call.
    /// Tasks staging the same file wait for the first one; different files
    /// are copied and converted concurrently.
    pub fn stage(&self, source: &Path) -> io::Result<StageOutcome> {
        let cell = {
            let mut staged = self.staged.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(staged.entry(source.to_path_buf()).or_default())
        };
        cell.get_or_init(|| self.stage_uncached(source).map_err(|e| e.to_string()))
            .clone()
            .map_err(io::Error::other)
    }

    fn stage_uncached(&self, source: &Path) -> io::Result<StageOutcome> {
        fs::create_dir_all(&self.dir)?;
        let target = self.dir.join(asset_file_name(source));
        let is_svg = source
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("svg"));

        let mut conversion_error = None;
        let asset = match (&self.converter, is_svg) {
            (Some(converter), true) => {
                let pdf = target.with_extension("pdf");
                match converter.convert(source, &pdf) {
                    Ok(()) => StagedAsset { tex_path: pdf, svg: false },
                    Err(e) => {
                        tracing::warn!("SVG conversion failed for {}: {}", source.display(), e);
                        conversion_error = Some(e.to_string());
                        fs::copy(source, &target)?;
                        StagedAsset { tex_path: target, svg: true }
                    }
                }
            }
            _ => {
                fs::copy(source, &target)?;
                StagedAsset { tex_path: target, svg: is_svg }
            }
        };

        tracing::debug!("staged {} as {}", source.display(), asset.tex_path.display());
        Ok(StageOutcome { asset, conversion_error })
    }

    /// Number of distinct assets staged so far.
    pub fn len(&self) -> usize {
        let staged = self.staged.lock().unwrap_or_else(PoisonError::into_inner);
        staged.values().filter(|cell| matches!(cell.get(), Some(Ok(_)))).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_asset_is_copied_once() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("fig.PNG");
        fs::write(&source, b"png").unwrap();

        let stager = AssetStager::new(dir.path().join("out/build_assets"), None);
        let first = stager.stage(&source).unwrap().asset;
        let second = stager.stage(&source).unwrap().asset;

        assert_eq!(first, second);
        assert!(!first.svg);
        assert!(first.tex_path.starts_with(dir.path().join("out/build_assets")));
        assert_eq!(first.tex_path.extension().unwrap(), "png");
        assert_eq!(fs::read(&first.tex_path).unwrap(), b"png");
        assert_eq!(stager.len(), 1);
    }

    #[test]
    fn test_svg_without_converter_uses_includesvg() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("d.svg");
        fs::write(&source, "<svg/>").unwrap();

        let stager = AssetStager::new(dir.path().join("assets"), None);
        let outcome = stager.stage(&source).unwrap();
        assert!(outcome.asset.svg);
        assert!(outcome.conversion_error.is_none());
    }

    #[test]
    fn test_failed_conversion_falls_back_to_svg() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("d.svg");
        fs::write(&source, "<svg/>").unwrap();

        let converter = VectorConverter::new(vec![
            "mdpress-no-such-converter".into(),
            "{input}".into(),
            "{output}".into(),
        ])
        .unwrap();
        let stager = AssetStager::new(dir.path().join("assets"), Some(converter));
        let outcome = stager.stage(&source).unwrap();

        assert!(outcome.asset.svg);
        assert_eq!(outcome.asset.tex_path.extension().unwrap(), "svg");
        assert!(outcome.conversion_error.is_some());

        let again = stager.stage(&source).unwrap();
        assert_eq!(again.asset, outcome.asset);
        assert_eq!(again.conversion_error, outcome.conversion_error);
    }

    #[test]
    fn test_missing_source_is_io_error() {
        let dir = TempDir::new().unwrap();
        let stager = AssetStager::new(dir.path().join("assets"), None);
        assert!(stager.stage(&dir.path().join("nope.png")).is_err());
    }

    #[test]
    fn test_empty_converter_command() {
        assert!(matches!(VectorConverter::new(vec![]), Err(EngineError::EmptyCommand)));
    }

    #[cfg(unix)]
    #[test]
    fn test_distinct_assets_convert_concurrently() {
        use std::time::{Duration, Instant};

        let dir = TempDir::new().unwrap();
        let sources: Vec<PathBuf> = ["one.svg", "two.svg"]
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                fs::write(&path, "<svg/>").unwrap();
                path
            })
            .collect();

        let converter = VectorConverter::new(
            ["sh", "-c", "sleep 1; cp \"$0\" \"$1\"", "{input}", "{output}"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
        .unwrap();
        let stager = AssetStager::new(dir.path().join("assets"), Some(converter));

        let started = Instant::now();
        std::thread::scope(|scope| {
            for source in &sources {
                let stager = &stager;
                scope.spawn(move || {
                    let outcome = stager.stage(source).unwrap();
                    assert!(outcome.conversion_error.is_none());
                    assert!(!outcome.asset.svg);
                });
            }
        });

        assert!(started.elapsed() < Duration::from_millis(1900), "{:?}", started.elapsed());
        assert_eq!(stager.len(), 2);
    }
}
