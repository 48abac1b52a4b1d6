//! Running the LaTeX engine.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::EngineError;
use crate::config::types::EngineConfig;

const LINES_BEFORE_ERROR: usize = 2;
const LINES_AFTER_ERROR: usize = 8;
const TAIL_LINES: usize = 15;

/// Turns a `.tex` file into a PDF next to it.
pub trait TypesetEngine: Send + Sync {
    fn typeset(&self, tex: &Path) -> Result<PathBuf, EngineError>;
}

/// Any engine driven like `xelatex`: `program args... file.tex`, run in the
/// file's directory, `passes` times so references settle.
#[derive(Debug, Clone)]
pub struct Xelatex {
    program: String,
    args: Vec<String>,
    passes: u32,
}

impl Xelatex {
    pub fn new(config: &EngineConfig) -> Self {
        Self { program: config.program.clone(), args: config.args.clone(), passes: config.passes.max(1) }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl TypesetEngine for Xelatex {
    fn typeset(&self, tex: &Path) -> Result<PathBuf, EngineError> {
        let dir = tex.parent().unwrap_or(Path::new("."));
        let file_name = tex.file_name().unwrap_or(tex.as_os_str());

        for pass in 1..=self.passes {
            tracing::debug!("{} pass {}/{} on {}", self.program, pass, self.passes, tex.display());
            let output = Command::new(&self.program)
                .args(&self.args)
                .arg(file_name)
                .current_dir(dir)
                .stdin(Stdio::null())
                .output()
                .map_err(|source| EngineError::Spawn { program: self.program.clone(), source })?;

            if !output.status.success() {
                let log = fs::read_to_string(tex.with_extension("log"))
                    .unwrap_or_else(|_| String::from_utf8_lossy(&output.stdout).into_owned());
                return Err(EngineError::Failed {
                    program: self.program.clone(),
                    file: tex.to_path_buf(),
                    excerpt: extract_relevant_error(&log),
                });
            }
        }

        let pdf = tex.with_extension("pdf");
        if !pdf.exists() {
            return Err(EngineError::MissingOutput { program: self.program.clone(), output: pdf });
        }
        Ok(pdf)
    }
}

/// The part of a LaTeX log worth showing: a few lines around the first
/// `!` error line, or the tail of the log when there is none.
pub fn extract_relevant_error(log: &str) -> String {
    let lines: Vec<&str> = log.lines().collect();

    if let Some(idx) = lines.iter().position(|l| l.trim_start().starts_with('!')) {
        let start = idx.saturating_sub(LINES_BEFORE_ERROR);
        let end = (idx + LINES_AFTER_ERROR).min(lines.len());
        return lines[start..end].join("\n");
    }

    let start = lines.len().saturating_sub(TAIL_LINES);
    format!(
        "Could not find a standard LaTeX error ('!'). Showing last {TAIL_LINES} lines of log:\n{}",
        lines[start..].join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_excerpt_around_error_line() {
        let log: String = (0..30)
            .map(|i| if i == 10 { "! Undefined control sequence.".to_string() } else { format!("line {i}") })
            .collect::<Vec<_>>()
            .join("\n");

        let excerpt = extract_relevant_error(&log);
        let lines: Vec<_> = excerpt.lines().collect();
        assert_eq!(lines.first(), Some(&"line 8"));
        assert_eq!(lines[2], "! Undefined control sequence.");
        assert_eq!(lines.last(), Some(&"line 17"));
        assert_eq!(lines.len(), 10);
    }

    #[test]
    fn test_error_at_start_of_log() {
        let excerpt = extract_relevant_error("! Emergency stop.\nl.1\n");
        assert_eq!(excerpt, "! Emergency stop.\nl.1");
    }

    #[test]
    fn test_tail_when_no_error_line() {
        let log: String = (0..40).map(|i| format!("line {i}\n")).collect();
        let excerpt = extract_relevant_error(&log);
        assert!(excerpt.starts_with("Could not find a standard LaTeX error"));
        assert!(excerpt.contains("line 25"));
        assert!(!excerpt.contains("line 24"));
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let dir = TempDir::new().unwrap();
        let tex = dir.path().join("a.tex");
        fs::write(&tex, "x").unwrap();

        let engine = Xelatex::new(&EngineConfig {
            program: "mdpress-no-such-engine".into(),
            args: vec![],
            passes: 1,
        });
        assert!(matches!(engine.typeset(&tex), Err(EngineError::Spawn { .. })));
    }
}
