//! Shared output formatting for build and check.

use mdpress_core::book::{AssemblyError, BookArtifact};
use mdpress_core::build::{CheckReport, RunReport};
use mdpress_core::compile::CompileResult;
use mdpress_core::index::IndexWarning;
use mdpress_core::resolve::Warning;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

/// One compiled note for JSON output.
#[derive(Debug, Serialize)]
pub struct NoteOutput<'a> {
    pub note: &'a str,
    /// `standalone` or `chapter`.
    pub phase: &'static str,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub warnings: &'a [Warning],
}

impl<'a> NoteOutput<'a> {
    fn new(result: &'a CompileResult, phase: &'static str) -> Self {
        let artifact = result.artifact();
        Self {
            note: result.note.as_str(),
            phase,
            ok: result.is_ok(),
            title: artifact.map(|a| a.title.as_str()),
            tex: artifact.and_then(|a| a.tex_path.as_ref()).map(|p| p.display().to_string()),
            pdf: artifact.and_then(|a| a.pdf_path.as_ref()).map(|p| p.display().to_string()),
            error: result.outcome.as_ref().err().map(ToString::to_string),
            warnings: result.warnings(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BookOutput {
    pub ok: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub order: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Result<BookArtifact, AssemblyError>> for BookOutput {
    fn from(book: &Result<BookArtifact, AssemblyError>) -> Self {
        match book {
            Ok(artifact) => Self {
                ok: true,
                order: artifact.order.iter().map(|id| id.as_str().to_string()).collect(),
                master: Some(artifact.master.display().to_string()),
                pdf: artifact.pdf.as_ref().map(|p| p.display().to_string()),
                error: None,
            },
            Err(e) => Self {
                ok: false,
                order: Vec::new(),
                master: None,
                pdf: None,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunOutput<'a> {
    pub notes: Vec<NoteOutput<'a>>,
    pub book: Option<BookOutput>,
    /// Path of the merged PDF, or the merge error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged: Option<MergeOutput>,
    pub index_warnings: &'a [IndexWarning],
    pub exit_code: i32,
}

#[derive(Debug, Serialize)]
pub struct MergeOutput {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<'a> From<&'a RunReport> for RunOutput<'a> {
    fn from(report: &'a RunReport) -> Self {
        let notes = report
            .standalone
            .iter()
            .map(|r| NoteOutput::new(r, "standalone"))
            .chain(report.chapters.iter().map(|r| NoteOutput::new(r, "chapter")))
            .collect();
        Self {
            notes,
            book: report.book.as_ref().map(BookOutput::from),
            merged: report.merged.as_ref().map(|merged| match merged {
                Ok(path) => MergeOutput { ok: true, pdf: Some(path.display().to_string()), error: None },
                Err(e) => MergeOutput { ok: false, pdf: None, error: Some(e.to_string()) },
            }),
            index_warnings: &report.index_warnings,
            exit_code: report.exit_code(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CheckOutput<'a> {
    pub notes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_notes: Option<usize>,
    pub warnings: &'a [Warning],
    pub index_warnings: &'a [IndexWarning],
}

impl<'a> From<&'a CheckReport> for CheckOutput<'a> {
    fn from(report: &'a CheckReport) -> Self {
        Self {
            notes: report.notes,
            book_notes: report.book_notes,
            warnings: &report.warnings,
            index_warnings: &report.index_warnings,
        }
    }
}

/// Row for the per-note summary table.
#[derive(Tabled)]
struct NoteRow {
    #[tabled(rename = "Note")]
    note: String,
    #[tabled(rename = "Phase")]
    phase: &'static str,
    #[tabled(rename = "Status")]
    status: &'static str,
    #[tabled(rename = "Warnings")]
    warnings: usize,
    #[tabled(rename = "Output")]
    output: String,
}

/// Print the per-note table, then every warning and failure.
pub fn print_run_summary(report: &RunReport) {
    let output = RunOutput::from(report);
    if output.notes.is_empty() {
        println!("(no notes compiled)");
    } else {
        let rows: Vec<NoteRow> = output
            .notes
            .iter()
            .map(|n| NoteRow {
                note: n.note.to_string(),
                phase: n.phase,
                status: if n.ok { "ok" } else { "FAILED" },
                warnings: n.warnings.len(),
                output: n.pdf.clone().or_else(|| n.tex.clone()).unwrap_or_default(),
            })
            .collect();
        let table = Table::new(&rows).with(Style::rounded()).to_string();
        println!("{table}");
    }

    print_index_warnings(&report.index_warnings);
    for warning in report.warnings() {
        println!("warning: {warning}");
    }
    for failed in report.failed() {
        if let Err(e) = &failed.outcome {
            println!("error: {}: {}", failed.note, e);
        }
    }

    let total = output.notes.len();
    let failed = output.notes.iter().filter(|n| !n.ok).count();
    println!("\nCompiled {} of {} notes", total - failed, total);

    match &output.book {
        Some(BookOutput { ok: true, pdf, master, order, .. }) => {
            let written = pdf.as_ref().or(master.as_ref()).cloned().unwrap_or_default();
            println!("Book: {} chapters -> {}", order.len(), written);
        }
        Some(BookOutput { error: Some(e), .. }) => println!("Book FAILED: {e}"),
        _ => {}
    }

    match &output.merged {
        Some(MergeOutput { pdf: Some(pdf), .. }) => println!("Merged PDF: {pdf}"),
        Some(MergeOutput { error: Some(e), .. }) => println!("Merge FAILED: {e}"),
        _ => {}
    }
}

pub fn print_check_summary(report: &CheckReport) {
    print_index_warnings(&report.index_warnings);
    for warning in &report.warnings {
        println!("warning: {warning}");
    }
    println!();
    println!("Notes checked:  {}", report.notes);
    if let Some(book_notes) = report.book_notes {
        println!("Book notes:     {book_notes}");
    }
    println!("Warnings:       {}", report.warnings.len());
}

fn print_index_warnings(warnings: &[IndexWarning]) {
    for w in warnings {
        println!("skipped: {}: {}", w.path.display(), w.message);
    }
}
