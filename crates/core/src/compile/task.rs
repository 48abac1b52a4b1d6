//! Compiling one note: expand, stage assets, pre pipeline, convert, post
//! pipeline, write.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use super::{Artifact, CompileContext, NoteCompileError, OutputMode};
use crate::index::{Note, NoteId};
use crate::pipeline::{Phase, StageContext};
use crate::render::{
    LatexRenderer, RenderContext, RenderMode, StagedAsset, chapter_document, standalone_document,
};
use crate::resolve::{Warning, WarningKind};

pub fn compile_note(id: &NoteId, ctx: &CompileContext<'_>) -> Result<Artifact, NoteCompileError> {
    let note = ctx.index.get(id).ok_or_else(|| NoteCompileError::UnknownNote(id.clone()))?;

    let mut expansion = ctx.resolver.expand_note(note);
    if ctx.fail_on_broken_references {
        let count = expansion.warnings.iter().filter(|w| w.is_broken_reference()).count();
        if count > 0 {
            return Err(NoteCompileError::BrokenReferences { count });
        }
    }

    let assets = stage_assets(ctx, note, &expansion.assets, &mut expansion.warnings);

    let pre_ctx = StageContext {
        note: &note.id,
        path: &note.path,
        vault_root: ctx.index.root(),
        phase: Phase::Pre,
    };
    let markdown = ctx.pre.run(&expansion.text, &pre_ctx)?;

    let render_mode = match ctx.mode {
        OutputMode::Standalone { .. } => RenderMode::Standalone,
        OutputMode::Chapter { namespaces } => RenderMode::Chapter { namespaces },
    };
    let render_ctx = RenderContext {
        note: &note.id,
        mode: render_mode,
        assets: &assets,
        headings: &note.headings,
    };
    let body = LatexRenderer::new().render(&markdown, &render_ctx);

    let post_ctx = StageContext { phase: Phase::Post, ..pre_ctx };
    let body = ctx.post.run(&body, &post_ctx)?;

    let banner = expansion
        .banner
        .as_ref()
        .and_then(|b| assets.get(b))
        .map(|a| a.tex_path.display().to_string().replace('\\', "/"));

    let mut artifact = Artifact {
        title: note.title.clone(),
        fragment: String::new(),
        resolved: expansion.resolved,
        warnings: expansion.warnings,
        tex_path: None,
        pdf_path: None,
    };

    match &ctx.mode {
        OutputMode::Standalone { dir, engine } => {
            let document = standalone_document(&note.title, ctx.author, banner.as_deref(), &body);
            let tex_path = dir.join(format!("{}.tex", note.id));
            write_file(&tex_path, &document)?;

            if let Some(engine) = engine {
                artifact.pdf_path = Some(engine.typeset(&tex_path)?);
            }
            artifact.tex_path = Some(tex_path);
            artifact.fragment = document;
        }
        OutputMode::Chapter { .. } => {
            artifact.fragment = chapter_document(&note.title, banner.as_deref(), &body);
        }
    }

    Ok(artifact)
}

/// Stage every located asset. Failures become warnings; the image then
/// renders as missing.
fn stage_assets(
    ctx: &CompileContext<'_>,
    note: &Note,
    sources: &BTreeSet<PathBuf>,
    warnings: &mut Vec<Warning>,
) -> HashMap<PathBuf, StagedAsset> {
    let mut staged = HashMap::new();
    for source in sources {
        match ctx.stager.stage(source) {
            Ok(outcome) => {
                if let Some(err) = outcome.conversion_error {
                    warnings.push(Warning {
                        kind: WarningKind::AssetConversion,
                        note: note.id.clone(),
                        line: None,
                        message: err,
                    });
                }
                staged.insert(source.clone(), outcome.asset);
            }
            Err(e) => {
                tracing::warn!("{}: cannot stage {}: {}", note.id, source.display(), e);
                warnings.push(Warning {
                    kind: WarningKind::MissingAsset,
                    note: note.id.clone(),
                    line: None,
                    message: format!("cannot stage {}: {e}", source.display()),
                });
            }
        }
    }
    staged
}

fn write_file(path: &Path, contents: &str) -> Result<(), NoteCompileError> {
    let io_error = |source| NoteCompileError::Io { path: path.to_path_buf(), source };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    fs::write(path, contents).map_err(io_error)
}
