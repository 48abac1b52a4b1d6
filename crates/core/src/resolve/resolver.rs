//! Resolving references against the vault index and expanding note bodies.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::reference::{Anchor, AssetReference, RefTarget, Reference, ReferenceKind, Token};
use super::{ASSET_SCHEME, BROKEN_SCHEME, Warning, WarningKind, XREF_SCHEME, parse_references};
use crate::index::{Note, NoteId, VaultIndex};
use crate::vault::AssetLocator;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("unresolved reference [[{reference}]]: {reason}")]
    Unresolved { reference: String, reason: String },

    #[error("cyclic transclusion: {}", format_chain(.chain))]
    Cyclic { chain: Vec<NoteId> },

    #[error("transclusion depth limit of {limit} exceeded: {}", format_chain(.chain))]
    RecursionLimit { limit: usize, chain: Vec<NoteId> },
}

fn format_chain(chain: &[NoteId]) -> String {
    chain.iter().map(NoteId::as_str).collect::<Vec<_>>().join(" -> ")
}

/// Anchor inside a resolved target note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedAnchor {
    Heading(String),
    Block(String),
}

impl ResolvedAnchor {
    /// Label used for the anchor in generated markup (`h:slug`, `b:id`).
    pub fn label(&self) -> String {
        match self {
            ResolvedAnchor::Heading(slug) => format!("h:{slug}"),
            ResolvedAnchor::Block(id) => format!("b:{id}"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ResolvedTarget {
    /// A link: the anchor is guaranteed to exist in the target note.
    Link { note: NoteId, anchor: Option<ResolvedAnchor> },
    /// An embed: the selected text, already expanded recursively.
    Fragment { note: NoteId, title: String, expansion: Expansion },
}

/// A note body with every reference rewritten.
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    pub text: String,
    /// References that resolved, nested embeds included.
    pub resolved: Vec<Reference>,
    pub warnings: Vec<Warning>,
    /// Absolute paths of every located asset.
    pub assets: BTreeSet<PathBuf>,
    pub banner: Option<PathBuf>,
}

impl Expansion {
    fn absorb(&mut self, nested: Expansion) {
        self.resolved.extend(nested.resolved);
        self.warnings.extend(nested.warnings);
        self.assets.extend(nested.assets);
    }
}

pub struct Resolver<'a> {
    index: &'a VaultIndex,
    locator: AssetLocator,
    max_depth: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(index: &'a VaultIndex, max_depth: usize) -> Self {
        Self { index, locator: AssetLocator::new(index.root()), max_depth }
    }

    /// Resolve one reference made from note `from`.
    ///
    /// `visiting` holds the notes currently being expanded on the active
    /// path, outermost first. Embeds of a note already on the path fail with
    /// [`ResolveError::Cyclic`].
    pub fn resolve(
        &self,
        reference: &Reference,
        from: &NoteId,
        visiting: &[NoteId],
    ) -> Result<ResolvedTarget, ResolveError> {
        let target = self.target_note(reference, from)?;

        if reference.kind == ReferenceKind::Link {
            let anchor = self.resolve_anchor(reference, target)?;
            return Ok(ResolvedTarget::Link { note: target.id.clone(), anchor });
        }

        let mut path = visiting.to_vec();
        path.push(target.id.clone());

        if visiting.contains(&target.id) {
            return Err(ResolveError::Cyclic { chain: path });
        }
        if visiting.len() > self.max_depth {
            return Err(ResolveError::RecursionLimit { limit: self.max_depth, chain: path });
        }

        let start = match self.resolve_anchor(reference, target)? {
            Some(ResolvedAnchor::Heading(slug)) => {
                let heading = target.headings.iter().find(|h| h.slug == slug);
                heading.map_or(0, |h| h.offset)
            }
            Some(ResolvedAnchor::Block(id)) => target.block(&id).map_or(0, |b| b.span.start),
            None => 0,
        };
        let text = match &reference.anchor {
            Anchor::Heading(h) => target.heading(h).map_or("", |h| target.section_text(h)),
            Anchor::Block(b) => target.block(b).map_or("", |b| target.block_text(b)),
            Anchor::None => target.body.as_str(),
        };

        let expansion = self.expand_text(target, text, target.line_at(start), &path)?;

        Ok(ResolvedTarget::Fragment {
            note: target.id.clone(),
            title: target.file_name(),
            expansion,
        })
    }

    /// Rewrite a note's body for conversion. Never fails: every problem is
    /// turned into a marker in the text plus a warning.
    pub fn expand_note(&self, note: &Note) -> Expansion {
        let visiting = [note.id.clone()];
        let mut expansion = self
            .expand_text(note, &note.body, note.line_at(0), &visiting)
            .unwrap_or_else(|e| {
                // Only embed errors propagate, and those stop at the outermost embed
                tracing::error!("{}: unexpected resolution failure: {}", note.id, e);
                Expansion { text: note.body.clone(), ..Expansion::default() }
            });

        if let Some(banner) = &note.banner {
            match self.locate_asset(banner, note) {
                Some(path) => {
                    expansion.assets.insert(path.clone());
                    expansion.banner = Some(path);
                }
                None => {
                    let message = format!("banner image '{banner}' not found");
                    tracing::warn!("{}: {}", note.id, message);
                    expansion.warnings.push(Warning {
                        kind: WarningKind::MissingAsset,
                        note: note.id.clone(),
                        line: None,
                        message,
                    });
                }
            }
        }

        expansion
    }

    fn target_note(&self, reference: &Reference, from: &NoteId) -> Result<&'a Note, ResolveError> {
        let found = match &reference.target {
            RefTarget::SelfNote => self.index.get(from),
            RefTarget::Note(target) => self.index.lookup(target, Some(from)),
        };
        found.ok_or_else(|| ResolveError::Unresolved {
            reference: reference.describe(),
            reason: "note not found".to_string(),
        })
    }

    fn resolve_anchor(
        &self,
        reference: &Reference,
        target: &Note,
    ) -> Result<Option<ResolvedAnchor>, ResolveError> {
        let unresolved = |reason: String| ResolveError::Unresolved {
            reference: reference.describe(),
            reason,
        };
        match &reference.anchor {
            Anchor::None => Ok(None),
            Anchor::Heading(text) => target
                .heading(text)
                .map(|h| Some(ResolvedAnchor::Heading(h.slug.clone())))
                .ok_or_else(|| unresolved(format!("heading '{text}' not found in {}", target.id))),
            Anchor::Block(id) => target
                .block(id)
                .map(|_| Some(ResolvedAnchor::Block(id.clone())))
                .ok_or_else(|| unresolved(format!("block '^{id}' not found in {}", target.id))),
        }
    }

    fn locate_asset(&self, target: &str, note: &Note) -> Option<PathBuf> {
        let note_dir = note.absolute_path.parent().unwrap_or(self.index.root());
        self.locator.locate(target, note_dir).or_else(|| {
            Path::new(target)
                .extension()
                .is_none()
                .then(|| self.locator.locate(&format!("{target}.png"), note_dir))
                .flatten()
        })
    }

    /// Expand `text`, a slice of `note`'s body starting at `first_line`.
    ///
    /// Cycle and depth errors from nested embeds are returned to the caller
    /// unless `note` is the outermost note on the path, where they become
    /// a broken marker for the embed that started the chain.
    fn expand_text(
        &self,
        note: &Note,
        text: &str,
        first_line: usize,
        visiting: &[NoteId],
    ) -> Result<Expansion, ResolveError> {
        let outermost = visiting.len() == 1;
        let mut expansion = Expansion::default();
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;

        for token in parse_references(text) {
            let span = token.span();
            if span.start < cursor {
                continue;
            }
            out.push_str(&text[cursor..span.start]);
            cursor = span.end;

            let reference = match token {
                Token::Asset(asset) => {
                    self.rewrite_asset(note, &asset, first_line, &mut out, &mut expansion);
                    continue;
                }
                Token::Note(reference) => reference,
            };
            let line = first_line + reference.line - 1;

            match self.resolve(&reference, &note.id, visiting) {
                Ok(ResolvedTarget::Link { note: target, anchor }) => {
                    tracing::debug!("{}: {} -> {}", note.id, reference.raw, target);
                    let dest = match anchor {
                        Some(anchor) => format!("{XREF_SCHEME}{target}#{}", anchor.label()),
                        None => format!("{XREF_SCHEME}{target}"),
                    };
                    push_link(&mut out, &reference.display(), &dest);
                    expansion.resolved.push(reference);
                }
                Ok(ResolvedTarget::Fragment { note: target, title, expansion: nested }) => {
                    tracing::debug!("{}: embedded {}", note.id, target);
                    let next = splice_embed(text, span.clone(), &title, &nested.text, &mut out);
                    cursor = next;
                    expansion.absorb(nested);
                    expansion.resolved.push(reference);
                }
                Err(e @ ResolveError::Unresolved { .. }) => {
                    tracing::warn!("{}:{}: {}", note.id, line, e);
                    push_broken(&mut out, &reference);
                    expansion.warnings.push(Warning {
                        kind: WarningKind::UnresolvedReference,
                        note: note.id.clone(),
                        line: Some(line),
                        message: e.to_string(),
                    });
                }
                Err(e) if outermost => {
                    tracing::warn!("{}:{}: {}", note.id, line, e);
                    push_broken(&mut out, &reference);
                    expansion.warnings.push(Warning {
                        kind: WarningKind::CyclicTransclusion,
                        note: note.id.clone(),
                        line: Some(line),
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        out.push_str(&text[cursor..]);
        expansion.text = out;
        Ok(expansion)
    }

    fn rewrite_asset(
        &self,
        note: &Note,
        asset: &AssetReference,
        first_line: usize,
        out: &mut String,
        expansion: &mut Expansion,
    ) {
        if asset.target.starts_with("http://") || asset.target.starts_with("https://") {
            out.push_str(&format!("![{}]({})", asset.alt, asset.target));
            return;
        }

        match self.locate_asset(&asset.target, note) {
            Some(path) => {
                let dest = format!("{ASSET_SCHEME}{}", path.display());
                match &asset.size {
                    Some(size) => out.push_str(&format!("![{}](<{dest}> \"{size}\")", asset.alt)),
                    None => out.push_str(&format!("![{}](<{dest}>)", asset.alt)),
                }
                expansion.assets.insert(path);
            }
            None => {
                let line = first_line + asset.line - 1;
                let message = format!("image '{}' not found", asset.target);
                tracing::warn!("{}:{}: {}", note.id, line, message);
                push_link(out, &asset.target, &format!("{BROKEN_SCHEME}{}", asset.target));
                expansion.warnings.push(Warning {
                    kind: WarningKind::MissingAsset,
                    note: note.id.clone(),
                    line: Some(line),
                    message,
                });
            }
        }
    }
}

fn push_link(out: &mut String, display: &str, dest: &str) {
    let display = display.replace('[', "\\[").replace(']', "\\]");
    let dest: String = dest.chars().filter(|c| !matches!(c, '<' | '>' | '\n')).collect();
    out.push_str(&format!("[{display}](<{dest}>)"));
}

fn push_broken(out: &mut String, reference: &Reference) {
    let display = reference.display();
    let display = if display.is_empty() { reference.describe() } else { display };
    push_link(out, &display, &format!("{BROKEN_SCHEME}{}", reference.describe()));
}

/// Leading blockquote markers of a line (`> > `), empty when not quoted.
fn quote_prefix(line: &str) -> &str {
    let len = line.len() - line.trim_start_matches(['>', ' ', '\t']).len();
    let prefix = &line[..len];
    if prefix.contains('>') { prefix } else { "" }
}

/// Emit an `[!embed]` callout in place of the token at `span`, keeping the
/// host line's quote prefix. Returns the new cursor position in `text`.
fn splice_embed(
    text: &str,
    span: std::ops::Range<usize>,
    title: &str,
    fragment: &str,
    out: &mut String,
) -> usize {
    let line_start = text[..span.start].rfind('\n').map_or(0, |i| i + 1);
    let line_end = text[span.end..].find('\n').map_or(text.len(), |i| span.end + i);
    let prefix = quote_prefix(&text[line_start..line_end]);
    let body_start = (line_start + prefix.len()).min(span.start);
    let before = &text[body_start..span.start];
    let after = &text[span.end..line_end];

    if before.trim().is_empty() {
        out.truncate(out.len() - before.len());
    } else {
        out.push('\n');
        out.push_str(prefix.trim_end());
        out.push('\n');
        out.push_str(prefix);
    }

    out.push_str("> [!embed] ");
    out.push_str(title);
    for line in fragment.trim_end().lines() {
        out.push('\n');
        out.push_str(prefix);
        if line.trim().is_empty() {
            out.push('>');
        } else {
            out.push_str("> ");
            out.push_str(line);
        }
    }

    if !after.trim().is_empty() {
        out.push('\n');
        out.push_str(prefix.trim_end());
        out.push('\n');
        out.push_str(prefix);
        return span.end + (after.len() - after.trim_start().len());
    }

    // Keep the following line out of the callout
    let next_line = text.get(line_end + 1..).and_then(|rest| rest.lines().next());
    if next_line.is_some_and(|l| !l.trim().is_empty()) {
        out.push('\n');
        out.push_str(prefix.trim_end());
    }
    span.end
}
