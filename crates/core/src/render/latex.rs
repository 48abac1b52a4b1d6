//! Walks a comrak AST and writes LaTeX.

use std::path::Path;
use std::sync::LazyLock;

use comrak::nodes::{AstNode, ListType, NodeValue};
use comrak::{Arena, parse_document};
use regex::Regex;

use super::{CHAPTER_LABEL, RenderContext, RenderMode};
use crate::index::{Heading, NoteId};
use crate::markdown_ast::{collect_text, options};
use crate::resolve::{ASSET_SCHEME, BROKEN_SCHEME, XREF_SCHEME};
use crate::vault::extractor::BLOCK_MARKER_RE;
use crate::vault::slug::Slugger;

static CALLOUT_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[!([A-Za-z0-9_-]+)\][+-]?\s*(.*)$").unwrap());

static HIGHLIGHT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"==([^=\n]+)==").unwrap());

const DEFAULT_IMAGE_WIDTH: &str = r"width=0.4\textwidth";

/// Escape the characters LaTeX treats specially in running text.
pub fn escape_latex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str(r"\&"),
            '%' => out.push_str(r"\%"),
            '$' => out.push_str(r"\$"),
            '#' => out.push_str(r"\#"),
            '_' => out.push_str(r"\_"),
            '{' => out.push_str(r"\{"),
            '}' => out.push_str(r"\}"),
            '~' => out.push_str(r"\textasciitilde{}"),
            '^' => out.push_str(r"\^{}"),
            '\\' => out.push_str(r"\textbackslash{}"),
            '<' => out.push_str(r"\textless{}"),
            '>' => out.push_str(r"\textgreater{}"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_url(url: &str) -> String {
    url.replace('%', r"\%").replace('#', r"\#")
}

fn callout_color(kind: &str) -> &'static str {
    match kind {
        "note" => "blue",
        "abstract" | "info" => "cyan",
        "todo" | "question" => "orange",
        "tip" | "done" => "green",
        "warning" | "caution" | "fail" | "error" => "red",
        "example" => "violet",
        _ => "gray",
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn image_width(title: &str) -> String {
    match title.trim().parse::<u32>() {
        Ok(size) => format!("width={}pt", (size * 190 / 390).min(350)),
        Err(_) => DEFAULT_IMAGE_WIDTH.to_string(),
    }
}

fn is_break(node: &AstNode<'_>) -> bool {
    matches!(node.data.borrow().value, NodeValue::SoftBreak | NodeValue::LineBreak)
}

/// `[!type] title` on the first line of a blockquote makes it a callout.
fn callout_header<'a>(blockquote: &'a AstNode<'a>) -> Option<(String, String)> {
    let first = blockquote.first_child()?;
    if !matches!(first.data.borrow().value, NodeValue::Paragraph) {
        return None;
    }

    let mut line = String::new();
    for child in first.children() {
        if is_break(child) {
            break;
        }
        line.push_str(&collect_text(child));
    }

    let caps = CALLOUT_HEADER_RE.captures(line.trim())?;
    Some((caps[1].to_lowercase(), caps[2].trim().to_string()))
}

/// Converts expanded note Markdown into a LaTeX body.
#[derive(Debug, Default, Clone, Copy)]
pub struct LatexRenderer;

impl LatexRenderer {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, markdown: &str, ctx: &RenderContext<'_>) -> String {
        let arena = Arena::new();
        let options = options();
        let root = parse_document(&arena, markdown, &options);

        let mut writer = Writer::new(ctx);
        writer.blocks(root);
        writer.out.trim_end().to_string() + "\n"
    }
}

struct Writer<'c> {
    ctx: &'c RenderContext<'c>,
    out: String,
    /// Index headings not yet rendered; their slugs keep labels in step
    /// with the anchors links were resolved against.
    headings: std::slice::Iter<'c, Heading>,
    /// Slugs for headings the index does not know (added by a pre stage).
    slugger: Slugger,
    /// Nesting depth of `[!embed]` boxes; headings inside are unlabeled.
    embed_depth: usize,
    /// Nesting depth of any tcolorbox; floats are not allowed inside.
    box_depth: usize,
}

impl<'c> Writer<'c> {
    fn new(ctx: &'c RenderContext<'c>) -> Self {
        let mut slugger = Slugger::new();
        for heading in ctx.headings {
            slugger.reserve(&heading.slug);
        }
        Self {
            ctx,
            out: String::new(),
            headings: ctx.headings.iter(),
            slugger,
            embed_depth: 0,
            box_depth: 0,
        }
    }

    fn blocks<'a>(&mut self, node: &'a AstNode<'a>) {
        for child in node.children() {
            self.block(child);
        }
    }

    fn inlines<'a>(&mut self, node: &'a AstNode<'a>) {
        for child in node.children() {
            self.inline(child);
        }
    }

    fn block<'a>(&mut self, node: &'a AstNode<'a>) {
        let value = node.data.borrow().value.clone();
        match value {
            NodeValue::Paragraph => self.paragraph(node, false),
            NodeValue::Heading(heading) => self.heading(node, heading.level),
            NodeValue::BlockQuote => self.blockquote(node),
            NodeValue::List(list) => {
                let env = match list.list_type {
                    ListType::Bullet => "itemize",
                    ListType::Ordered => "enumerate",
                };
                self.out.push_str(&format!("\\begin{{{env}}}\n"));
                self.blocks(node);
                self.out.push_str(&format!("\\end{{{env}}}\n\n"));
            }
            NodeValue::Item(_) | NodeValue::TaskItem(..) => {
                self.out.push_str(r"\item ");
                self.blocks(node);
                let trimmed = self.out.trim_end().len();
                self.out.truncate(trimmed);
                self.out.push('\n');
            }
            NodeValue::CodeBlock(code) => {
                self.out.push_str("\\begin{verbatim}\n");
                self.out.push_str(code.literal.trim_end_matches('\n'));
                self.out.push_str("\n\\end{verbatim}\n\n");
            }
            NodeValue::ThematicBreak => {
                self.out.push_str("\\noindent\\rule{\\textwidth}{0.4pt}\n\n");
            }
            NodeValue::Table(..) => self.table(node),
            NodeValue::HtmlBlock(_) | NodeValue::FrontMatter(_) => {}
            _ => self.blocks(node),
        }
    }

    fn inline<'a>(&mut self, node: &'a AstNode<'a>) {
        let value = node.data.borrow().value.clone();
        match value {
            NodeValue::Text(text) => self.text(&text),
            NodeValue::SoftBreak => self.out.push('\n'),
            NodeValue::LineBreak => self.out.push_str("\\\\\n"),
            NodeValue::Code(code) => {
                self.out.push_str(&format!("\\texttt{{{}}}", escape_latex(&code.literal)));
            }
            NodeValue::Math(math) => {
                if math.display_math {
                    self.out.push_str(&format!("$$\n{}\n$$", math.literal.trim()));
                } else {
                    self.out.push_str(&format!("${}$", math.literal));
                }
            }
            NodeValue::Emph => self.wrap(node, r"\textit{"),
            NodeValue::Strong => self.wrap(node, r"\textbf{"),
            NodeValue::Strikethrough => self.wrap(node, r"\st{"),
            NodeValue::Link(link) => self.link(node, &link.url),
            NodeValue::Image(link) => self.image(node, &link.url, &link.title),
            NodeValue::HtmlInline(_) => {}
            _ => self.inlines(node),
        }
    }

    fn wrap<'a>(&mut self, node: &'a AstNode<'a>, open: &str) {
        self.out.push_str(open);
        self.inlines(node);
        self.out.push('}');
    }

    fn text(&mut self, text: &str) {
        let mut last = 0;
        for caps in HIGHLIGHT_RE.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            self.out.push_str(&escape_latex(&text[last..whole.start()]));
            self.out.push_str(&format!("\\hl{{{}}}", escape_latex(&caps[1])));
            last = whole.end();
        }
        self.out.push_str(&escape_latex(&text[last..]));
    }

    /// A trailing `^id` marker becomes a label after the paragraph.
    /// With `skip_header`, everything up to the first line break is dropped
    /// (the callout header line).
    fn paragraph<'a>(&mut self, node: &'a AstNode<'a>, skip_header: bool) {
        let start = self.out.len();
        let mut marker = None;
        let mut in_header = skip_header;

        for child in node.children() {
            if in_header {
                in_header = !is_break(child);
                continue;
            }

            let trailing_text = match child.data.borrow().value {
                NodeValue::Text(ref t) if child.next_sibling().is_none() => Some(t.clone()),
                _ => None,
            };
            if let Some(text) = trailing_text
                && let Some(caps) = BLOCK_MARKER_RE.captures(&text)
                && let Some(whole) = caps.get(0)
            {
                self.text(text[..whole.start()].trim_end());
                marker = Some(caps[1].to_string());
                continue;
            }
            self.inline(child);
        }

        if let Some(id) = marker
            && self.embed_depth == 0
        {
            self.out.push_str(&format!("\\phantomsection\\label{{b:{id}}}"));
        }
        if self.out.len() > start {
            self.out.push_str("\n\n");
        }
    }

    fn heading<'a>(&mut self, node: &'a AstNode<'a>, level: u8) {
        let command = match level {
            1 => "section",
            2 => "subsection",
            3 => "subsubsection",
            _ => "paragraph",
        };

        if self.embed_depth > 0 {
            self.out.push_str(&format!("\\{command}*{{"));
            self.inlines(node);
            self.out.push_str("}\n\n");
            return;
        }

        let slug = match self.headings.next() {
            Some(heading) => heading.slug.clone(),
            None => self.slugger.slug(collect_text(node).trim()),
        };
        self.out.push_str(&format!("\\{command}{{"));
        self.inlines(node);
        self.out.push_str(&format!("}}\\label{{h:{slug}}}\n\n"));
    }

    fn blockquote<'a>(&mut self, node: &'a AstNode<'a>) {
        let Some((kind, title)) = callout_header(node) else {
            self.out.push_str("\\begin{quote}\n");
            self.blocks(node);
            self.out.push_str("\\end{quote}\n\n");
            return;
        };

        let embed = kind == "embed";
        if embed {
            self.out.push_str(&format!(
                "\\begin{{tcolorbox}}[colback=black!5!white, colframe=black!75!white, coltext=black, title={{{}}}, breakable, fonttitle=\\small\\ttfamily]\n",
                escape_latex(&title)
            ));
            self.embed_depth += 1;
        } else {
            let title = if title.is_empty() { capitalize(&kind) } else { title };
            let color = callout_color(&kind);
            self.out.push_str(&format!(
                "\\begin{{tcolorbox}}[colback={color}!5!white, colframe={color}!75!black, coltext=black, fonttitle=\\bfseries, breakable, title={{{}}}]\n",
                escape_latex(&title)
            ));
        }
        self.box_depth += 1;

        for (i, child) in node.children().enumerate() {
            if i == 0 {
                self.paragraph(child, true);
            } else {
                self.block(child);
            }
        }

        self.box_depth -= 1;
        if embed {
            self.embed_depth -= 1;
        }
        let trimmed = self.out.trim_end().len();
        self.out.truncate(trimmed);
        self.out.push_str("\n\\end{tcolorbox}\n\n");
    }

    fn table<'a>(&mut self, node: &'a AstNode<'a>) {
        let columns = node.first_child().map_or(0, |row| row.children().count());
        if columns == 0 {
            return;
        }
        let spec = if columns == 1 {
            "X".to_string()
        } else {
            std::iter::once("l").chain(std::iter::repeat_n("X", columns - 1)).collect::<Vec<_>>().join(" ")
        };

        self.out.push_str(&format!("\\begin{{tabularx}}{{\\textwidth}}{{ {spec} }}\n\\toprule\n"));
        for row in node.children() {
            let header = matches!(row.data.borrow().value, NodeValue::TableRow(true));
            for (i, cell) in row.children().enumerate() {
                if i > 0 {
                    self.out.push_str(" & ");
                }
                if header {
                    self.wrap(cell, r"\textbf{");
                } else {
                    self.inlines(cell);
                }
            }
            self.out.push_str(" \\\\\n");
            if header {
                self.out.push_str("\\midrule\n");
            }
        }
        self.out.push_str("\\bottomrule\n\\end{tabularx}\n\n");
    }

    fn link<'a>(&mut self, node: &'a AstNode<'a>, url: &str) {
        if url.starts_with(BROKEN_SCHEME) {
            return self.wrap(node, r"\textcolor{red}{");
        }
        if let Some(target) = url.strip_prefix(XREF_SCHEME) {
            return self.xref(node, target);
        }
        if url.starts_with("http://") || url.starts_with("https://") || url.starts_with("mailto:") {
            self.out.push_str(&format!("\\href{{{}}}{{", escape_url(url)));
            self.inlines(node);
            self.out.push('}');
            return;
        }
        self.inlines(node);
    }

    fn xref<'a>(&mut self, node: &'a AstNode<'a>, target: &str) {
        let (id, anchor) = match target.rsplit_once('#') {
            Some((id, anchor)) => (id, Some(anchor)),
            None => (target, None),
        };
        let self_link = id == self.ctx.note.as_str();

        let label = match (self.ctx.mode, self_link) {
            (RenderMode::Standalone, true) => anchor.map(str::to_string),
            (RenderMode::Standalone, false) => None,
            (RenderMode::Chapter { .. }, true) => Some(anchor.unwrap_or(CHAPTER_LABEL).to_string()),
            (RenderMode::Chapter { namespaces }, false) => namespaces
                .get(&NoteId::normalize(id))
                .map(|ns| format!("{ns}:{}", anchor.unwrap_or(CHAPTER_LABEL))),
        };

        match label {
            Some(label) => {
                self.out.push_str(&format!("\\hyperref[{label}]{{"));
                self.inlines(node);
                self.out.push('}');
            }
            None if self_link => self.inlines(node),
            None => self.wrap(node, r"\textcolor{blue}{"),
        }
    }

    fn image<'a>(&mut self, node: &'a AstNode<'a>, url: &str, title: &str) {
        let Some(source) = url.strip_prefix(ASSET_SCHEME) else {
            let message = if url.starts_with("http://") || url.starts_with("https://") {
                "Web image skipped"
            } else {
                "Image not found"
            };
            self.out.push_str(&format!("\\textcolor{{red}}{{{message}: {}}}", escape_latex(url)));
            return;
        };

        let source = Path::new(source);
        let Some(staged) = self.ctx.assets.get(source) else {
            self.out.push_str(&format!(
                "\\textcolor{{red}}{{Image not found: {}}}",
                escape_latex(&source.display().to_string())
            ));
            return;
        };

        let width = image_width(title);
        let path = staged.tex_path.display().to_string().replace('\\', "/");
        let include = if staged.svg {
            format!("\\includesvg[{width}]{{{path}}}")
        } else {
            format!("\\includegraphics[{width}]{{{path}}}")
        };

        let alt = collect_text(node);
        let caption = if alt.trim().is_empty() {
            source.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
        } else {
            alt.trim().to_string()
        };
        let caption = escape_latex(&caption);

        if self.box_depth > 0 {
            self.out.push_str(&format!(
                "\\begin{{center}}\n{include}\n\n\\textit{{{caption}}}\n\\end{{center}}\n"
            ));
        } else {
            self.out.push_str(&format!(
                "\\begin{{figure}}[h!]\n\\centering\n{include}\n\\caption{{{caption}}}\n\\end{{figure}}\n"
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::StagedAsset;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn render_with(markdown: &str, mode: RenderMode<'_>, assets: &HashMap<PathBuf, StagedAsset>) -> String {
        render_indexed(markdown, &[], mode, assets)
    }

    fn render_indexed(
        markdown: &str,
        headings: &[Heading],
        mode: RenderMode<'_>,
        assets: &HashMap<PathBuf, StagedAsset>,
    ) -> String {
        let note = NoteId::normalize("notes/a");
        let ctx = RenderContext { note: &note, mode, assets, headings };
        LatexRenderer::new().render(markdown, &ctx)
    }

    fn render(markdown: &str) -> String {
        render_with(markdown, RenderMode::Standalone, &HashMap::new())
    }

    #[test]
    fn test_escape_latex() {
        assert_eq!(escape_latex("50% & more"), r"50\% \& more");
        assert_eq!(escape_latex("a_b {c} ~ ^"), r"a\_b \{c\} \textasciitilde{} \^{}");
        assert_eq!(escape_latex(r"\ <x>"), r"\textbackslash{} \textless{}x\textgreater{}");
    }

    #[test]
    fn test_headings_get_slug_labels() {
        let out = render("# Intro\n\n## Intro\n\n#### Deep one\n");
        assert!(out.contains(r"\section{Intro}\label{h:intro}"));
        assert!(out.contains(r"\subsection{Intro}\label{h:intro-1}"));
        assert!(out.contains(r"\paragraph{Deep one}\label{h:deep-one}"));
    }

    #[test]
    fn test_heading_labels_follow_the_index() {
        let indexed = crate::vault::extractor::extract_headings("# Using [[Tool|the tool]]\n");
        assert_eq!(indexed[0].slug, "using-toolthe-tool");

        // Expanded text as the resolver writes it, plus a heading added later.
        let markdown = "# Using [the tool](<xref:tool>)\n\n## Using toolthe tool\n";
        let out = render_indexed(markdown, &indexed, RenderMode::Standalone, &HashMap::new());
        assert!(out.contains(r"\label{h:using-toolthe-tool}"), "{out}");
        assert!(!out.contains("h:using-the-tool"), "{out}");
        assert!(out.contains(r"\label{h:using-toolthe-tool-1}"), "{out}");
    }

    #[test]
    fn test_inline_formatting() {
        let out = render("Some *it* and **bold**, `x_y`, ~~gone~~ and ==mark==.");
        assert!(out.contains(r"\textit{it}"));
        assert!(out.contains(r"\textbf{bold}"));
        assert!(out.contains(r"\texttt{x\_y}"));
        assert!(out.contains(r"\st{gone}"));
        assert!(out.contains(r"\hl{mark}"));
    }

    #[test]
    fn test_math_is_not_escaped() {
        let out = render("Inline $a_1$ here.\n\n$$\nx^2\n$$\n");
        assert!(out.contains("$a_1$"));
        assert!(out.contains("$$\nx^2\n$$"));
    }

    #[test]
    fn test_block_marker_becomes_label() {
        let out = render("A claim. ^claim-1\n\nNext.");
        assert!(out.contains(r"A claim.\phantomsection\label{b:claim-1}"));
        assert!(out.contains("Next."));
        assert!(!out.contains(r"\^{}claim"));
    }

    #[test]
    fn test_callout_box() {
        let out = render("> [!warning] Careful\n> Hot surface.\n");
        assert!(out.contains(
            r"\begin{tcolorbox}[colback=red!5!white, colframe=red!75!black, coltext=black, fonttitle=\bfseries, breakable, title={Careful}]"
        ));
        assert!(out.contains("Hot surface."));
        assert!(out.contains(r"\end{tcolorbox}"));
        assert!(!out.contains("[!warning]"));
    }

    #[test]
    fn test_callout_default_title_and_unknown_kind() {
        let out = render("> [!tip]\n> Body\n");
        assert!(out.contains("colback=green!5!white"));
        assert!(out.contains("title={Tip}"));

        let out = render("> [!whatever]\n> Body\n");
        assert!(out.contains("colback=gray!5!white"));
    }

    #[test]
    fn test_embed_headings_are_starred() {
        let out = render("> [!embed] b.md\n> ## Inside\n> text\n\n## Outside\n");
        assert!(out.contains("fonttitle=\\small\\ttfamily"));
        assert!(out.contains(r"\subsection*{Inside}"));
        assert!(!out.contains("h:inside"));
        assert!(out.contains(r"\subsection{Outside}\label{h:outside}"));
    }

    #[test]
    fn test_plain_blockquote() {
        let out = render("> just quoted\n");
        assert!(out.contains("\\begin{quote}\njust quoted"));
    }

    #[test]
    fn test_lists() {
        let out = render("- a\n- b\n\n1. one\n2. two\n");
        assert!(out.contains("\\begin{itemize}\n\\item a\n\\item b\n\\end{itemize}"));
        assert!(out.contains("\\begin{enumerate}\n\\item one\n\\item two\n\\end{enumerate}"));
    }

    #[test]
    fn test_table() {
        let out = render("| A | B | C |\n|---|---|---|\n| 1 | 2 | 3 |\n");
        assert!(out.contains(r"\begin{tabularx}{\textwidth}{ l X X }"));
        assert!(out.contains("\\textbf{A} & \\textbf{B} & \\textbf{C} \\\\\n\\midrule"));
        assert!(out.contains("1 & 2 & 3 \\\\\n\\bottomrule"));
    }

    #[test]
    fn test_code_block_is_verbatim() {
        let out = render("```rust\nlet x_y = 1;\n```\n");
        assert!(out.contains("\\begin{verbatim}\nlet x_y = 1;\n\\end{verbatim}"));
    }

    #[test]
    fn test_links_in_standalone_mode() {
        let out = render(
            "[here](<xref:notes/a#h:intro>) [top](<xref:notes/a>) [other](<xref:notes/b#h:x>) [gone](<broken:c>) [web](https://x.org/a%20b#frag)",
        );
        assert!(out.contains(r"\hyperref[h:intro]{here}"));
        assert!(out.contains(" top "));
        assert!(out.contains(r"\textcolor{blue}{other}"));
        assert!(out.contains(r"\textcolor{red}{gone}"));
        assert!(out.contains(r"\href{https://x.org/a\%20b\#frag}{web}"));
    }

    #[test]
    fn test_links_in_chapter_mode() {
        let mut namespaces = HashMap::new();
        namespaces.insert(NoteId::normalize("notes/b"), "ns-b-1234abcd".to_string());
        let out = render_with(
            "[self](<xref:notes/a>) [b](<xref:notes/b#b:x>) [b2](<xref:notes/b>) [c](<xref:notes/c>)",
            RenderMode::Chapter { namespaces: &namespaces },
            &HashMap::new(),
        );
        assert!(out.contains(r"\hyperref[note]{self}"));
        assert!(out.contains(r"\hyperref[ns-b-1234abcd:b:x]{b}"));
        assert!(out.contains(r"\hyperref[ns-b-1234abcd:note]{b2}"));
        assert!(out.contains(r"\textcolor{blue}{c}"));
    }

    #[test]
    fn test_images() {
        let mut assets = HashMap::new();
        assets.insert(
            PathBuf::from("/vault/img/p.png"),
            StagedAsset { tex_path: PathBuf::from("/out/build_assets/abc.png"), svg: false },
        );
        assets.insert(
            PathBuf::from("/vault/img/d.svg"),
            StagedAsset { tex_path: PathBuf::from("/out/build_assets/def.svg"), svg: true },
        );

        let out = render_with("![](<asset:/vault/img/p.png> \"300\")\n", RenderMode::Standalone, &assets);
        assert!(out.contains(r"\begin{figure}[h!]"));
        assert!(out.contains(r"\includegraphics[width=146pt]{/out/build_assets/abc.png}"));
        assert!(out.contains(r"\caption{p.png}"));

        let out = render_with(
            "> [!note]\n> ![Diagram](<asset:/vault/img/d.svg>)\n",
            RenderMode::Standalone,
            &assets,
        );
        assert!(out.contains(r"\includesvg[width=0.4\textwidth]{/out/build_assets/def.svg}"));
        assert!(out.contains(r"\textit{Diagram}"));
        assert!(!out.contains("figure"));

        let out = render("![x](https://example.org/a.png)\n");
        assert!(out.contains(r"\textcolor{red}{Web image skipped: https://example.org/a.png}"));
    }

    #[test]
    fn test_large_images_are_capped() {
        assert_eq!(image_width("1000"), "width=350pt");
        assert_eq!(image_width(""), DEFAULT_IMAGE_WIDTH);
    }
}
