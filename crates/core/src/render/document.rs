//! Document wrappers: standalone article, book chapter and book master file.

use super::{CHAPTER_LABEL, escape_latex};

const PREAMBLE: &str = r"\usepackage{fontspec}
\usepackage{amsmath}
\usepackage{amssymb}
\usepackage{gensymb}
\usepackage{mathrsfs}
\usepackage{extpfeil}
\usepackage{graphicx}
\usepackage{grffile}
\usepackage{svg}
\usepackage[colorlinks=true, urlcolor=green, linkcolor=blue, citecolor=blue]{hyperref}
\usepackage[most]{tcolorbox}
\usepackage{upquote}
\usepackage{xcolor}
\usepackage{soul}
\usepackage{booktabs}
\usepackage{tabularx}
\usepackage{titling}
\pretitle{\begin{center}\Huge\bfseries}
\posttitle{\end{center}}
\definecolor{yellow}{HTML}{FFFF00}
\sethlcolor{yellow}
\newcommand{\longmapsfrom}{\mathrel{\longleftarrow\mkern-12mu\mid}}
\setcounter{MaxMatrixCols}{30}
";

/// Packages and macros shared by every generated document.
pub fn preamble() -> &'static str {
    PREAMBLE
}

fn banner_block(banner: Option<&str>) -> String {
    banner.map_or_else(String::new, |path| {
        format!(
            "\\begin{{center}}\n\\includegraphics[width=0.9\\textwidth]{{{path}}}\n\\end{{center}}\n\\vspace{{1em}}\n"
        )
    })
}

/// A complete `article` for one note.
pub fn standalone_document(title: &str, author: &str, banner: Option<&str>, body: &str) -> String {
    format!(
        "\\documentclass[a4paper, 11pt]{{article}}\n\
         {PREAMBLE}\
         \\usepackage[a4paper, top=1in, bottom=1in, left=0.9in, right=0.9in]{{geometry}}\n\
         \\title{{{title}}}\n\
         \\author{{{author}}}\n\
         \\date{{\\today}}\n\n\
         \\begin{{document}}\n\
         \\maketitle\n\
         {banner}\
         \\tableofcontents\n\n\
         {body}\n\
         \\end{{document}}\n",
        title = escape_latex(title),
        author = escape_latex(author),
        banner = banner_block(banner),
        body = body.trim_end(),
    )
}

/// A chapter of a book, labelled so links to the note land on its first page.
pub fn chapter_document(title: &str, banner: Option<&str>, body: &str) -> String {
    format!(
        "\\chapter{{{title}}}\\label{{{CHAPTER_LABEL}}}\n{banner}\\vspace{{1cm}}\n\n{body}\n",
        title = escape_latex(title),
        banner = banner_block(banner),
        body = body.trim_end(),
    )
}

/// One part of the book: an optional `\part{}` heading and its chapter files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterPart {
    pub title: Option<String>,
    /// Names passed to `\include`, relative to the master file.
    pub chapters: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BookMaster<'a> {
    pub title: &'a str,
    pub author: &'a str,
    pub cover: Option<&'a str>,
    pub front: &'a [String],
    pub parts: &'a [MasterPart],
    pub back: &'a [String],
}

fn includes(out: &mut String, chapters: &[String]) {
    for chapter in chapters {
        out.push_str(&format!("\\include{{{chapter}}}\n"));
    }
}

/// The master file of a book: title page, front matter, parts, back matter.
pub fn master_document(book: &BookMaster<'_>) -> String {
    let mut out = String::new();
    out.push_str("\\documentclass[a4paper, 11pt, twoside]{book}\n");
    out.push_str(PREAMBLE);
    out.push_str("\\usepackage[a4paper, top=1in, bottom=1in, inner=0.9in, outer=1.1in]{geometry}\n");
    out.push_str(&format!("\\title{{{}}}\n", escape_latex(book.title)));
    out.push_str(&format!("\\author{{{}}}\n", escape_latex(book.author)));
    out.push_str("\\date{\\today}\n\n\\begin{document}\n\n");

    if let Some(cover) = book.cover {
        out.push_str(&format!(
            "\\begin{{titlepage}}\n\\centering\n\\includegraphics[width=\\textwidth]{{{cover}}}\n\\end{{titlepage}}\n\n"
        ));
    }

    out.push_str("\\frontmatter\n\\maketitle\n\\tableofcontents\n");
    includes(&mut out, book.front);

    out.push_str("\n\\mainmatter\n");
    for part in book.parts {
        if let Some(title) = &part.title {
            out.push_str(&format!("\\part{{{}}}\n", escape_latex(title)));
        }
        includes(&mut out, &part.chapters);
    }

    out.push_str("\n\\backmatter\n");
    includes(&mut out, book.back);
    out.push_str("\n\\end{document}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standalone_document() {
        let doc = standalone_document("Heat & Mass", "Ada", Some("/out/build_assets/b.png"), "Body.\n\n");
        assert!(doc.starts_with("\\documentclass[a4paper, 11pt]{article}\n\\usepackage{fontspec}"));
        assert!(doc.contains(r"\title{Heat \& Mass}"));
        assert!(doc.contains("\\maketitle\n\\begin{center}\n\\includegraphics[width=0.9\\textwidth]{/out/build_assets/b.png}"));
        assert!(doc.contains("\\tableofcontents\n\nBody.\n\\end{document}\n"));
    }

    #[test]
    fn test_chapter_document() {
        let chapter = chapter_document("Intro", None, "Text");
        assert_eq!(chapter, "\\chapter{Intro}\\label{note}\n\\vspace{1cm}\n\nText\n");
    }

    #[test]
    fn test_master_document_order() {
        let parts = vec![
            MasterPart { title: Some("One".into()), chapters: vec!["tex_chapters/b".into()] },
            MasterPart { title: None, chapters: vec!["tex_chapters/c".into()] },
        ];
        let front = vec!["tex_chapters/a".to_string()];
        let back = vec!["tex_chapters/z".to_string()];
        let master = master_document(&BookMaster {
            title: "Book",
            author: "Me",
            cover: Some("cover.png"),
            front: &front,
            parts: &parts,
            back: &back,
        });

        let position = |needle: &str| master.find(needle).unwrap();
        assert!(master.contains("{book}"));
        assert!(position("\\begin{titlepage}") < position("\\frontmatter"));
        assert!(position("\\include{tex_chapters/a}") < position("\\mainmatter"));
        assert!(position("\\part{One}") < position("\\include{tex_chapters/b}"));
        assert!(position("\\include{tex_chapters/c}") < position("\\backmatter"));
        assert!(position("\\backmatter") < position("\\include{tex_chapters/z}"));
        assert_eq!(master.matches("\\part{").count(), 1);
    }
}
