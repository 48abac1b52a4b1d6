//! Built-in stages, addressed as `$name` in the processor lists.
//!
//! Pre stages rewrite Markdown before conversion, post stages rewrite the
//! generated LaTeX. Each one fixes one recurring authoring pattern.

use std::sync::LazyLock;

use regex::{Captures, NoExpand, Regex};

use super::Phase;

/// One built-in text stage.
#[derive(Debug)]
pub struct Builtin {
    pub name: &'static str,
    pub phase: Phase,
    pub apply: fn(&str) -> String,
}

pub const BUILTINS: &[Builtin] = &[
    Builtin { name: "normalize_unicode", phase: Phase::Pre, apply: normalize_unicode },
    Builtin {
        name: "insert_blank_blockquote_lines",
        phase: Phase::Pre,
        apply: insert_blank_blockquote_lines,
    },
    Builtin { name: "fix_callout_formulas", phase: Phase::Pre, apply: fix_callout_formulas },
    Builtin {
        name: "preprocess_nested_blockquotes",
        phase: Phase::Pre,
        apply: preprocess_nested_blockquotes,
    },
    Builtin {
        name: "fix_tcolorbox_label_tcolorbox",
        phase: Phase::Post,
        apply: fix_tcolorbox_label_tcolorbox,
    },
    Builtin { name: "fix_choose", phase: Phase::Post, apply: fix_choose },
    Builtin { name: "replace_bbox", phase: Phase::Post, apply: replace_bbox },
    Builtin {
        name: "replace_array_with_matrix_environments",
        phase: Phase::Post,
        apply: replace_array_with_matrix_environments,
    },
    Builtin { name: "fix_kern_syntax", phase: Phase::Post, apply: fix_kern_syntax },
    Builtin { name: "fix_smaller_than", phase: Phase::Post, apply: fix_smaller_than },
    Builtin { name: "fix_mathbb_k", phase: Phase::Post, apply: fix_mathbb_k },
    Builtin { name: "replace_tagged_dollars", phase: Phase::Post, apply: replace_tagged_dollars },
    Builtin {
        name: "split_inline_display_math",
        phase: Phase::Post,
        apply: split_inline_display_math,
    },
    Builtin {
        name: "replace_custom_arrow_tricks",
        phase: Phase::Post,
        apply: replace_custom_arrow_tricks,
    },
    Builtin { name: "fix_align_environment", phase: Phase::Post, apply: fix_align_environment },
    Builtin {
        name: "remove_bad_tex_block_pointers",
        phase: Phase::Post,
        apply: remove_bad_tex_block_pointers,
    },
    Builtin { name: "demote_headings", phase: Phase::Post, apply: demote_headings },
];

pub fn find(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|b| b.name == name)
}

/// Split into lines, apply `f`, and rejoin keeping a trailing newline.
fn map_lines(text: &str, f: impl FnOnce(Vec<&str>) -> Vec<String>) -> String {
    let mut out = f(text.lines().collect()).join("\n");
    if text.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn is_quote_line(line: &str) -> bool {
    line.trim_start().starts_with('>')
}

fn is_blank_quote_line(line: &str) -> bool {
    line.trim_start_matches(['>', ' ', '\t']).is_empty()
}

// --- pre ---

pub fn normalize_unicode(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            '\u{202F}' | '\u{00A0}' => Some(' '),
            '\u{200B}' | '\u{FFFC}' => None,
            other => Some(other),
        })
        .collect()
}

/// Separate consecutive quoted lines with an empty `>` line so each becomes
/// its own paragraph.
pub fn insert_blank_blockquote_lines(text: &str) -> String {
    map_lines(text, |lines| {
        let mut out = Vec::with_capacity(lines.len());
        let mut previous: Option<&str> = None;
        for line in lines {
            if let Some(prev) = previous
                && is_quote_line(prev)
                && is_quote_line(line)
                && !is_blank_quote_line(prev)
                && !is_blank_quote_line(line)
            {
                out.push(">".to_string());
            }
            out.push(line.to_string());
            previous = Some(line);
        }
        out
    })
}

static QUOTED_DISPLAY_MATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*>\s*\$\$\s*$").unwrap());
static QUOTE_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*>\s?").unwrap());

/// Pull `> $$ ... > $$` display-math blocks out of their quote.
pub fn fix_callout_formulas(text: &str) -> String {
    map_lines(text, |lines| {
        let mut out = Vec::with_capacity(lines.len());
        let mut i = 0;
        while i < lines.len() {
            if !QUOTED_DISPLAY_MATH_RE.is_match(lines[i]) {
                out.push(lines[i].to_string());
                i += 1;
                continue;
            }
            out.push("$$".to_string());
            i += 1;
            while i < lines.len() {
                let current = lines[i];
                if QUOTED_DISPLAY_MATH_RE.is_match(current) {
                    out.push("$$".to_string());
                    i += 1;
                    break;
                }
                if !is_quote_line(current) {
                    // Unterminated block: stop unquoting here
                    break;
                }
                out.push(QUOTE_PREFIX_RE.replace(current, "").into_owned());
                i += 1;
            }
        }
        out
    })
}

/// Lift plain `>>` nested quotes one level; nested callouts (`>>[!`) stay.
pub fn preprocess_nested_blockquotes(text: &str) -> String {
    map_lines(text, |lines| {
        lines
            .into_iter()
            .map(|line| {
                let stripped = line.trim_start();
                let indent = line.len() - stripped.len();
                if stripped.starts_with(">>")
                    && !stripped.trim_start_matches([' ', '>']).starts_with("[!")
                {
                    format!("{}{}", &line[..indent], &stripped[1..])
                } else {
                    line.to_string()
                }
            })
            .collect()
    })
}

// --- post ---

static TCOLORBOX_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\\end\{tcolorbox\})\s*(\\label\{[^\}]+\})\s*(\\end\{tcolorbox\})").unwrap()
});

/// Move a `\label` trapped between two closing boxes outwards, one nesting
/// level per pass, until nothing changes.
pub fn fix_tcolorbox_label_tcolorbox(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = TCOLORBOX_LABEL_RE.replace_all(&current, "${1}\n${3}\n${2}").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

static CHOOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+)\s*\\choose\s*(\w+)").unwrap());

pub fn fix_choose(text: &str) -> String {
    CHOOSE_RE.replace_all(text, r"\binom{${1}}{${2}}").into_owned()
}

static BBOX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\bbox(?:\[[^\]]*\])?\{([^}]*)\}").unwrap());

pub fn replace_bbox(text: &str) -> String {
    BBOX_RE.replace_all(text, r"\boxed{${1}}").into_owned()
}

/// (environment, left delimiter, right delimiter)
static MATRIX_RULES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("pmatrix", r"\\left\s*\(", r"\\right\s*\)"),
        ("bmatrix", r"\\left\s*\[", r"\\right\s*\]"),
        ("vmatrix", r"\\left\s*(?:\\vert|\|)", r"\\right\s*(?:\\vert|\|)"),
        ("Vmatrix", r"\\left\s*(?:\\Vert|\\\|)", r"\\right\s*(?:\\Vert|\\\|)"),
        ("matrix", "", ""),
    ]
    .into_iter()
    .map(|(env, left, right)| {
        let pattern = format!(
            r"(?s)({left})\\begin\{{array\}}(\s*\{{[^}}]*\}})?(.*?)\\end\{{array\}}({right})"
        );
        (env, Regex::new(&pattern).unwrap())
    })
    .collect()
});

/// `\left( \begin{array}{} ... \end{array} \right)` → `pmatrix`, and so on for
/// `[`, `|` and `\Vert`. A bare array becomes `matrix`. Arrays with a real
/// column spec are kept.
pub fn replace_array_with_matrix_environments(text: &str) -> String {
    let mut current = text.to_string();
    for (env, re) in MATRIX_RULES.iter() {
        current = re
            .replace_all(&current, |caps: &Captures| {
                let spec = caps.get(2).map_or("", |m| m.as_str()).trim();
                let inner = spec.trim_start_matches('{').trim_end_matches('}').trim();
                if !inner.is_empty() {
                    return caps[0].to_string();
                }
                format!("\\begin{{{env}}}{}\\end{{{env}}}", &caps[3])
            })
            .into_owned();
    }
    current
}

static KERN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\(kern|raise|moveleft|moveright)\s*\{([^}]+)\}").unwrap());
static DIMENSION_SPACING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d*\.?\d+)\s+(pt|pc|in|bp|cm|mm|dd|cc|sp|em|ex|mu)\b").unwrap()
});

/// `\kern{2pt}` → `\kern 2pt`, then `1 em` → `1em`.
pub fn fix_kern_syntax(text: &str) -> String {
    let unbraced = KERN_RE.replace_all(text, r"\${1} ${2}");
    DIMENSION_SPACING_RE.replace_all(&unbraced, "${1}${2}").into_owned()
}

pub fn fix_smaller_than(text: &str) -> String {
    text.replace(r"\<", "<").replace(r"\>", ">")
}

static MATHBB_K_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\mathbb\s*k\b").unwrap());

pub fn fix_mathbb_k(text: &str) -> String {
    MATHBB_K_RE.replace_all(text, NoExpand(r"\Bbbk")).into_owned()
}

static DOLLAR_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\$\$(.*?)\$\$").unwrap());
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\tag\s*(?:\{(.*?)\}|([^\s{]+))").unwrap());

/// `$$ x \tag{1} $$` → an `equation` environment carrying the tag.
pub fn replace_tagged_dollars(text: &str) -> String {
    DOLLAR_BLOCK_RE
        .replace_all(text, |caps: &Captures| {
            let content = &caps[1];
            let Some(tag) = TAG_RE.captures(content) else {
                return caps[0].to_string();
            };
            let label = tag.get(1).or_else(|| tag.get(2)).map_or("", |m| m.as_str());
            let body = TAG_RE.replace(content, "");
            format!("\\begin{{equation}}\n{}\n\\tag{{{label}}}\n\\end{{equation}}", body.trim())
        })
        .into_owned()
}

static DISPLAY_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\$[ \t]*([^\s])").unwrap());
static DISPLAY_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^\n]+?)[ \t]*\$\$").unwrap());

/// Put every `$$` on a line of its own.
pub fn split_inline_display_math(text: &str) -> String {
    let text = text.replace(r"\$\$", "$$");
    let opened = DISPLAY_OPEN_RE.replace_all(&text, "$$$$\n${1}");
    DISPLAY_CLOSE_RE.replace_all(&opened, "${1}\n$$$$").into_owned()
}

pub fn replace_custom_arrow_tricks(text: &str) -> String {
    text.replace(r"\longleftarrow{\raise{.4pt}{\hspace{-5pt}\shortmid}}", r"\longmapsfrom ")
}

pub fn fix_align_environment(text: &str) -> String {
    text.replace(r"\begin{align}", r"\begin{aligned}").replace(r"\end{align}", r"\end{aligned}")
}

static BAD_BLOCK_POINTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*\\\^\{\}[^\n]*(?:\n|\z)").unwrap());

/// Drop lines that start with an escaped caret left over from block markers.
pub fn remove_bad_tex_block_pointers(text: &str) -> String {
    BAD_BLOCK_POINTER_RE.replace_all(text, "").into_owned()
}

static SECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\((?:sub)*)section(\s*\{)").unwrap());

/// Numbered sectioning commands become starred ones.
pub fn demote_headings(text: &str) -> String {
    SECTION_RE.replace_all(text, r"\${1}section*${2}").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(fix_choose, r"$n \choose k$", r"$\binom{n}{k}$")]
    #[case(replace_bbox, r"\bbox[5px]{x+y}", r"\boxed{x+y}")]
    #[case(fix_mathbb_k, r"\mathbb k[x]", r"\Bbbk[x]")]
    #[case(fix_smaller_than, r"a \< b \> c", "a < b > c")]
    #[case(fix_kern_syntax, r"\kern{.4pt} \raise {2 pt}", r"\kern .4pt \raise 2pt")]
    #[case(fix_align_environment, r"\begin{align}x\end{align}", r"\begin{aligned}x\end{aligned}")]
    #[case(demote_headings, r"\section{A} \subsubsection {B} \section*{C}", r"\section*{A} \subsubsection* {B} \section*{C}")]
    #[case(remove_bad_tex_block_pointers, "keep\n  \\^{}abc\nkeep\n", "keep\nkeep\n")]
    #[case(
        replace_custom_arrow_tricks,
        r"a \longleftarrow{\raise{.4pt}{\hspace{-5pt}\shortmid}} b",
        r"a \longmapsfrom  b"
    )]
    #[case(normalize_unicode, "a\u{00A0}b\u{200B}c\u{202F}d\u{FFFC}", "a bc d")]
    fn test_simple_stages(#[case] stage: fn(&str) -> String, #[case] input: &str, #[case] expected: &str) {
        assert_eq!(stage(input), expected);
    }

    #[test]
    fn test_insert_blank_blockquote_lines() {
        let input = "> one\n> two\n>\n> three\ntext\n";
        assert_eq!(insert_blank_blockquote_lines(input), "> one\n>\n> two\n>\n> three\ntext\n");
    }

    #[test]
    fn test_fix_callout_formulas() {
        let input = "> [!note] T\n> $$\n> x^2\n> $$\n> after\n";
        assert_eq!(fix_callout_formulas(input), "> [!note] T\n$$\nx^2\n$$\n> after\n");
    }

    #[test]
    fn test_preprocess_nested_blockquotes() {
        let input = ">> plain\n>> [!tip] Nested\n> one\n";
        assert_eq!(preprocess_nested_blockquotes(input), "> plain\n>> [!tip] Nested\n> one\n");
    }

    #[test]
    fn test_label_bubbles_out_of_nested_boxes() {
        let input = "\\end{tcolorbox}\\label{x}\\end{tcolorbox}\n\\end{tcolorbox}";
        let out = fix_tcolorbox_label_tcolorbox(input);
        assert_eq!(out, "\\end{tcolorbox}\n\\end{tcolorbox}\n\\end{tcolorbox}\n\\label{x}");
    }

    #[test]
    fn test_array_to_matrix() {
        let input = r"\left(\begin{array}{}1&2\end{array}\right) \left[\begin{array}1\end{array}\right] \begin{array}{cc}a&b\end{array} \begin{array}{}c\end{array}";
        let out = replace_array_with_matrix_environments(input);
        assert_eq!(
            out,
            r"\begin{pmatrix}1&2\end{pmatrix} \begin{bmatrix}1\end{bmatrix} \begin{array}{cc}a&b\end{array} \begin{matrix}c\end{matrix}"
        );
    }

    #[test]
    fn test_tagged_dollars() {
        let input = "$$ E = mc^2 \\tag{1.1} $$ and $$x$$";
        assert_eq!(
            replace_tagged_dollars(input),
            "\\begin{equation}\nE = mc^2\n\\tag{1.1}\n\\end{equation} and $$x$$"
        );
    }

    #[test]
    fn test_split_inline_display_math() {
        let input = "text $$x$$ more\n";
        let once = split_inline_display_math(input);
        assert_eq!(once, "text\n$$\nx\n$$\nmore\n");
        assert_eq!(split_inline_display_math(&once), once);
    }
}
