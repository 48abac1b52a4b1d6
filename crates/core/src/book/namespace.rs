//! Per-note label namespaces for book assembly.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::index::NoteId;
use crate::vault::hash_str;

const SLUG_LIMIT: usize = 40;

static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(label|ref|pageref|eqref|autoref|nameref)\{([^{}]*)\}").unwrap()
});

static HYPERREF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\hyperref\[([^\]]*)\]").unwrap());

/// Code environments whose contents are printed as written.
static VERBATIM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?s)\\begin\{verbatim\}.*?\\end\{verbatim\}",
        r"|\\begin\{verbatim\*\}.*?\\end\{verbatim\*\}",
        r"|\\begin\{lstlisting\}.*?\\end\{lstlisting\}",
        r"|\\begin\{minted\}.*?\\end\{minted\}",
    ))
    .unwrap()
});

/// `ns-<slug>-<hash8>`: readable, and unique even when slugs collide.
pub fn namespace_for(id: &NoteId) -> String {
    let mut slug = String::new();
    for c in id.as_str().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug: String = slug.trim_end_matches('-').chars().take(SLUG_LIMIT).collect();
    let hash = hash_str(id.as_str());
    format!("ns-{slug}-{}", &hash[..8])
}

fn is_qualified(label: &str) -> bool {
    label.starts_with("ns-") && label.contains(':')
}

fn qualify(label: &str, namespace: &str) -> String {
    if label.is_empty() || is_qualified(label) {
        label.to_string()
    } else {
        format!("{namespace}:{label}")
    }
}

/// Prefix every unqualified label and reference target in a chapter with
/// its namespace. Targets already qualified (links into other chapters)
/// are left alone, and so is the content of verbatim code environments.
pub fn qualify_labels(fragment: &str, namespace: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut last = 0;
    for code in VERBATIM_RE.find_iter(fragment) {
        out.push_str(&qualify_segment(&fragment[last..code.start()], namespace));
        out.push_str(code.as_str());
        last = code.end();
    }
    out.push_str(&qualify_segment(&fragment[last..], namespace));
    out
}

fn qualify_segment(text: &str, namespace: &str) -> String {
    let labelled = LABEL_RE.replace_all(text, |caps: &Captures<'_>| {
        format!("\\{}{{{}}}", &caps[1], qualify(&caps[2], namespace))
    });
    HYPERREF_RE
        .replace_all(&labelled, |caps: &Captures<'_>| {
            format!("\\hyperref[{}]", qualify(&caps[1], namespace))
        })
        .into_owned()
}
