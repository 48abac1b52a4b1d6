use mdpress_core::index::{IndexBuilder, NoteId, VaultIndex};
use mdpress_core::resolve::{
    ResolveError, ResolvedAnchor, ResolvedTarget, Resolver, Token, WarningKind, parse_references,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn vault(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (path, content) in files {
        let full = dir.path().join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }
    dir
}

fn build(root: &Path, excluded: &[&str]) -> VaultIndex {
    let excluded: Vec<String> = excluded.iter().map(|s| s.to_string()).collect();
    IndexBuilder::new(root, &excluded).build().unwrap()
}

fn id(s: &str) -> NoteId {
    NoteId::normalize(s)
}

fn first_reference(text: &str) -> mdpress_core::resolve::Reference {
    parse_references(text)
        .into_iter()
        .find_map(|t| match t {
            Token::Note(r) => Some(r),
            Token::Asset(_) => None,
        })
        .expect("a note reference")
}

#[test]
fn link_to_excluded_note_degrades_to_warning() {
    let dir = vault(&[("A.md", "See [[B#Intro]] for details.\n"), ("B.md", "# Intro\nHello\n")]);
    let index = build(dir.path(), &["B.md"]);
    assert!(index.get(&id("b")).is_none());

    let resolver = Resolver::new(&index, 5);
    let expansion = resolver.expand_note(index.get(&id("a")).unwrap());

    assert_eq!(expansion.warnings.len(), 1);
    assert_eq!(expansion.warnings[0].kind, WarningKind::UnresolvedReference);
    assert_eq!(expansion.warnings[0].line, Some(1));
    assert!(expansion.text.contains("<broken:B#Intro>"), "{}", expansion.text);
    assert!(expansion.text.ends_with("for details.\n"));
}

#[test]
fn link_with_anchor_resolves_when_target_present() {
    let dir = vault(&[("A.md", "See [[B#Intro|the intro]].\n"), ("B.md", "# Intro\nHello\n")]);
    let index = build(dir.path(), &[]);
    let a = id("a");

    let reference = first_reference("See [[B#Intro|the intro]].");
    let resolver = Resolver::new(&index, 5);
    match resolver.resolve(&reference, &a, std::slice::from_ref(&a)).unwrap() {
        ResolvedTarget::Link { note, anchor } => {
            assert_eq!(note, id("b"));
            assert_eq!(anchor, Some(ResolvedAnchor::Heading("intro".into())));
            assert!(index.get(&note).unwrap().heading("intro").is_some());
        }
        other => panic!("expected a link, got {other:?}"),
    }

    let expansion = resolver.expand_note(index.get(&a).unwrap());
    assert!(expansion.warnings.is_empty());
    assert!(expansion.text.contains("[the intro](<xref:b#h:intro>)"), "{}", expansion.text);
}

#[test]
fn alias_never_takes_part_in_matching() {
    let dir = vault(&[("A.md", "[[B|Intro]] and [[B#Missing|Intro]]\n"), ("B.md", "# Intro\n")]);
    let index = build(dir.path(), &[]);
    let expansion = Resolver::new(&index, 5).expand_note(index.get(&id("a")).unwrap());

    assert!(expansion.text.contains("[Intro](<xref:b>)"), "{}", expansion.text);
    assert_eq!(expansion.warnings.len(), 1);
    assert!(expansion.warnings[0].message.contains("Missing"));
}

#[test]
fn block_anchor_link() {
    let dir = vault(&[
        ("A.md", "Per [[B#^claim]].\n"),
        ("B.md", "Intro text.\n\nThe claim holds. ^claim\n"),
    ]);
    let index = build(dir.path(), &[]);
    let expansion = Resolver::new(&index, 5).expand_note(index.get(&id("a")).unwrap());

    assert!(expansion.warnings.is_empty(), "{:?}", expansion.warnings);
    assert!(expansion.text.contains("<xref:b#b:claim>"), "{}", expansion.text);
}

#[test]
fn embedded_section_stops_at_next_sibling_heading() {
    let dir = vault(&[
        ("A.md", "![[B#Intro]]\n"),
        ("B.md", "# Intro\nkept\n## Detail\nalso kept\n# Next\ndropped\n"),
    ]);
    let index = build(dir.path(), &[]);
    let expansion = Resolver::new(&index, 5).expand_note(index.get(&id("a")).unwrap());

    assert!(expansion.text.contains("[!embed]"));
    assert!(expansion.text.contains("kept"));
    assert!(expansion.text.contains("also kept"));
    assert!(!expansion.text.contains("dropped"));
}

#[test]
fn mutual_embeds_are_reported_as_cycles() {
    let dir = vault(&[("A.md", "Before\n\n![[B]]\n\nAfter\n"), ("B.md", "B text\n\n![[A]]\n")]);
    let index = build(dir.path(), &[]);
    let resolver = Resolver::new(&index, 5);

    for name in ["a", "b"] {
        let expansion = resolver.expand_note(index.get(&id(name)).unwrap());
        let cycles: Vec<_> = expansion
            .warnings
            .iter()
            .filter(|w| w.kind == WarningKind::CyclicTransclusion)
            .collect();
        assert_eq!(cycles.len(), 1, "{name}: {:?}", expansion.warnings);
        assert!(expansion.text.contains("<broken:"), "{}", expansion.text);
    }

    let a_text = resolver.expand_note(index.get(&id("a")).unwrap()).text;
    assert!(a_text.contains("Before"));
    assert!(a_text.contains("After"));
}

#[test]
fn resolving_an_embed_already_on_the_path_fails() {
    let dir = vault(&[("A.md", "![[B]]\n"), ("B.md", "![[A]]\n")]);
    let index = build(dir.path(), &[]);
    let resolver = Resolver::new(&index, 5);

    let reference = first_reference("![[A]]");
    let visiting = [id("a"), id("b")];
    match resolver.resolve(&reference, &id("b"), &visiting) {
        Err(ResolveError::Cyclic { chain }) => assert_eq!(chain, vec![id("a"), id("b"), id("a")]),
        other => panic!("expected a cycle, got {other:?}"),
    }
}

#[test]
fn self_embed_is_a_cycle() {
    let dir = vault(&[("A.md", "# Top\n![[A]]\n")]);
    let index = build(dir.path(), &[]);
    let expansion = Resolver::new(&index, 5).expand_note(index.get(&id("a")).unwrap());
    assert_eq!(expansion.warnings.len(), 1);
    assert_eq!(expansion.warnings[0].kind, WarningKind::CyclicTransclusion);
}

#[test]
fn chains_within_the_depth_limit_expand_fully() {
    let dir = vault(&[
        ("n1.md", "one\n\n![[n2]]\n"),
        ("n2.md", "two\n\n![[n3]]\n"),
        ("n3.md", "three\n"),
    ]);
    let index = build(dir.path(), &[]);
    let expansion = Resolver::new(&index, 5).expand_note(index.get(&id("n1")).unwrap());

    assert!(expansion.warnings.is_empty(), "{:?}", expansion.warnings);
    assert!(expansion.text.contains("three"));
    assert_eq!(expansion.resolved.len(), 2);
}

#[test]
fn long_chains_stop_at_the_depth_limit() {
    let files: Vec<(String, String)> = (1..=10)
        .map(|i| (format!("n{i}.md"), format!("level {i}\n\n![[n{}]]\n", i + 1)))
        .collect();
    let files: Vec<(&str, &str)> = files.iter().map(|(p, c)| (p.as_str(), c.as_str())).collect();
    let dir = vault(&files);
    let index = build(dir.path(), &[]);

    let expansion = Resolver::new(&index, 3).expand_note(index.get(&id("n1")).unwrap());
    assert_eq!(expansion.warnings.len(), 1, "{:?}", expansion.warnings);
    assert!(expansion.warnings[0].message.contains("depth limit"));
    assert!(!expansion.text.contains("level 6"));
}

#[test]
fn lookup_is_case_insensitive_and_prefers_nearby_notes() {
    let dir = vault(&[
        ("topics/A.md", "[[intro]] and [[TOPICS/INTRO]]\n"),
        ("topics/Intro.md", "# Here\n"),
        ("other/deep/Intro.md", "# There\n"),
    ]);
    let index = build(dir.path(), &[]);
    let expansion = Resolver::new(&index, 5).expand_note(index.get(&id("topics/a")).unwrap());

    assert!(expansion.warnings.is_empty(), "{:?}", expansion.warnings);
    assert_eq!(expansion.text.matches("<xref:topics/intro>").count(), 2, "{}", expansion.text);
}
