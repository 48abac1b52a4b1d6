//! Heading slugs.

use std::collections::HashMap;

/// Lowercase, strip punctuation, join whitespace-separated words with `-`.
pub fn slugify(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '_')
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Hands out unique slugs within one note: repeats get `-1`, `-2`, ...
#[derive(Debug, Default)]
pub struct Slugger {
    seen: HashMap<String, usize>,
}

impl Slugger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `slug` as taken without handing it out.
    pub fn reserve(&mut self, slug: &str) {
        self.seen.entry(slug.to_string()).or_insert(0);
    }

    pub fn slug(&mut self, text: &str) -> String {
        let base = slugify(text);
        let Some(mut count) = self.seen.get(&base).copied() else {
            self.seen.insert(base.clone(), 0);
            return base;
        };
        loop {
            count += 1;
            let candidate = format!("{base}-{count}");
            if !self.seen.contains_key(&candidate) {
                self.seen.insert(base, count);
                self.seen.insert(candidate.clone(), 0);
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Intro", "intro")]
    #[case("Hello, World!", "hello-world")]
    #[case("  Spaced   out  ", "spaced-out")]
    #[case("Über Größe", "über-größe")]
    #[case("1.2 Results (draft)", "12-results-draft")]
    fn test_slugify(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(slugify(input), expected);
    }

    #[test]
    fn test_slugger_suffixes_duplicates() {
        let mut slugger = Slugger::new();
        assert_eq!(slugger.slug("Intro"), "intro");
        assert_eq!(slugger.slug("Intro"), "intro-1");
        assert_eq!(slugger.slug("intro!"), "intro-2");
        assert_eq!(slugger.slug("Other"), "other");
    }

    #[test]
    fn test_slugger_avoids_literal_suffix_collision() {
        let mut slugger = Slugger::new();
        assert_eq!(slugger.slug("A 1"), "a-1");
        assert_eq!(slugger.slug("A"), "a");
        // "a-1" is taken by the literal heading above
        assert_eq!(slugger.slug("A"), "a-2");
    }

    #[test]
    fn test_reserved_slugs_are_not_handed_out() {
        let mut slugger = Slugger::new();
        slugger.reserve("intro");
        assert_eq!(slugger.slug("Intro"), "intro-1");
        assert_eq!(slugger.slug("Other"), "other");
    }
}
