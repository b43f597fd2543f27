//! Word-list collaborator.
//!
//! Loading lists from disk belongs to the embedding application; this crate only
//! needs lookups by locale plus the adjective/noun pools for designations.

use std::collections::HashMap;

/// Lookup interface over the word lists an application ships.
pub trait WordListSource: Send + Sync {
    /// Ordered words for `locale`, or `None` if the locale is unknown.
    fn words_for_locale(&self, locale: &str) -> Option<&[String]>;

    fn adjectives(&self) -> &[String];

    fn nouns(&self) -> &[String];
}

/// In-memory word lists.
#[derive(Debug, Clone, Default)]
pub struct StaticWordLists {
    locales: HashMap<String, Vec<String>>,
    adjectives: Vec<String>,
    nouns: Vec<String>,
}

impl StaticWordLists {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_locale<I, S>(mut self, locale: &str, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.locales.insert(locale.to_string(), clean_words(words));
        self
    }

    pub fn with_adjectives<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.adjectives = clean_words(words);
        self
    }

    pub fn with_nouns<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nouns = clean_words(words);
        self
    }

    /// Parse a newline separated list file's contents.
    pub fn parse_lines(contents: &str) -> Vec<String> {
        clean_words(contents.lines())
    }
}

impl WordListSource for StaticWordLists {
    fn words_for_locale(&self, locale: &str) -> Option<&[String]> {
        self.locales.get(locale).map(Vec::as_slice)
    }

    fn adjectives(&self) -> &[String] {
        &self.adjectives
    }

    fn nouns(&self) -> &[String] {
        &self.nouns
    }
}

/// Trim entries and drop empty ones.
fn clean_words<I, S>(words: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    words
        .into_iter()
        .map(|w| {
            let w: String = w.into();
            w.trim().to_string()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lines_drops_empty_entries() {
        let words = StaticWordLists::parse_lines("alpha\n\n  bravo \r\n\ncharlie\n");
        assert_eq!(words, vec!["alpha", "bravo", "charlie"]);
        assert!(!words.contains(&String::new()));
    }

    #[test]
    fn test_unknown_locale_is_none() {
        let lists = StaticWordLists::new().with_locale("en", ["one", "two"]);
        assert_eq!(lists.words_for_locale("en").map(|w| w.len()), Some(2));
        assert!(lists.words_for_locale("xx").is_none());
    }
}
