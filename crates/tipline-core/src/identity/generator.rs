//! Random codenames and journalist-facing designations.

use rand::seq::IndexedRandom;

use crate::config::IdentitySection;
use crate::error::{Result, TiplineError};

use super::codename::{sanitize, Codename, MAX_CODENAME_LEN};
use super::wordlist::WordListSource;

/// Draws codenames and designations from a [`WordListSource`].
///
/// Every call is an independent draw; there is no shared cursor.
pub struct CodenameGenerator<W> {
    words: W,
    words_in_codename: usize,
    default_locale: String,
}

impl<W: WordListSource> CodenameGenerator<W> {
    pub fn new(words: W, words_in_codename: usize, default_locale: impl Into<String>) -> Self {
        Self {
            words,
            words_in_codename,
            default_locale: default_locale.into(),
        }
    }

    pub fn from_config(words: W, section: &IdentitySection) -> Self {
        Self::new(words, section.words_in_codename, section.default_locale.clone())
    }

    pub fn word_lists(&self) -> &W {
        &self.words
    }

    /// Words for `locale`, falling back to the default locale when it is unknown.
    pub fn wordlist(&self, locale: Option<&str>) -> Result<&[String]> {
        locale
            .and_then(|l| self.words.words_for_locale(l))
            .or_else(|| self.words.words_for_locale(&self.default_locale))
            .ok_or_else(|| {
                TiplineError::Config(format!(
                    "No word list for default locale '{}'",
                    self.default_locale
                ))
            })
    }

    /// Draw a fresh codename: distinct words joined by single spaces.
    pub fn generate_codename(&self, locale: Option<&str>) -> Result<Codename> {
        let words = self.wordlist(locale)?;
        if words.len() < self.words_in_codename {
            return Err(TiplineError::Config(format!(
                "Word list has {} words, need at least {}",
                words.len(),
                self.words_in_codename
            )));
        }

        let mut rng = rand::rng();
        let chosen: Vec<&str> = words
            .choose_multiple(&mut rng, self.words_in_codename)
            .map(String::as_str)
            .collect();
        let codename = Codename::new(chosen.join(" "));

        // A codename we can't hash later is useless to the source.
        if codename.expose().chars().count() > MAX_CODENAME_LEN {
            return Err(TiplineError::Config(
                "Word list produces codenames longer than the maximum".to_string(),
            ));
        }
        sanitize(codename.expose()).map_err(|_| {
            TiplineError::Config("Word list contains unsupported characters".to_string())
        })?;

        Ok(codename)
    }

    /// Draw "adjective noun", independent of any codename.
    pub fn generate_designation(&self) -> Result<String> {
        let mut rng = rand::rng();
        let adjective = self
            .words
            .adjectives()
            .choose(&mut rng)
            .ok_or_else(|| TiplineError::Config("Adjective list is empty".to_string()))?;
        let noun = self
            .words
            .nouns()
            .choose(&mut rng)
            .ok_or_else(|| TiplineError::Config("Noun list is empty".to_string()))?;
        Ok(format!("{} {}", adjective, noun))
    }
}

/// Filename-safe form of a designation: lowercase, spaces to underscores,
/// anything outside `[a-z0-9-_]` dropped.
pub fn designation_filename(designation: &str) -> String {
    designation
        .to_lowercase()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-' || *c == '_')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::wordlist::StaticWordLists;
    use std::collections::HashSet;

    fn lists() -> StaticWordLists {
        let en: Vec<String> = (0..50).map(|i| format!("word{}", i)).collect();
        let fr: Vec<String> = (0..50).map(|i| format!("mot{}", i)).collect();
        StaticWordLists::new()
            .with_locale("en", en)
            .with_locale("fr", fr)
            .with_adjectives(["brave", "quiet", "amber"])
            .with_nouns(["otter", "lantern", "harbor"])
    }

    #[test]
    fn test_codename_has_configured_word_count() {
        let generator = CodenameGenerator::new(lists(), 7, "en");
        let codename = generator.generate_codename(Some("en")).unwrap();
        let words = codename.words();

        assert_eq!(words.len(), 7);
        let unique: HashSet<_> = words.iter().collect();
        assert_eq!(unique.len(), 7, "words drawn without replacement");

        let en = generator.wordlist(Some("en")).unwrap();
        for word in words {
            assert!(en.iter().any(|w| w == word));
        }
    }

    #[test]
    fn test_codename_uses_requested_locale() {
        let generator = CodenameGenerator::new(lists(), 7, "en");
        let codename = generator.generate_codename(Some("fr")).unwrap();
        assert!(codename.words().iter().all(|w| w.starts_with("mot")));
        assert_eq!(sanitize(codename.expose()).unwrap(), codename.expose());
    }

    #[test]
    fn test_unknown_locale_falls_back_to_default() {
        let generator = CodenameGenerator::new(lists(), 7, "en");
        assert_eq!(
            generator.wordlist(Some("unknown")).unwrap(),
            generator.wordlist(Some("en")).unwrap()
        );
        let codename = generator.generate_codename(Some("unknown")).unwrap();
        assert!(codename.words().iter().all(|w| w.starts_with("word")));
    }

    #[test]
    fn test_codenames_are_independent_draws() {
        let generator = CodenameGenerator::new(lists(), 7, "en");
        let a = generator.generate_codename(None).unwrap();
        let b = generator.generate_codename(None).unwrap();
        // 50 choose 7 ordered draws; a repeat would point at shared state.
        assert_ne!(a.expose(), b.expose());
    }

    #[test]
    fn test_short_word_list_rejected() {
        let small = StaticWordLists::new().with_locale("en", ["a", "b", "c"]);
        let generator = CodenameGenerator::new(small, 7, "en");
        assert!(matches!(
            generator.generate_codename(None),
            Err(TiplineError::Config(_))
        ));
    }

    #[test]
    fn test_missing_default_locale_is_config_error() {
        let generator = CodenameGenerator::new(StaticWordLists::new(), 7, "en");
        assert!(matches!(
            generator.generate_codename(Some("de")),
            Err(TiplineError::Config(_))
        ));
    }

    #[test]
    fn test_designation_is_adjective_then_noun() {
        let generator = CodenameGenerator::new(lists(), 7, "en");
        let designation = generator.generate_designation().unwrap();
        let parts: Vec<&str> = designation.split(' ').collect();

        assert_eq!(parts.len(), 2);
        assert!(["brave", "quiet", "amber"].contains(&parts[0]));
        assert!(["otter", "lantern", "harbor"].contains(&parts[1]));
    }

    #[test]
    fn test_designation_filename() {
        assert_eq!(designation_filename("Brave Otter"), "brave_otter");
        assert_eq!(designation_filename("half-baked Ré.sumé"), "half-baked_rsum");
    }
}
