//! Leveled word and character inventories.
//!
//! The catalog is static, read-only data loaded once at startup from the
//! `word.csv` / `char.csv` files (columns `level,word` and
//! `level,character`, with the level column in `HSK{n}` label form). All
//! lookups are pure; only [`VocabularyCatalog::words_for_conversation`]
//! draws random samples.

use crate::error::TutorError;
use crate::level::Level;
use anyhow::{Context, Result};
use rand::seq::IndexedRandom;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, serde::Deserialize)]
struct WordRow {
    level: String,
    word: String,
}

#[derive(Debug, serde::Deserialize)]
struct CharRow {
    level: String,
    character: String,
}

/// The static leveled inventory of words and characters.
#[derive(Debug, Default, Clone)]
pub struct VocabularyCatalog {
    words: HashMap<Level, Vec<String>>,
    chars: HashMap<Level, Vec<String>>,
}

impl VocabularyCatalog {
    /// Builds a catalog from in-memory entries. Mostly useful in tests and
    /// for embedding small fixture inventories.
    pub fn from_entries(
        words: impl IntoIterator<Item = (Level, String)>,
        chars: impl IntoIterator<Item = (Level, String)>,
    ) -> Self {
        let mut catalog = Self::default();
        for (level, word) in words {
            catalog.words.entry(level).or_default().push(word);
        }
        for (level, character) in chars {
            catalog.chars.entry(level).or_default().push(character);
        }
        catalog
    }

    /// Loads `word.csv` and `char.csv` from a directory.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut catalog = Self::default();

        let word_path = dir.join("word.csv");
        let mut reader = csv::Reader::from_path(&word_path)
            .with_context(|| format!("opening {}", word_path.display()))?;
        for row in reader.deserialize() {
            let row: WordRow = row.context("reading word.csv row")?;
            let level = Level::from_label(&row.level)
                .with_context(|| format!("unknown level label `{}` in word.csv", row.level))?;
            catalog.words.entry(level).or_default().push(row.word);
        }

        let char_path = dir.join("char.csv");
        let mut reader = csv::Reader::from_path(&char_path)
            .with_context(|| format!("opening {}", char_path.display()))?;
        for row in reader.deserialize() {
            let row: CharRow = row.context("reading char.csv row")?;
            let level = Level::from_label(&row.level)
                .with_context(|| format!("unknown level label `{}` in char.csv", row.level))?;
            catalog.chars.entry(level).or_default().push(row.character);
        }

        Ok(catalog)
    }

    /// All words stored at exactly this level.
    pub fn words_for_level(&self, level: Level) -> &[String] {
        self.words.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All characters stored at exactly this level.
    pub fn chars_for_level(&self, level: Level) -> &[String] {
        self.chars.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Samples up to `count` words for a practice session, uniformly and
    /// without replacement.
    ///
    /// If the level's own pool has fewer than `count` words and the level is
    /// above the minimum, the next lower level's words are unioned in before
    /// sampling. The fallback broadens downward only, keeping material
    /// at-or-below the learner's level. No ordering is guaranteed across
    /// calls.
    pub fn words_for_conversation(
        &self,
        level: Level,
        count: usize,
    ) -> Result<Vec<String>, TutorError> {
        let mut pool: Vec<String> = self.words_for_level(level).to_vec();
        if pool.len() < count {
            if let Some(lower) = level.lower() {
                pool.extend(self.words_for_level(lower).iter().cloned());
            }
        }
        if pool.is_empty() {
            return Err(TutorError::EmptyVocabulary { level });
        }
        let mut rng = rand::rng();
        Ok(pool.choose_multiple(&mut rng, count).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(n: u8) -> Level {
        Level::new(n).unwrap()
    }

    fn fixture() -> VocabularyCatalog {
        let words = [
            (1, "你好"),
            (1, "谢谢"),
            (1, "再见"),
            (2, "时间"),
            (2, "运动"),
            (3, "打算"),
        ]
        .into_iter()
        .map(|(n, w)| (level(n), w.to_string()));
        let chars = [(1, "我"), (1, "你"), (2, "别")]
            .into_iter()
            .map(|(n, c)| (level(n), c.to_string()));
        VocabularyCatalog::from_entries(words, chars)
    }

    #[test]
    fn lookups_never_leak_across_levels() {
        let catalog = fixture();
        for l in Level::all() {
            let expected: Vec<&str> = match l.get() {
                1 => vec!["你好", "谢谢", "再见"],
                2 => vec!["时间", "运动"],
                3 => vec!["打算"],
                _ => vec![],
            };
            assert_eq!(catalog.words_for_level(l), expected.as_slice());
        }
        assert_eq!(catalog.chars_for_level(level(2)), ["别"]);
    }

    #[test]
    fn sampling_caps_at_count() {
        let catalog = fixture();
        let sample = catalog.words_for_conversation(level(1), 2).unwrap();
        assert_eq!(sample.len(), 2);
        for word in &sample {
            assert!(catalog.words_for_level(level(1)).contains(word));
        }
    }

    #[test]
    fn short_pools_broaden_downward_only() {
        let catalog = fixture();
        // Level 3 has a single word; the level 2 pool is unioned in.
        let sample = catalog.words_for_conversation(level(3), 3).unwrap();
        assert_eq!(sample.len(), 3);
        let band: Vec<&String> = catalog
            .words_for_level(level(3))
            .iter()
            .chain(catalog.words_for_level(level(2)))
            .collect();
        for word in &sample {
            assert!(band.contains(&word), "{word} escaped the level band");
        }
        // Nothing from level 1 may appear: the fallback goes one step down.
        for word in &sample {
            assert!(!catalog.words_for_level(level(1)).contains(word));
        }
    }

    #[test]
    fn exhausted_band_is_an_error() {
        let catalog = fixture();
        let err = catalog.words_for_conversation(level(5), 5).unwrap_err();
        assert!(matches!(err, TutorError::EmptyVocabulary { level } if level.get() == 5));
    }

    #[test]
    fn minimum_level_has_no_fallback() {
        let catalog = VocabularyCatalog::from_entries(
            [(level(1), "你好".to_string())],
            std::iter::empty(),
        );
        let sample = catalog.words_for_conversation(level(1), 5).unwrap();
        assert_eq!(sample, ["你好"]);
    }

    #[test]
    fn adjacent_lower_pool_prevents_errors_above_minimum() {
        let catalog = fixture();
        // Level 4 is empty but level 3 is not.
        let sample = catalog.words_for_conversation(level(4), 5).unwrap();
        assert_eq!(sample, ["打算"]);
    }
}
