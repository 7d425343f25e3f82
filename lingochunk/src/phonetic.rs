//! Word-by-word phonetic approximation.
//!
//! Naive: input is lower-cased and split on whitespace, each
//! word is looked up verbatim, and unknown words pass through unchanged.
//! Punctuation stays glued to its word, so `"hello,"` is not matched.

use std::collections::HashMap;
use std::path::Path;

use tracing::info;

use crate::error::Result;

const BUILTIN: &[(&str, &str)] = &[
    ("how", "हाउ"),
    ("are", "आर"),
    ("you", "यू"),
    ("what", "व्हाट"),
    ("doing", "डूइंग"),
    ("hello", "हेलो"),
    ("is", "इज़"),
    ("it", "इट"),
    ("going", "गोइंग"),
    ("good", "गुड"),
    ("morning", "मॉर्निंग"),
    ("to", "टू"),
    ("see", "सी"),
    ("thank", "थैंक"),
    ("very", "वेरी"),
];

/// Lookup table from lower-case English word to its phonetic spelling.
#[derive(Debug, Clone)]
pub struct PronunciationTable {
    words: HashMap<String, String>,
}

impl Default for PronunciationTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PronunciationTable {
    /// English to Devanagari table for Hindi speakers.
    pub fn builtin() -> Self {
        Self::from_pairs(BUILTIN.iter().map(|(w, p)| (w.to_string(), p.to_string())))
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let words = pairs
            .into_iter()
            .map(|(word, spelling)| (word.to_lowercase(), spelling))
            .collect();
        Self { words }
    }

    /// Load a JSON object of `word -> spelling`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let pairs: HashMap<String, String> = serde_json::from_str(&raw)?;
        info!(path = %path.display(), words = pairs.len(), "loaded pronunciation table");
        Ok(Self::from_pairs(pairs))
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Approximate pronunciation of `sentence`. Never fails.
    pub fn phoneticize(&self, sentence: &str) -> String {
        sentence
            .to_lowercase()
            .split_whitespace()
            .map(|word| self.words.get(word).map(String::as_str).unwrap_or(word))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// [`PronunciationTable::phoneticize`] with the built-in table.
pub fn phoneticize(sentence: &str) -> String {
    PronunciationTable::builtin().phoneticize(sentence)
}
