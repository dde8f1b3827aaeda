use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Maximum edit distance for a roster name to be considered a match
const MAX_EDIT_DISTANCE: usize = 2;

/// Word-boundary tokens; words of 2 characters or fewer are never corrected
static WORD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\w+\b").expect("word pattern is valid"));

/// Known character and player names for a session.
///
/// Read-only after load; shared by the name normalizer, the repair trigger,
/// and prompt construction. The roster is optional everywhere it is used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roster {
    /// Canonical character name -> free-form description
    #[serde(default)]
    pub characters: BTreeMap<String, String>,
    /// Player names at the table
    #[serde(default)]
    pub players: Vec<String>,
}

impl Roster {
    /// Load a roster from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read roster file: {:?}", path))?;
        serde_json::from_str(&content).context("Failed to parse roster JSON")
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty() && self.players.is_empty()
    }

    /// All roster names, characters first, in deterministic order
    pub fn all_names(&self) -> impl Iterator<Item = &str> {
        self.characters
            .keys()
            .map(String::as_str)
            .chain(self.players.iter().map(String::as_str))
    }

    /// Find the canonical roster name closest to `word`.
    ///
    /// An exact case-insensitive match wins immediately. Otherwise the name
    /// with the smallest edit distance is returned when that distance is at
    /// most 2; ties go to the first name seen in roster order.
    pub fn closest_match(&self, word: &str) -> Option<&str> {
        let needle = word.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        for name in self.all_names() {
            if needle == name.to_lowercase() {
                return Some(name);
            }
        }

        let mut best: Option<(&str, usize)> = None;
        for name in self.all_names() {
            let distance = strsim::levenshtein(&needle, &name.to_lowercase());
            if distance <= MAX_EDIT_DISTANCE && best.is_none_or(|(_, d)| distance < d) {
                best = Some((name, distance));
            }
        }

        best.map(|(name, _)| name)
    }

    /// Correct misspelled roster names in transcribed text.
    ///
    /// Tokens longer than 2 characters are matched against the roster; a
    /// close match is substituted with a case-insensitive word-boundary
    /// replacement so partial words are never corrupted. Pure and
    /// deterministic; unchanged text means no token was close enough.
    pub fn correct_names(&self, text: &str) -> String {
        if self.is_empty() {
            return text.to_string();
        }

        let mut corrected = text.to_string();

        for token in WORD_PATTERN.find_iter(text) {
            let word = token.as_str();
            if word.len() <= 2 {
                continue;
            }

            let Some(canonical) = self.closest_match(word) else {
                continue;
            };

            // Case-only differences are already correct spellings
            if canonical == word || canonical.to_lowercase() == word.to_lowercase() {
                continue;
            }

            let pattern = format!(r"\b{}\b", regex::escape(word));
            let Ok(re) = RegexBuilder::new(&pattern).case_insensitive(true).build() else {
                continue;
            };
            corrected = re.replace_all(&corrected, canonical).into_owned();
        }

        corrected
    }

    /// Compact roster summary for correction prompts
    pub fn prompt_hint(&self) -> String {
        let characters: Vec<&str> = self.characters.keys().map(String::as_str).collect();
        let players: Vec<&str> = self.players.iter().map(String::as_str).collect();

        let mut hint = String::new();
        if !characters.is_empty() {
            hint.push_str(&format!("Characters: {}\n", characters.join(", ")));
        }
        if !players.is_empty() {
            hint.push_str(&format!("Players: {}\n", players.join(", ")));
        }
        hint
    }
}
