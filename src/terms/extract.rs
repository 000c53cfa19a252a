/*!
 * Candidate name extraction.
 *
 * Runs of adjacent capitalised words become name candidates. A run may start
 * with an honorific ("Mr. Smith"), and common capitalised words such as
 * sentence starters and pronouns break runs instead of joining them.
 */

use std::collections::{BTreeSet, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

static WORD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\p{Lu}[\p{L}\p{M}'’-]*").expect("capitalised word pattern is valid")
});

/// Configuration for name extraction.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Capitalised words that are never part of a name
    pub exclude_words: HashSet<String>,

    /// Titles that may precede a name, without trailing period
    pub honorifics: Vec<String>,

    /// Shortest word, in characters, accepted as a name part
    pub min_word_chars: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        let exclude_words = [
            "I", "The", "A", "An", "This", "That", "These", "Those", "It", "He", "She", "They",
            "We", "You", "My", "Your", "His", "Her", "Our", "Their", "What", "Who", "Where",
            "When", "Why", "How", "Yes", "No", "Oh", "Ah", "Hey", "Well", "Now", "Then", "Here",
            "There", "Please", "Thank", "Thanks", "Sorry", "Hello", "Hi", "Goodbye", "Bye", "OK",
            "Okay", "And", "But", "Or", "So", "If", "As", "At", "In", "On", "Of", "To", "For",
            "With", "From", "By", "After", "Before", "Just", "Really", "Actually", "Maybe",
            "Perhaps", "Finally", "Suddenly", "Still", "Even", "Only", "Not", "All", "Some",
            "Every", "Once", "Chapter",
        ]
        .iter()
        .map(|w| w.to_string())
        .collect();

        let honorifics = ["Mr", "Mrs", "Ms", "Miss", "Dr", "Sir", "Lady", "Lord", "Madam"]
            .iter()
            .map(|w| w.to_string())
            .collect();

        Self {
            exclude_words,
            honorifics,
            min_word_chars: 2,
        }
    }
}

impl ExtractionConfig {
    /// Add a word to the exclusion list.
    pub fn exclude(mut self, word: &str) -> Self {
        self.exclude_words.insert(word.to_string());
        self
    }

    /// Add an honorific.
    pub fn with_honorific(mut self, honorific: &str) -> Self {
        self.honorifics.push(honorific.trim_end_matches('.').to_string());
        self
    }
}

/// A name-like run of words found in text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameCandidate {
    /// Text exactly as it appears
    pub surface: String,

    /// Leading honorific, without trailing period
    pub honorific: Option<String>,

    /// Name parts after the honorific
    pub parts: Vec<String>,

    /// Byte offset of the surface in the scanned text
    pub start: usize,
}

impl NameCandidate {
    /// Two or more name parts: a full reference that can define a term.
    pub fn is_full_reference(&self) -> bool {
        self.parts.len() >= 2
    }

    /// Name parts joined without the honorific.
    pub fn name(&self) -> String {
        self.parts.join(" ")
    }
}

struct Run {
    start: usize,
    end: usize,
    honorific: Option<String>,
    parts: Vec<String>,
}

/// Extracts name candidates from text.
#[derive(Debug, Clone, Default)]
pub struct TermExtractor {
    config: ExtractionConfig,
}

impl TermExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Candidate surfaces found in `text`.
    pub fn extract(&self, text: &str) -> BTreeSet<String> {
        self.candidates(text).into_iter().map(|c| c.surface).collect()
    }

    /// Candidates with their structure, in text order.
    pub fn candidates(&self, text: &str) -> Vec<NameCandidate> {
        let mut candidates = Vec::new();
        let mut run: Option<Run> = None;

        for m in WORD_PATTERN.find_iter(text) {
            let word = m.as_str().trim_end_matches(['-', '\'', '’']);
            let end = m.start() + word.len();

            let continues = run.as_ref().is_some_and(|r| {
                let gap = &text[r.end..m.start()];
                let gap = if r.parts.is_empty() && r.honorific.is_some() {
                    gap.strip_prefix('.').unwrap_or(gap)
                } else {
                    gap
                };
                !gap.is_empty() && gap.chars().all(|c| c == ' ' || c == '\t')
            });
            if !continues {
                self.flush(text, run.take(), &mut candidates);
            }

            if self.is_honorific(word) {
                self.flush(text, run.take(), &mut candidates);
                run = Some(Run {
                    start: m.start(),
                    end,
                    honorific: Some(word.to_string()),
                    parts: Vec::new(),
                });
            } else if self.is_excluded(word) {
                self.flush(text, run.take(), &mut candidates);
            } else {
                match run.as_mut() {
                    Some(r) => {
                        r.parts.push(word.to_string());
                        r.end = end;
                    }
                    None => {
                        run = Some(Run {
                            start: m.start(),
                            end,
                            honorific: None,
                            parts: vec![word.to_string()],
                        })
                    }
                }
            }
        }
        self.flush(text, run, &mut candidates);
        candidates
    }

    /// Split a canonical name into its honorific and parts.
    pub fn split_name(&self, name: &str) -> (Option<String>, Vec<String>) {
        let candidates = self.candidates(name);
        if let [only] = candidates.as_slice() {
            if only.surface == name.trim() {
                return (only.honorific.clone(), only.parts.clone());
            }
        }
        // Scripts without letter case: whitespace-separated parts
        let parts = name.split_whitespace().map(str::to_string).collect();
        (None, parts)
    }

    pub fn is_honorific(&self, word: &str) -> bool {
        let word = word.trim_end_matches('.');
        self.config.honorifics.iter().any(|h| h == word)
    }

    fn is_excluded(&self, word: &str) -> bool {
        word.chars().count() < self.config.min_word_chars || self.config.exclude_words.contains(word)
    }

    fn flush(&self, text: &str, run: Option<Run>, out: &mut Vec<NameCandidate>) {
        let Some(run) = run else {
            return;
        };
        if run.parts.is_empty() {
            return;
        }
        out.push(NameCandidate {
            surface: text[run.start..run.end].to_string(),
            honorific: run.honorific,
            parts: run.parts,
            start: run.start,
        });
    }
}
