/*!
 * Term consistency.
 *
 * - `extract`: finds candidate names and terms in chunk text
 * - `index`: canonical term records, alias resolution and agreed renderings
 * - `glossary`: seeding the index from a JSON terms file
 *
 * A lone given name seen in one chunk and the full name seen in another must
 * end up pointing at the same `Term`, so every chunk renders it the same way.
 */

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

pub mod extract;
pub mod glossary;
pub mod index;

pub use extract::{ExtractionConfig, NameCandidate, TermExtractor};
pub use glossary::{GlossaryEntry, load_glossary, save_glossary};
pub use index::TermIndex;

/// Stable identifier of a term within one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TermId(pub usize);

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// A canonical entity with its known aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub id: TermId,

    /// Full canonical name
    pub canonical: String,

    /// Every surface form known to refer to this term; only grows
    pub aliases: BTreeSet<String>,

    /// Agreed target-language rendering, set once
    #[serde(default)]
    pub rendering: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}

/// Outcome of resolving an alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(Term),
    /// More than one term shares the alias; never auto-picked
    Ambiguous(Vec<Term>),
    Unresolved,
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }

    pub fn term(&self) -> Option<&Term> {
        match self {
            Resolution::Resolved(term) => Some(term),
            _ => None,
        }
    }
}

/// Result of recording a rendering for a term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderingEvent {
    Added {
        canonical: String,
        rendering: String,
    },
    /// Same rendering again
    Unchanged,
    /// A different rendering was proposed; the existing one is kept
    Conflict {
        canonical: String,
        existing: String,
        proposed: String,
    },
}

/// Everything the term index learned from one piece of text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observation {
    /// Aliases in the text that resolve to exactly one term
    pub resolved: Vec<(String, Term)>,

    /// Aliases in the text shared by several terms
    pub ambiguous: Vec<(String, Vec<Term>)>,

    /// Aliases with no matching term yet
    pub unresolved: Vec<String>,

    /// Aliases from earlier text that resolve now
    pub newly_resolved: Vec<(String, Term)>,

    /// Terms registered from full references in the text
    pub registered: Vec<TermId>,
}

impl Observation {
    /// Distinct terms referenced by the text, in first-seen order.
    pub fn terms(&self) -> Vec<&Term> {
        let mut seen = BTreeSet::new();
        self.resolved
            .iter()
            .chain(self.newly_resolved.iter())
            .map(|(_, term)| term)
            .filter(|term| seen.insert(term.id))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
            && self.ambiguous.is_empty()
            && self.unresolved.is_empty()
            && self.newly_resolved.is_empty()
    }
}
