/*!
 * Document chunking.
 *
 * Splitting happens in two steps:
 * - `divider`: recursive cut placement using an ordered list of delimiter classes
 * - `assembler`: turns cuts into chunks and merges undersized fragments back
 *
 * `replace` holds the configurable text substitutions applied when a
 * document is loaded, when a chunk is submitted, or when output is exported.
 */

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

pub mod assembler;
pub mod divider;
pub mod replace;

pub use assembler::ChunkAssembler;
pub use divider::{Divider, divide};
pub use replace::{ReplacePattern, ReplaceStage, Replacer};

/// Which side of a cut the matched delimiter text belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    /// Delimiter ends the left span (cut after the match)
    #[default]
    Trailing,
    /// Delimiter starts the right span (cut before the match)
    Leading,
}

/// A named delimiter pattern. Classes are tried in priority order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelimiterClass {
    /// Human-readable name
    pub name: String,

    /// Regex source
    pub pattern: String,

    /// Where the matched text goes
    #[serde(default)]
    pub placement: Placement,
}

impl DelimiterClass {
    pub fn new(name: &str, pattern: &str, placement: Placement) -> Self {
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
            placement,
        }
    }

    /// Compile the pattern, reporting the class name on failure.
    pub fn compile(&self) -> Result<Regex, AppError> {
        Regex::new(&self.pattern).map_err(|e| {
            AppError::Config(format!("Invalid delimiter pattern '{}': {}", self.name, e))
        })
    }

    /// Paragraph breaks.
    pub fn blank_line() -> Self {
        Self::new("blank-line", r"\n[ \t]*\n\s*", Placement::Trailing)
    }

    /// Manuscript scene header starting with a maru.
    pub fn scene_marker() -> Self {
        Self::new("scene-marker", r"(?m)^〇", Placement::Leading)
    }

    /// Manuscript subscene break (`× × ×` on its own line).
    pub fn subscene_break() -> Self {
        Self::new(
            "subscene-break",
            r"(?m)^[ \t]*×\s+×\s+×[ \t]*(?:\n|$)",
            Placement::Trailing,
        )
    }

    /// End of sentence for Latin and CJK punctuation.
    pub fn sentence_end() -> Self {
        Self::new(
            "sentence-end",
            r#"(?:[.!?…]+["'”’)]*\s+|[。！？]+[」』）]*\s*)"#,
            Placement::Trailing,
        )
    }

    /// Single line breaks.
    pub fn line_break() -> Self {
        Self::new("line-break", r"\n", Placement::Trailing)
    }

    /// Default classes, primary first.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::blank_line(),
            Self::scene_marker(),
            Self::subscene_break(),
            Self::sentence_end(),
            Self::line_break(),
        ]
    }
}
