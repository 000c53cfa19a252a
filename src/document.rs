/*!
 * Document model for windowed translation.
 *
 * A `Document` is immutable once loaded. Dividing it yields `Boundary`
 * offsets; assembling yields `Chunk` spans that partition the text in
 * source order. Offsets are byte offsets into the document text, sizes are
 * counted in characters.
 */

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A source document awaiting translation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    id: String,
    text: String,
}

impl Document {
    /// Create a document with a caller-chosen identifier.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }

    /// Create a document with a freshly generated identifier.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(Uuid::new_v4().to_string(), text)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length of the document in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Slice of the document text covered by a chunk.
    pub fn slice(&self, chunk: &Chunk) -> &str {
        &self.text[chunk.start..chunk.end]
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// A cut position produced by the divider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boundary {
    /// Byte offset into the document text
    pub offset: usize,

    /// Index of the delimiter class in the configured list
    pub class_index: usize,

    /// Name of the delimiter class that produced this cut
    pub class_name: String,
}

impl Boundary {
    /// Recursion depth at which the cut was made. Depth 0 is the primary class.
    pub fn depth(&self) -> usize {
        self.class_index
    }

    pub fn is_primary(&self) -> bool {
        self.class_index == 0
    }
}

/// Translation status of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkStatus {
    #[default]
    Pending,
    InProgress,
    Complete,
    Failed,
}

/// Problems noticed while assembling a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkWarning {
    /// No delimiter class could bring the span under the maximum size
    Oversized { size: usize, max_size: usize },
    /// The span stayed under the minimum size because no neighbour could absorb it
    Undersized { size: usize, min_size: usize },
}

impl std::fmt::Display for ChunkWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkWarning::Oversized { size, max_size } => {
                write!(f, "Max length ({}) exceeded: {} chars", max_size, size)
            }
            ChunkWarning::Undersized { size, min_size } => {
                write!(f, "Below min length ({}): {} chars", min_size, size)
            }
        }
    }
}

/// A contiguous span of a document translated as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position of the chunk in the document
    pub index: usize,

    /// Byte offset where the span starts (inclusive)
    pub start: usize,

    /// Byte offset where the span ends (exclusive)
    pub end: usize,

    /// Size of the span in characters
    pub size: usize,

    /// Translation status; the only mutable part of a chunk
    #[serde(default)]
    pub status: ChunkStatus,

    /// Structural warnings raised during assembly
    #[serde(default)]
    pub warnings: Vec<ChunkWarning>,
}

impl Chunk {
    pub fn new(index: usize, start: usize, end: usize, size: usize) -> Self {
        Self {
            index,
            start,
            end,
            size,
            status: ChunkStatus::Pending,
            warnings: Vec::new(),
        }
    }

    pub fn is_oversized(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, ChunkWarning::Oversized { .. }))
    }

    pub fn byte_len(&self) -> usize {
        self.end - self.start
    }
}
