/*!
 * Chunk assembly.
 *
 * Boundaries become candidate spans. An undersized span is merged with its
 * successor first and the result re-checked. When that merge would exceed
 * the maximum size the predecessor takes it instead, if it has room.
 * Spans that still violate the size bounds are kept and carry a warning.
 */

use std::collections::VecDeque;

use log::{debug, warn};

use crate::document::{Boundary, Chunk, ChunkWarning, Document};

#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    end: usize,
    size: usize,
}

impl Span {
    fn merge(self, next: Span) -> Span {
        Span {
            start: self.start,
            end: next.end,
            size: self.size + next.size,
        }
    }
}

/// Builds chunks from divider output.
#[derive(Debug, Clone, Copy)]
pub struct ChunkAssembler {
    min_size: usize,
    max_size: usize,
}

impl ChunkAssembler {
    pub fn new(min_size: usize, max_size: usize) -> Self {
        Self { min_size, max_size }
    }

    pub fn min_size(&self) -> usize {
        self.min_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Assemble chunks that partition `document` in source order.
    pub fn assemble(&self, document: &Document, boundaries: &[Boundary]) -> Vec<Chunk> {
        let text = document.text();
        if text.is_empty() {
            return Vec::new();
        }

        let mut queue: VecDeque<Span> = self.candidate_spans(text, boundaries).into();
        let mut accepted: Vec<Span> = Vec::with_capacity(queue.len());

        while let Some(current) = queue.pop_front() {
            if current.size >= self.min_size {
                accepted.push(current);
                continue;
            }

            let next_fits = queue
                .front()
                .is_some_and(|next| current.size + next.size <= self.max_size);
            let previous_fits = accepted
                .last()
                .is_some_and(|prev| prev.size + current.size <= self.max_size);

            // Successor first; the predecessor only when the successor cannot take it
            if next_fits {
                if let Some(next) = queue.pop_front() {
                    // Re-check the merged span; it may still be undersized
                    queue.push_front(current.merge(next));
                }
            } else if previous_fits {
                if let Some(prev) = accepted.pop() {
                    accepted.push(prev.merge(current));
                }
            } else {
                accepted.push(current);
            }
        }

        let single = accepted.len() == 1;
        let chunks: Vec<Chunk> = accepted
            .into_iter()
            .enumerate()
            .map(|(index, span)| {
                let mut chunk = Chunk::new(index, span.start, span.end, span.size);
                if span.size > self.max_size {
                    warn!(
                        "Chunk {} of document {} exceeds max length ({} > {})",
                        index,
                        document.id(),
                        span.size,
                        self.max_size
                    );
                    chunk.warnings.push(ChunkWarning::Oversized {
                        size: span.size,
                        max_size: self.max_size,
                    });
                } else if span.size < self.min_size && !single {
                    chunk.warnings.push(ChunkWarning::Undersized {
                        size: span.size,
                        min_size: self.min_size,
                    });
                }
                chunk
            })
            .collect();

        debug!(
            "Assembled {} chunks for document {} ({} chars)",
            chunks.len(),
            document.id(),
            document.char_len()
        );
        chunks
    }

    fn candidate_spans(&self, text: &str, boundaries: &[Boundary]) -> Vec<Span> {
        let mut cuts: Vec<usize> = boundaries
            .iter()
            .map(|b| b.offset)
            .filter(|&offset| offset > 0 && offset < text.len() && text.is_char_boundary(offset))
            .collect();
        cuts.sort_unstable();
        cuts.dedup();
        cuts.push(text.len());

        let mut spans = Vec::with_capacity(cuts.len());
        let mut start = 0;
        for end in cuts {
            spans.push(Span {
                start,
                end,
                size: text[start..end].chars().count(),
            });
            start = end;
        }
        spans
    }
}
