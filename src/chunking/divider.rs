/*!
 * Recursive document divider.
 *
 * The primary delimiter class is applied across the whole text. Any
 * resulting span larger than the maximum size is divided again with the
 * next class, only within that span, until it fits or the classes run out.
 * A span that still does not fit is left whole; the assembler flags it.
 */

use log::debug;
use regex::Regex;

use crate::chunking::{DelimiterClass, Placement};
use crate::document::Boundary;
use crate::errors::AppError;

struct CompiledClass {
    name: String,
    regex: Regex,
    placement: Placement,
}

impl CompiledClass {
    /// Cut offsets relative to `span`, strictly inside it, ascending.
    fn cuts(&self, span: &str) -> Vec<usize> {
        let mut cuts: Vec<usize> = self
            .regex
            .find_iter(span)
            .map(|m| match self.placement {
                Placement::Trailing => m.end(),
                Placement::Leading => m.start(),
            })
            .filter(|&offset| offset > 0 && offset < span.len())
            .collect();
        cuts.dedup();
        cuts
    }
}

/// Pre-compiled divider over an ordered list of delimiter classes.
pub struct Divider {
    classes: Vec<CompiledClass>,
}

impl Divider {
    /// Compile the given classes. Order is priority: index 0 is primary.
    pub fn new(classes: &[DelimiterClass]) -> Result<Self, AppError> {
        let classes = classes
            .iter()
            .map(|class| {
                Ok(CompiledClass {
                    name: class.name.clone(),
                    regex: class.compile()?,
                    placement: class.placement,
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;
        Ok(Self { classes })
    }

    /// Number of configured classes, which bounds the recursion depth.
    pub fn depth_limit(&self) -> usize {
        self.classes.len()
    }

    /// Divide `text` into boundaries. Returned offsets are interior
    /// (never 0 or `text.len()`), ascending and unique.
    pub fn divide(&self, text: &str, max_size: usize) -> Vec<Boundary> {
        let mut boundaries = Vec::new();
        if text.is_empty() || self.classes.is_empty() {
            return boundaries;
        }

        self.divide_span(text, 0, text.len(), 0, max_size, &mut boundaries);
        boundaries.sort_by_key(|b| b.offset);
        boundaries.dedup_by_key(|b| b.offset);

        debug!(
            "Divided {} bytes into {} boundaries using {} classes",
            text.len(),
            boundaries.len(),
            self.classes.len()
        );
        boundaries
    }

    fn divide_span(
        &self,
        text: &str,
        start: usize,
        end: usize,
        class_index: usize,
        max_size: usize,
        out: &mut Vec<Boundary>,
    ) {
        let Some(class) = self.classes.get(class_index) else {
            return;
        };

        let cuts = class.cuts(&text[start..end]);
        let mut piece_start = start;
        for cut in cuts.into_iter().map(|c| start + c).chain(std::iter::once(end)) {
            let piece_size = text[piece_start..cut].chars().count();
            if piece_size > max_size {
                self.divide_span(text, piece_start, cut, class_index + 1, max_size, out);
            }
            if cut != end {
                out.push(Boundary {
                    offset: cut,
                    class_index,
                    class_name: class.name.clone(),
                });
            }
            piece_start = cut;
        }
    }
}

/// Convenience wrapper compiling the classes for a single call.
pub fn divide(
    text: &str,
    classes: &[DelimiterClass],
    max_size: usize,
) -> Result<Vec<Boundary>, AppError> {
    Ok(Divider::new(classes)?.divide(text, max_size))
}
