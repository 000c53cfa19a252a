/*!
 * Per-chunk translation sessions.
 *
 * This module provides:
 * - `protocol`: parsing and validation of every model reply
 * - `state`: the explicit per-chunk state machine
 * - `prompts`: preamble, clarifications and reference context rendering
 * - `window`: the session driver tying model, term index and memory together
 */

pub mod prompts;
pub mod protocol;
pub mod state;
pub mod window;

// Re-export main types
pub use prompts::{CarryOver, PromptTemplate, ReferenceContext};
pub use protocol::{CONTINUATION_TOKEN, Portion};
pub use state::{ChunkPhase, RetryCounters, SessionState};
pub use window::{ChunkOutcome, WindowSession};
