/*!
 * # chunkwise - windowed translation of long documents
 *
 * A Rust library that translates documents too long for a single model
 * call by splitting them into chunks and translating each chunk over a
 * negotiated number of portions.
 *
 * ## Features
 *
 * - Recursive division on configurable delimiter classes, with undersized
 *   chunks merged back
 * - Count-first portion protocol with a continuation token, shortfall
 *   recovery and a final length plausibility check
 * - Consistent names across chunks: partial references resolve to one term
 * - Translation memory injected as reference context
 * - Per-class retries for malformed replies, refusals and timeouts
 * - Cancellation that keeps everything already completed
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `document`: Documents, boundaries and chunks
 * - `chunking`: Division, assembly and text replacements
 * - `terms`: Name extraction, alias resolution and glossaries
 * - `memory`: Similarity-indexed translation memory
 * - `session`: The per-chunk protocol:
 *   - `session::protocol`: Reply parsing and validation
 *   - `session::state`: Explicit per-chunk state machine
 *   - `session::prompts`: Preamble and reference context
 *   - `session::window`: The session driver
 * - `pipeline`: Whole-document orchestration
 * - `providers`: Model and embedding clients:
 *   - `providers::ollama`: Ollama API client
 *   - `providers::mock`: Scripted model for tests
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the library
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod chunking;
pub mod document;
pub mod errors;
pub mod language_utils;
pub mod memory;
pub mod pipeline;
pub mod providers;
pub mod session;
pub mod terms;

// Re-export main types for easier usage
pub use app_config::Config;
pub use document::{Chunk, ChunkStatus, Document};
pub use errors::{AppError, ProviderError, TranslationError};
pub use language_utils::{get_language_name, language_codes_match, normalize_to_part2t};
pub use memory::{TranslationMemory, TranslationUnit};
pub use pipeline::{Pipeline, TranslatedDocument};
pub use session::{ChunkOutcome, WindowSession};
pub use terms::{Resolution, Term, TermIndex};
