/*!
 * Per-chunk session state.
 *
 * `SessionState` is owned by one `WindowSession` run for one chunk. Every
 * transition is a method that checks the current phase, so an out-of-order
 * step is an error instead of silently corrupt state.
 */

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::TranslationError;
use crate::providers::Turn;
use crate::session::protocol::{CONTINUATION_TOKEN, join_portions};

/// Phase of a chunk's exchange with the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkPhase {
    NotStarted,
    Negotiating,
    Translating,
    Validating,
    Complete,
    Failed,
}

impl ChunkPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, ChunkPhase::Complete | ChunkPhase::Failed)
    }
}

impl fmt::Display for ChunkPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChunkPhase::NotStarted => "not_started",
            ChunkPhase::Negotiating => "negotiating",
            ChunkPhase::Translating => "translating",
            ChunkPhase::Validating => "validating",
            ChunkPhase::Complete => "complete",
            ChunkPhase::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Retry counters, one budget per error class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryCounters {
    pub protocol: u32,
    pub refusal: u32,
    pub timeout: u32,
}

/// Working state of one chunk's translation
#[derive(Debug, Clone)]
pub struct SessionState {
    phase: ChunkPhase,
    source_text: String,
    declared_portions: Option<usize>,
    portions_received: usize,
    portions: Vec<String>,
    last_response: Option<String>,
    turns: Vec<Turn>,
    pub retries: RetryCounters,
    /// The request has been reframed after a refusal
    pub reframed: bool,
}

impl SessionState {
    /// Fresh state for a chunk. The chunk text is the opening user turn.
    pub fn new(source_text: impl Into<String>) -> Self {
        let source_text = source_text.into();
        Self {
            phase: ChunkPhase::NotStarted,
            turns: vec![Turn::user(source_text.clone())],
            source_text,
            declared_portions: None,
            portions_received: 0,
            portions: Vec::new(),
            last_response: None,
            retries: RetryCounters::default(),
            reframed: false,
        }
    }

    pub fn phase(&self) -> ChunkPhase {
        self.phase
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn declared_portions(&self) -> Option<usize> {
        self.declared_portions
    }

    pub fn portions_received(&self) -> usize {
        self.portions_received
    }

    pub fn last_response(&self) -> Option<&str> {
        self.last_response.as_deref()
    }

    /// Conversation so far, ready to send.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Translation accumulated so far.
    pub fn accumulated(&self) -> String {
        join_portions(&self.portions)
    }

    /// Fraction of declared portions received, 0.0 before negotiation.
    pub fn progress(&self) -> f64 {
        match self.declared_portions {
            Some(declared) if declared > 0 => {
                (self.portions_received as f64 / declared as f64).min(1.0)
            }
            _ => 0.0,
        }
    }

    pub fn begin_negotiation(&mut self) -> Result<(), TranslationError> {
        self.expect(ChunkPhase::NotStarted, "begin negotiation")?;
        self.phase = ChunkPhase::Negotiating;
        Ok(())
    }

    /// Record the declared portion count and ask for the first portion.
    pub fn accept_count(&mut self, reply: &str, count: usize) -> Result<(), TranslationError> {
        self.expect(ChunkPhase::Negotiating, "accept portion count")?;
        self.declared_portions = Some(count);
        self.portions_received = 0;
        self.portions.clear();
        self.record_reply(reply);
        self.turns.push(Turn::user(CONTINUATION_TOKEN));
        self.phase = ChunkPhase::Translating;
        Ok(())
    }

    /// Append a portion. Moves to `Validating` once all declared portions arrived.
    pub fn accept_portion(&mut self, reply: &str, text: String) -> Result<(), TranslationError> {
        self.expect(ChunkPhase::Translating, "accept portion")?;
        self.portions.push(text);
        self.portions_received += 1;
        self.record_reply(reply);

        if Some(self.portions_received) >= self.declared_portions {
            self.phase = ChunkPhase::Validating;
        } else {
            self.turns.push(Turn::user(CONTINUATION_TOKEN));
        }
        Ok(())
    }

    /// The model asked for `extra` more portions; continue translating.
    /// Returns the new declared count, bounded by `max_portions`.
    pub fn extend(&mut self, extra: usize, max_portions: usize) -> Result<usize, TranslationError> {
        self.expect(ChunkPhase::Validating, "extend portions")?;
        let declared = self.declared_portions.unwrap_or(self.portions_received);
        let extended = declared.saturating_add(extra).min(max_portions);
        if extended <= self.portions_received {
            return Err(TranslationError::Protocol(format!(
                "Model asked for {} more portions beyond the maximum of {}",
                extra, max_portions
            )));
        }
        self.declared_portions = Some(extended);
        self.turns.push(Turn::user(CONTINUATION_TOKEN));
        self.phase = ChunkPhase::Translating;
        Ok(extended)
    }

    /// Freeze the translation. Never completes with portions missing.
    pub fn complete(&mut self) -> Result<String, TranslationError> {
        self.expect(ChunkPhase::Validating, "complete")?;
        let declared = self.declared_portions.unwrap_or(usize::MAX);
        if self.portions_received < declared {
            return Err(TranslationError::InvalidState(format!(
                "Cannot complete with {} of {} portions",
                self.portions_received, declared
            )));
        }
        self.phase = ChunkPhase::Complete;
        Ok(self.accumulated())
    }

    /// A reply could not be used; keep it in the transcript and ask again.
    pub fn clarify(&mut self, bad_reply: &str, clarification: String) -> Result<(), TranslationError> {
        if self.phase.is_terminal() || self.phase == ChunkPhase::NotStarted {
            return Err(TranslationError::InvalidState(format!(
                "Cannot clarify in phase {}",
                self.phase
            )));
        }
        self.record_reply(bad_reply);
        self.turns.push(Turn::user(clarification));
        Ok(())
    }

    /// Discard every reply and negotiate again from the chunk text.
    /// Retry counters and the reframing flag are kept.
    pub fn restart(&mut self) {
        self.turns.truncate(1);
        self.declared_portions = None;
        self.portions_received = 0;
        self.portions.clear();
        self.last_response = None;
        self.phase = ChunkPhase::Negotiating;
    }

    pub fn fail(&mut self) {
        self.phase = ChunkPhase::Failed;
    }

    fn record_reply(&mut self, reply: &str) {
        self.last_response = Some(reply.to_string());
        self.turns.push(Turn::model(reply));
    }

    fn expect(&self, phase: ChunkPhase, action: &str) -> Result<(), TranslationError> {
        if self.phase != phase {
            return Err(TranslationError::InvalidState(format!(
                "Cannot {} in phase {} (expected {})",
                action, self.phase, phase
            )));
        }
        Ok(())
    }
}
