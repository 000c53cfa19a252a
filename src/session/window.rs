/*!
 * Windowed translation of a single chunk.
 *
 * `WindowSession` drives one chunk at a time through the portion protocol:
 * negotiate a portion count, request portions with the continuation token,
 * then validate the accumulated translation. Errors are recovered per class:
 * - protocol: re-prompt with a clarification, or restart after an
 *   implausible final length
 * - refusal: restart with a reframed preamble
 * - timeout and transient provider errors: retry the call with backoff
 *
 * A session is reused for consecutive chunks of one document so the tail of
 * each completed chunk carries over into the next one's context.
 */

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio_util::sync::CancellationToken;

use crate::app_config::SessionConfig;
use crate::chunking::{ReplaceStage, Replacer};
use crate::document::{Chunk, ChunkStatus, ChunkWarning, Document};
use crate::errors::TranslationError;
use crate::memory::{TranslationMemory, TranslationUnit};
use crate::providers::{ModelRequest, TranslationModel};
use crate::session::prompts::{
    CarryOver, PromptTemplate, REFRAME_NOTE, ReferenceContext, count_clarification, portion_clarification,
};
use crate::session::protocol::{check_length_ratio, parse_portion, parse_portion_count};
use crate::session::state::{ChunkPhase, RetryCounters, SessionState};
use crate::terms::{Observation, TermIndex};

/// Result of translating one chunk
#[derive(Debug, Clone)]
pub struct ChunkOutcome {
    /// The chunk, with its final status
    pub chunk: Chunk,

    /// Source text of the chunk as it appears in the document
    pub source: String,

    /// Frozen translation, present only when complete
    pub translation: Option<String>,

    /// Why the chunk did not complete
    pub error: Option<TranslationError>,

    /// Aliases that matched several terms while translating
    pub ambiguities: Vec<TranslationError>,

    pub declared_portions: Option<usize>,
    pub portions_received: usize,
    pub retries: RetryCounters,
}

impl ChunkOutcome {
    /// An outcome for a chunk that was never started.
    pub fn pending(chunk: &Chunk, source: &str, error: Option<TranslationError>) -> Self {
        let mut chunk = chunk.clone();
        chunk.status = ChunkStatus::Pending;
        Self {
            chunk,
            source: source.to_string(),
            translation: None,
            error,
            ambiguities: Vec::new(),
            declared_portions: None,
            portions_received: 0,
            retries: RetryCounters::default(),
        }
    }

    pub fn index(&self) -> usize {
        self.chunk.index
    }

    pub fn status(&self) -> ChunkStatus {
        self.chunk.status
    }

    pub fn is_complete(&self) -> bool {
        self.chunk.status == ChunkStatus::Complete
    }
}

/// Drives the portion protocol for consecutive chunks of one document.
#[derive(Debug)]
pub struct WindowSession {
    model: Arc<dyn TranslationModel>,
    terms: TermIndex,
    memory: TranslationMemory,
    config: SessionConfig,
    preamble: String,
    replacer: Replacer,
    carry_over: Option<CarryOver>,
}

impl WindowSession {
    /// Create a session. Language names are inserted into the preamble as given.
    pub fn new(
        model: Arc<dyn TranslationModel>,
        terms: TermIndex,
        memory: TranslationMemory,
        config: SessionConfig,
        source_language: &str,
        target_language: &str,
    ) -> Self {
        let preamble = PromptTemplate::new(&config.system_prompt).render(
            source_language,
            target_language,
            config.max_portions,
        );
        Self {
            model,
            terms,
            memory,
            config,
            preamble,
            replacer: Replacer::default(),
            carry_over: None,
        }
    }

    /// Apply these replacements to text sent to the model.
    pub fn with_replacer(mut self, replacer: Replacer) -> Self {
        self.replacer = replacer;
        self
    }

    pub fn with_carry_over(mut self, carry_over: Option<CarryOver>) -> Self {
        self.carry_over = carry_over;
        self
    }

    pub fn preamble(&self) -> &str {
        &self.preamble
    }

    /// Context carried from the last completed chunk.
    pub fn carry_over(&self) -> Option<&CarryOver> {
        self.carry_over.as_ref()
    }

    /// Translate one chunk. Never panics and never returns early with an
    /// error: every failure is recorded in the outcome.
    pub async fn translate_chunk(
        &mut self,
        document: &Document,
        chunk: &Chunk,
        cancel: &CancellationToken,
    ) -> ChunkOutcome {
        let source = document.slice(chunk);

        if cancel.is_cancelled() {
            return ChunkOutcome::pending(chunk, source, Some(TranslationError::Cancelled));
        }
        if chunk.is_oversized() {
            warn!(
                "Chunk {} of '{}' is oversized ({} chars), not sending it to the model",
                chunk.index,
                document.id(),
                chunk.size
            );
            let mut outcome = ChunkOutcome::pending(chunk, source, None);
            outcome.chunk.status = ChunkStatus::Failed;
            outcome.error = Some(structural_error(chunk));
            return outcome;
        }

        let submitted = self.replacer.apply(source, ReplaceStage::OnSubmit).into_owned();
        let mut state = SessionState::new(submitted);

        let observation = self.terms.observe(source);
        let ambiguities = ambiguity_errors(&observation);
        for ambiguity in &ambiguities {
            warn!("Chunk {}: {}", chunk.index, ambiguity);
        }

        let result = self.run(&mut state, chunk, cancel).await;

        let mut outcome = ChunkOutcome::pending(chunk, source, None);
        outcome.ambiguities = ambiguities;
        outcome.declared_portions = state.declared_portions();
        outcome.portions_received = state.portions_received();
        outcome.retries = state.retries;

        match result {
            Ok(translation) => {
                info!(
                    "Chunk {} of '{}' complete: {} portions, {} -> {} chars",
                    chunk.index,
                    document.id(),
                    state.portions_received(),
                    chunk.size,
                    translation.chars().count()
                );
                let unit = TranslationUnit::new(document.id(), chunk.index, source, translation.clone());
                if let Err(e) = self.memory.index(unit).await {
                    warn!("Failed to index chunk {} into translation memory: {}", chunk.index, e);
                }
                self.carry_over = Some(CarryOver::from_chunk(
                    source,
                    &translation,
                    observation.unresolved.clone(),
                    self.config.carry_over_chars,
                ));
                outcome.chunk.status = ChunkStatus::Complete;
                outcome.translation = Some(translation);
            }
            Err(TranslationError::Cancelled) => {
                info!("Chunk {} of '{}' cancelled", chunk.index, document.id());
                outcome.error = Some(TranslationError::Cancelled);
            }
            Err(e) => {
                state.fail();
                error!("Chunk {} of '{}' failed: {}", chunk.index, document.id(), e);
                outcome.chunk.status = ChunkStatus::Failed;
                outcome.error = Some(e);
            }
        }
        outcome
    }

    async fn run(
        &self,
        state: &mut SessionState,
        chunk: &Chunk,
        cancel: &CancellationToken,
    ) -> Result<String, TranslationError> {
        let source_chars = state.source_text().chars().count();
        let mut shortfall: Option<usize> = None;

        state.begin_negotiation()?;
        debug!("Chunk {}: negotiating portion count", chunk.index);

        loop {
            if cancel.is_cancelled() {
                return Err(TranslationError::Cancelled);
            }

            match state.phase() {
                ChunkPhase::Negotiating => {
                    let reply = self.call(state, cancel).await?;
                    match parse_portion_count(&reply, self.config.max_portions) {
                        Ok(count) => {
                            debug!("Chunk {}: model declared {} portions", chunk.index, count);
                            state.accept_count(&reply, count)?;
                        }
                        Err(e) => self.recover(state, Some(&reply), e, chunk)?,
                    }
                }
                ChunkPhase::Translating => {
                    let reply = self.call(state, cancel).await?;
                    match parse_portion(&reply) {
                        Ok(portion) => {
                            shortfall = portion.remaining;
                            state.accept_portion(&reply, portion.text)?;
                            debug!(
                                "Chunk {}: portion {}/{}",
                                chunk.index,
                                state.portions_received(),
                                state.declared_portions().unwrap_or_default()
                            );
                        }
                        Err(e) => self.recover(state, Some(&reply), e, chunk)?,
                    }
                }
                ChunkPhase::Validating => {
                    if let Some(extra) = shortfall.take().filter(|n| *n > 0) {
                        match state.extend(extra, self.config.max_portions) {
                            Ok(declared) => {
                                debug!("Chunk {}: model needs {} more portions, now {}", chunk.index, extra, declared);
                            }
                            Err(e) => self.recover(state, None, e, chunk)?,
                        }
                        continue;
                    }

                    let translated_chars = state.accumulated().chars().count();
                    match check_length_ratio(
                        source_chars,
                        translated_chars,
                        self.config.min_length_ratio,
                        self.config.max_length_ratio,
                    ) {
                        Ok(ratio) => {
                            debug!("Chunk {}: length ratio {:.2}", chunk.index, ratio);
                            return state.complete();
                        }
                        Err(e) => self.recover(state, None, e, chunk)?,
                    }
                }
                phase => {
                    return Err(TranslationError::InvalidState(format!(
                        "Session loop reached phase {}",
                        phase
                    )));
                }
            }
        }
    }

    /// Spend one retry on a recoverable reply error, or give up.
    fn recover(
        &self,
        state: &mut SessionState,
        reply: Option<&str>,
        error: TranslationError,
        chunk: &Chunk,
    ) -> Result<(), TranslationError> {
        match error {
            TranslationError::Protocol(message) => {
                state.retries.protocol += 1;
                if state.retries.protocol > self.config.max_protocol_retries {
                    return Err(TranslationError::Protocol(message));
                }
                warn!(
                    "Chunk {}: {} (retry {}/{})",
                    chunk.index, message, state.retries.protocol, self.config.max_protocol_retries
                );
                match (state.phase(), reply) {
                    (ChunkPhase::Negotiating, Some(reply)) => {
                        state.clarify(reply, count_clarification(self.config.max_portions))
                    }
                    (ChunkPhase::Translating, Some(reply)) => {
                        let next = state.portions_received() + 1;
                        let declared = state.declared_portions().unwrap_or(next);
                        state.clarify(reply, portion_clarification(next, declared))
                    }
                    _ => {
                        state.restart();
                        Ok(())
                    }
                }
            }
            TranslationError::Refusal(text) => {
                state.retries.refusal += 1;
                if state.retries.refusal > self.config.max_refusal_reframes {
                    return Err(TranslationError::Refusal(text));
                }
                warn!(
                    "Chunk {}: model refused, reframing (attempt {}/{})",
                    chunk.index, state.retries.refusal, self.config.max_refusal_reframes
                );
                state.reframed = true;
                state.restart();
                Ok(())
            }
            other => Err(other),
        }
    }

    /// One model call for the current state, retried on timeouts and
    /// transient provider errors.
    async fn call(&self, state: &mut SessionState, cancel: &CancellationToken) -> Result<String, TranslationError> {
        let request = self.request_for(state).await;
        let mut attempt: u32 = 0;

        loop {
            match self.call_once(&request, cancel).await {
                Ok(reply) => return Ok(reply),
                Err(e) if is_retryable(&e) => {
                    attempt += 1;
                    if attempt > self.config.max_timeout_retries {
                        error!("Model call failed after {} attempts: {}", attempt, e);
                        return Err(e);
                    }
                    state.retries.timeout += 1;
                    let backoff_ms = self.config.retry_backoff_ms * (1u64 << (attempt - 1).min(16));
                    warn!(
                        "Model call failed: {} - attempt {}/{}, retrying in {}ms",
                        e,
                        attempt,
                        self.config.max_timeout_retries + 1,
                        backoff_ms
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(TranslationError::Cancelled),
                        _ = tokio::time::sleep(Duration::from_millis(backoff_ms)) => {}
                    }
                }
                Err(e) => {
                    if let TranslationError::Provider(provider_error) = &e {
                        error!("Model call failed with {}: {}", self.model.name(), provider_error);
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn call_once(&self, request: &ModelRequest, cancel: &CancellationToken) -> Result<String, TranslationError> {
        let deadline = Duration::from_secs(self.config.call_timeout_secs);
        tokio::select! {
            _ = cancel.cancelled() => Err(TranslationError::Cancelled),
            result = tokio::time::timeout(deadline, self.model.complete(request)) => match result {
                Ok(Ok(reply)) => Ok(reply),
                Ok(Err(e)) => Err(TranslationError::Provider(e)),
                Err(_) => Err(TranslationError::Timeout(deadline)),
            },
        }
    }

    /// Build the request for the next call: preamble, reference context for
    /// the part of the chunk not yet translated, and the conversation so far.
    async fn request_for(&self, state: &SessionState) -> ModelRequest {
        let remaining = remaining_text(state.source_text(), state.portions_received(), state.declared_portions());
        let lookup = self.terms.lookup(remaining);

        let neighbours = if self.config.memory_neighbours == 0 {
            Vec::new()
        } else {
            self.memory
                .query_nearest(remaining, self.config.memory_neighbours)
                .await
                .unwrap_or_else(|e| {
                    warn!("Translation memory query failed: {}", e);
                    Vec::new()
                })
        };

        let context = ReferenceContext {
            terms: lookup.terms().into_iter().cloned().collect(),
            ambiguous: lookup.ambiguous,
            neighbours,
            carry_over: self.carry_over.clone(),
        };

        let mut preamble = self.preamble.clone();
        if state.reframed {
            preamble.push_str("\n\n");
            preamble.push_str(REFRAME_NOTE);
        }
        ModelRequest::new(preamble)
            .with_context(context.render())
            .with_turns(state.turns().to_vec())
    }
}

fn is_retryable(error: &TranslationError) -> bool {
    match error {
        TranslationError::Timeout(_) => true,
        TranslationError::Provider(e) => e.is_transient(),
        _ => false,
    }
}

fn structural_error(chunk: &Chunk) -> TranslationError {
    let max_size = chunk
        .warnings
        .iter()
        .find_map(|w| match w {
            ChunkWarning::Oversized { max_size, .. } => Some(*max_size),
            _ => None,
        })
        .unwrap_or(chunk.size);
    TranslationError::Structural {
        size: chunk.size,
        max_size,
    }
}

fn ambiguity_errors(observation: &Observation) -> Vec<TranslationError> {
    observation
        .ambiguous
        .iter()
        .map(|(alias, candidates)| TranslationError::AmbiguousTerm {
            alias: alias.clone(),
            candidates: candidates.iter().map(|t| t.canonical.clone()).collect(),
        })
        .collect()
}

/// Estimate the untranslated part of `source` from portion progress.
///
/// The cut is proportional to `received / declared` and moved back to the
/// start of the word it lands in, when a word boundary is close by.
pub fn remaining_text(source: &str, received: usize, declared: Option<usize>) -> &str {
    let declared = match declared {
        Some(declared) if declared > 0 && received > 0 => declared,
        _ => return source,
    };
    let total = source.chars().count();
    let skip = total * received.min(declared) / declared;
    let offset = match source.char_indices().nth(skip) {
        Some((offset, _)) => offset,
        None => return "",
    };

    let mut window_start = offset.saturating_sub(64);
    while !source.is_char_boundary(window_start) {
        window_start -= 1;
    }
    let snapped = source[window_start..offset]
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map(|(i, c)| window_start + i + c.len_utf8())
        .unwrap_or(offset);
    &source[snapped..]
}
