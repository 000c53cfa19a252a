/*!
 * Model and embedding provider interfaces.
 *
 * The orchestrator only sees two narrow capabilities:
 * - `TranslationModel`: one multi-turn completion returning raw reply text
 * - `Embedder`: text to vector, used by the translation memory
 *
 * Implementations:
 * - `ollama`: local Ollama server (chat and embeddings endpoints)
 * - `mock`: scripted replies for tests
 */

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;

pub mod mock;
pub mod ollama;

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One explicit turn of the per-chunk conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            content: content.into(),
        }
    }
}

/// A complete request to a translation model.
///
/// Conversation state is carried explicitly in `turns`; providers must not
/// rely on any hidden server-side history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelRequest {
    /// Instruction preamble (system prompt)
    pub preamble: String,

    /// Reference material for disambiguation, if any
    pub context: Option<String>,

    /// Conversation so far; the last turn is the one to answer
    pub turns: Vec<Turn>,
}

impl ModelRequest {
    pub fn new(preamble: impl Into<String>) -> Self {
        Self {
            preamble: preamble.into(),
            context: None,
            turns: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn with_turns(mut self, turns: Vec<Turn>) -> Self {
        self.turns = turns;
        self
    }

    /// Content of the final user turn, if any.
    pub fn last_user_turn(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.as_str())
    }

    /// Preamble followed by the reference context block.
    pub fn system_text(&self) -> String {
        match &self.context {
            Some(context) => format!("{}\n\n{}", self.preamble, context),
            None => self.preamble.clone(),
        }
    }
}

/// A translation model reachable over some transport.
#[async_trait]
pub trait TranslationModel: Send + Sync + Debug {
    /// Run one completion and return the raw reply text.
    async fn complete(&self, request: &ModelRequest) -> Result<String, ProviderError>;

    /// Name used in logs.
    fn name(&self) -> &str;
}

/// Text embedding capability for the translation memory.
#[async_trait]
pub trait Embedder: Send + Sync + Debug {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}
