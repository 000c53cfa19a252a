/*!
 * Mock translation model for testing.
 *
 * Queued replies are served first, in order. Once the queue is empty the
 * configured behavior answers:
 * - `MockBehavior::Cooperative` - follows the portion protocol and echoes the chunk back
 * - `MockBehavior::Slow` - cooperative, but sleeps before each reply
 * - `MockBehavior::Failing` - always fails with a server error
 * - `MockBehavior::Scripted` - fails once the queue runs dry
 *
 * Every request is recorded so tests can inspect what the session sent.
 */

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::errors::ProviderError;
use crate::providers::{ModelRequest, Role, TranslationModel};
use crate::session::protocol::CONTINUATION_TOKEN;

/// A queued mock reply
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Reply with this text
    Text(String),
    /// Fail with this error
    Error(ProviderError),
    /// Sleep, then reply with this text
    Delayed { delay_ms: u64, text: String },
}

/// Behavior once the queue is empty
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Declare `portions`, then return the chunk text split into that many pieces
    Cooperative { portions: usize },
    /// Like `Cooperative`, after a delay
    Slow { portions: usize, delay_ms: u64 },
    /// Always fails with an error
    Failing,
    /// Only the queue answers
    Scripted,
}

/// Mock model with a shared reply queue and request log
#[derive(Debug, Clone)]
pub struct ScriptedModel {
    behavior: MockBehavior,
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    requests: Arc<Mutex<Vec<ModelRequest>>>,
    request_count: Arc<AtomicUsize>,
}

impl ScriptedModel {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            replies: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            request_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A model that follows the protocol, declaring `portions` per chunk
    pub fn cooperative(portions: usize) -> Self {
        Self::new(MockBehavior::Cooperative { portions })
    }

    /// A model that only answers from the given replies
    pub fn scripted<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let model = Self::new(MockBehavior::Scripted);
        for reply in replies {
            model.push_text(reply);
        }
        model
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn slow(portions: usize, delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { portions, delay_ms })
    }

    pub fn push(&self, reply: MockReply) -> &Self {
        self.replies.lock().push_back(reply);
        self
    }

    pub fn push_text(&self, text: impl Into<String>) -> &Self {
        self.push(MockReply::Text(text.into()))
    }

    pub fn push_error(&self, error: ProviderError) -> &Self {
        self.push(MockReply::Error(error))
    }

    /// Number of calls made so far
    pub fn call_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Snapshot of every request received
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().clone()
    }

    /// The chunk text of a request: its first user turn
    pub fn source_of(request: &ModelRequest) -> &str {
        request
            .turns
            .iter()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.as_str())
            .unwrap_or_default()
    }

    fn cooperative_reply(request: &ModelRequest, portions: usize) -> String {
        let portions = portions.max(1);
        let source = Self::source_of(request);
        let continuations = request
            .turns
            .iter()
            .filter(|t| t.role == Role::User && t.content == CONTINUATION_TOKEN)
            .count();

        // Before the first continuation every prompt asks for the count;
        // afterwards a clarification asks for the current piece again
        if continuations == 0 {
            return portions.to_string();
        }
        split_evenly(source, portions)
            .get(continuations.saturating_sub(1))
            .cloned()
            .unwrap_or_default()
    }
}

/// Split `text` into `parts` consecutive pieces of roughly equal char count.
pub fn split_evenly(text: &str, parts: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let parts = parts.max(1);
    let step = chars.len().div_ceil(parts).max(1);
    let mut pieces: Vec<String> = chars.chunks(step).map(|c| c.iter().collect()).collect();
    pieces.resize(parts, String::new());
    pieces
}

#[async_trait]
impl TranslationModel for ScriptedModel {
    async fn complete(&self, request: &ModelRequest) -> Result<String, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let queued = self.replies.lock().pop_front();
        if let Some(reply) = queued {
            return match reply {
                MockReply::Text(text) => Ok(text),
                MockReply::Error(error) => Err(error),
                MockReply::Delayed { delay_ms, text } => {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    Ok(text)
                }
            };
        }

        match self.behavior {
            MockBehavior::Cooperative { portions } => Ok(Self::cooperative_reply(request, portions)),
            MockBehavior::Slow { portions, delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(Self::cooperative_reply(request, portions))
            }
            MockBehavior::Failing => Err(ProviderError::ApiError {
                status_code: 500,
                message: "Simulated provider failure".to_string(),
            }),
            MockBehavior::Scripted => Err(ProviderError::ApiError {
                status_code: 500,
                message: format!("No scripted reply left for request #{}", count + 1),
            }),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
