/*!
 * Error types for the chunkwise library.
 *
 * Errors are split by the boundary they cross: `ProviderError` for the
 * external model/embedding services, `TranslationError` for the per-chunk
 * translation protocol, and `AppError` as the umbrella type for callers.
 */

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when talking to a model or embedding provider
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The provider gave up waiting on its own transport
    #[error("Provider timed out: {0}")]
    Timeout(String),
}

impl ProviderError {
    /// Whether a retry with backoff has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::ConnectionError(_)
            | ProviderError::RateLimitExceeded(_)
            | ProviderError::Timeout(_)
            | ProviderError::RequestFailed(_) => true,
            ProviderError::ApiError { status_code, .. } => *status_code >= 500 || *status_code == 429,
            ProviderError::ParseError(_) | ProviderError::AuthenticationError(_) => false,
        }
    }
}

/// Errors that can occur while translating a chunk
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    /// The model reply did not fit the expected handshake shape
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The model declined on content-policy grounds
    #[error("Model refused: {0}")]
    Refusal(String),

    /// A model call exceeded its deadline
    #[error("Model call timed out after {0:?}")]
    Timeout(Duration),

    /// An alias matched more than one known term
    #[error("Ambiguous term '{alias}': {}", candidates.join(", "))]
    AmbiguousTerm {
        /// The alias as it appeared in the text
        alias: String,
        /// Canonical names of every matching term
        candidates: Vec<String>,
    },

    /// A span could not be brought under the maximum chunk size
    #[error("Span of {size} chars exceeds the maximum of {max_size} and has no further delimiters")]
    Structural {
        /// Span size in characters
        size: usize,
        /// Configured maximum chunk size
        max_size: usize,
    },

    /// Error from the provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Translation was cancelled by the caller
    #[error("Translation cancelled")]
    Cancelled,

    /// A session transition was attempted from the wrong phase
    #[error("Invalid session state: {0}")]
    InvalidState(String),
}

impl TranslationError {
    /// Short machine-friendly name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            TranslationError::Protocol(_) => "protocol",
            TranslationError::Refusal(_) => "refusal",
            TranslationError::Timeout(_) => "timeout",
            TranslationError::AmbiguousTerm { .. } => "ambiguous_term",
            TranslationError::Structural { .. } => "structural",
            TranslationError::Provider(_) => "provider",
            TranslationError::Cancelled => "cancelled",
            TranslationError::InvalidState(_) => "invalid_state",
        }
    }

    /// Whether the session may recover from this error locally.
    pub fn is_recoverable(&self) -> bool {
        match self {
            TranslationError::Protocol(_)
            | TranslationError::Refusal(_)
            | TranslationError::Timeout(_)
            | TranslationError::AmbiguousTerm { .. } => true,
            TranslationError::Provider(e) => e.is_transient(),
            TranslationError::Structural { .. }
            | TranslationError::Cancelled
            | TranslationError::InvalidState(_) => false,
        }
    }
}

/// Main error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from translation
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}

impl From<regex::Error> for AppError {
    fn from(error: regex::Error) -> Self {
        Self::Config(error.to_string())
    }
}
