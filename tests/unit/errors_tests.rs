/*!
 * Tests for error types and conversions
 */

use std::time::Duration;

use chunkwise::errors::{AppError, ProviderError, TranslationError};

#[test]
fn test_providerError_apiError_shouldDisplayStatusAndMessage() {
    let error = ProviderError::ApiError {
        status_code: 503,
        message: "Model is loading".to_string(),
    };
    let display = format!("{}", error);
    assert!(display.contains("503"));
    assert!(display.contains("Model is loading"));
}

#[test]
fn test_providerError_isTransient_shouldSeparateRetryableErrors() {
    assert!(ProviderError::ConnectionError("refused".to_string()).is_transient());
    assert!(ProviderError::Timeout("read".to_string()).is_transient());
    assert!(ProviderError::RateLimitExceeded("slow down".to_string()).is_transient());
    assert!(ProviderError::ApiError { status_code: 502, message: String::new() }.is_transient());
    assert!(ProviderError::ApiError { status_code: 429, message: String::new() }.is_transient());

    assert!(!ProviderError::ApiError { status_code: 404, message: String::new() }.is_transient());
    assert!(!ProviderError::AuthenticationError("bad key".to_string()).is_transient());
    assert!(!ProviderError::ParseError("junk".to_string()).is_transient());
}

#[test]
fn test_translationError_fromProviderError_shouldWrapCorrectly() {
    let provider_error = ProviderError::RequestFailed("Test error".to_string());
    let error: TranslationError = provider_error.clone().into();

    assert_eq!(error, TranslationError::Provider(provider_error));
    assert_eq!(error.kind(), "provider");
    assert!(error.is_recoverable());
}

#[test]
fn test_translationError_kinds_shouldBeDistinct() {
    let errors = [
        TranslationError::Protocol("x".to_string()),
        TranslationError::Refusal("x".to_string()),
        TranslationError::Timeout(Duration::from_secs(1)),
        TranslationError::AmbiguousTerm {
            alias: "Smith".to_string(),
            candidates: vec!["John Smith".to_string(), "Jane Smith".to_string()],
        },
        TranslationError::Structural { size: 900, max_size: 512 },
        TranslationError::Cancelled,
        TranslationError::InvalidState("x".to_string()),
    ];
    let mut kinds: Vec<&str> = errors.iter().map(TranslationError::kind).collect();
    kinds.sort_unstable();
    kinds.dedup();
    assert_eq!(kinds.len(), errors.len());
}

#[test]
fn test_translationError_timeoutAndRefusal_shouldBeDistinctAndRecoverable() {
    let timeout = TranslationError::Timeout(Duration::from_secs(120));
    let refusal = TranslationError::Refusal("I cannot help with that".to_string());

    assert_ne!(timeout.kind(), refusal.kind());
    assert!(timeout.is_recoverable());
    assert!(refusal.is_recoverable());
    assert!(!TranslationError::Cancelled.is_recoverable());
    assert!(!TranslationError::Structural { size: 2, max_size: 1 }.is_recoverable());
}

#[test]
fn test_translationError_ambiguousTerm_shouldListCandidates() {
    let error = TranslationError::AmbiguousTerm {
        alias: "Smith".to_string(),
        candidates: vec!["John Smith".to_string(), "Jane Smith".to_string()],
    };
    let display = error.to_string();
    assert!(display.contains("'Smith'"));
    assert!(display.contains("John Smith, Jane Smith"));
}

#[test]
fn test_appError_conversions_shouldPickMatchingVariant() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    assert!(matches!(AppError::from(io), AppError::File(_)));

    let anyhow_error = anyhow::anyhow!("something odd");
    assert!(matches!(AppError::from(anyhow_error), AppError::Unknown(_)));

    let translation: AppError = TranslationError::Cancelled.into();
    assert!(matches!(translation, AppError::Translation(TranslationError::Cancelled)));

    let provider: AppError = ProviderError::ParseError("bad".to_string()).into();
    assert!(provider.to_string().contains("bad"));
}
