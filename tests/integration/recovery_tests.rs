/*!
 * Integration tests for failure handling: refusals, timeouts and cancellation
 */

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use chunkwise::document::{ChunkStatus, Document};
use chunkwise::errors::{ProviderError, TranslationError};
use chunkwise::providers::mock::ScriptedModel;
use chunkwise::session::prompts::REFRAME_NOTE;

use crate::common;

const TWO_PARAGRAPHS: &str = "First paragraph here.\n\nSecond paragraph here.";
const THREE_PARAGRAPHS: &str = "First paragraph here.\n\nSecond paragraph here.\n\nThird paragraph here.";
const REFUSAL: &str = "I'm sorry, but I cannot translate this passage.";

/// Test that a chunk the model keeps refusing fails alone
#[tokio::test]
async fn test_translate_persistentRefusal_shouldFailChunkAndContinue() {
    let model = ScriptedModel::cooperative(1);
    model.push_text(REFUSAL).push_text(REFUSAL).push_text(REFUSAL);
    let pipeline = common::mock_pipeline(common::test_config(5, 30), &model);
    let document = Document::new("d", TWO_PARAGRAPHS);

    let result = pipeline.translate(&document, &CancellationToken::new()).await;

    assert_eq!(result.outcomes.len(), 2);
    let refused = &result.outcomes[0];
    assert_eq!(refused.status(), ChunkStatus::Failed);
    assert_eq!(refused.error.as_ref().map(TranslationError::kind), Some("refusal"));
    assert_eq!(refused.retries.refusal, 3);
    assert!(result.outcomes[1].is_complete());

    // Every retry after the first refusal carries the reframing note
    let requests = model.requests();
    assert!(!requests[0].system_text().contains(REFRAME_NOTE));
    assert!(requests[1].system_text().contains(REFRAME_NOTE));
    assert!(requests[2].system_text().contains(REFRAME_NOTE));
    // The next chunk starts clean
    assert!(!requests[3].system_text().contains(REFRAME_NOTE));

    assert_eq!(result.text(), "Second paragraph here.");
    assert_eq!(result.render_with_source_fallback(), TWO_PARAGRAPHS);
    assert_eq!(pipeline.memory().len(), 1);
}

/// Test one reframe recovering from a single refusal
#[tokio::test]
async fn test_translate_singleRefusal_shouldRecoverAfterReframe() {
    let model = ScriptedModel::cooperative(1);
    model.push_text("1").push_text(REFUSAL);
    let pipeline = common::mock_pipeline(common::test_config(1, 200), &model);
    let document = Document::new("d", "Une phrase délicate.");

    let result = pipeline.translate(&document, &CancellationToken::new()).await;

    let outcome = &result.outcomes[0];
    assert!(outcome.is_complete(), "{:?}", outcome.error);
    assert_eq!(outcome.retries.refusal, 1);
    assert_eq!(model.call_count(), 4);
    assert_eq!(model.requests()[2].turns.len(), 1);
}

/// Test that a model that never answers fails the chunk as a timeout
#[tokio::test(start_paused = true)]
async fn test_translate_unresponsiveModel_shouldFailWithTimeout() {
    let model = ScriptedModel::slow(1, 600_000);
    let mut config = common::test_config(1, 200);
    config.session.call_timeout_secs = 1;
    let pipeline = common::mock_pipeline(config, &model);
    let document = Document::new("d", "Nobody will ever translate this.");

    let result = pipeline.translate(&document, &CancellationToken::new()).await;

    let outcome = &result.outcomes[0];
    assert_eq!(outcome.status(), ChunkStatus::Failed);
    assert_eq!(outcome.error, Some(TranslationError::Timeout(Duration::from_secs(1))));
    assert_eq!(outcome.retries.timeout, 3);
    assert_eq!(model.call_count(), 4);
}

/// Test transient provider errors being retried with backoff
#[tokio::test(start_paused = true)]
async fn test_translate_transientProviderErrors_shouldRetryAndComplete() {
    let model = ScriptedModel::cooperative(1);
    model
        .push_error(ProviderError::ConnectionError("connection reset".to_string()))
        .push_error(ProviderError::ApiError {
            status_code: 503,
            message: "Model is loading".to_string(),
        });
    let mut config = common::test_config(1, 200);
    config.session.retry_backoff_ms = 1000;
    let pipeline = common::mock_pipeline(config, &model);
    let document = Document::new("d", "Eventually this works.");

    let started = tokio::time::Instant::now();
    let result = pipeline.translate(&document, &CancellationToken::new()).await;

    let outcome = &result.outcomes[0];
    assert!(outcome.is_complete());
    assert_eq!(outcome.retries.timeout, 2);
    assert_eq!(model.call_count(), 4);
    // 1s then 2s of backoff
    assert!(started.elapsed() >= Duration::from_millis(3000));
}

/// Test that cancelling between chunks leaves the rest pending
#[tokio::test]
async fn test_translate_cancelledAfterFirstChunk_shouldLeaveRestPending() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let model = ScriptedModel::cooperative(1);
    let pipeline = common::mock_pipeline(common::test_config(5, 30), &model)
        .with_progress(move |progress| {
            if progress.status == ChunkStatus::Complete {
                trigger.cancel();
            }
        });
    let document = Document::new("d", THREE_PARAGRAPHS);

    let result = pipeline.translate(&document, &cancel).await;

    assert_eq!(result.outcomes.len(), 3);
    assert!(result.outcomes[0].is_complete());
    for outcome in &result.outcomes[1..] {
        assert_eq!(outcome.status(), ChunkStatus::Pending);
        assert_eq!(outcome.error, Some(TranslationError::Cancelled));
    }
    assert_eq!(result.count(ChunkStatus::Pending), 2);
    assert_eq!(model.call_count(), 2);
    assert_eq!(pipeline.memory().len(), 1);
    assert_eq!(result.render_with_source_fallback(), THREE_PARAGRAPHS);
}

/// Test cancelling while a model call is in flight
#[tokio::test(start_paused = true)]
async fn test_translate_cancelledDuringCall_shouldStopPromptly() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(12)).await;
        trigger.cancel();
    });

    let model = ScriptedModel::slow(1, 5000);
    let mut config = common::test_config(5, 30);
    config.session.call_timeout_secs = 60;
    let pipeline = common::mock_pipeline(config, &model);
    let document = Document::new("d", TWO_PARAGRAPHS);

    let started = tokio::time::Instant::now();
    let result = pipeline.translate(&document, &cancel).await;

    // First chunk takes two 5s calls; the second is cut off mid-call
    assert!(result.outcomes[0].is_complete());
    assert_eq!(result.outcomes[1].status(), ChunkStatus::Pending);
    assert_eq!(result.outcomes[1].error, Some(TranslationError::Cancelled));
    assert_eq!(model.call_count(), 3);
    assert!(started.elapsed() < Duration::from_secs(15));
    assert_eq!(pipeline.memory().len(), 1);
}

/// Test that authentication failures are not retried
#[tokio::test]
async fn test_translate_authenticationError_shouldFailWithoutRetry() {
    let model = ScriptedModel::cooperative(1);
    model.push_error(ProviderError::AuthenticationError("invalid key".to_string()));
    let pipeline = common::mock_pipeline(common::test_config(1, 200), &model);
    let document = Document::new("d", "Some text.");

    let result = pipeline.translate(&document, &CancellationToken::new()).await;

    let outcome = &result.outcomes[0];
    assert_eq!(outcome.status(), ChunkStatus::Failed);
    assert!(matches!(
        outcome.error,
        Some(TranslationError::Provider(ProviderError::AuthenticationError(_)))
    ));
    assert_eq!(model.call_count(), 1);
}
