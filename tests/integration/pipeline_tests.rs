/*!
 * Integration tests for whole-document translation
 */

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use chunkwise::chunking::{ReplacePattern, ReplaceStage};
use chunkwise::document::{ChunkStatus, Document};
use chunkwise::errors::TranslationError;
use chunkwise::pipeline::PipelineProgress;
use chunkwise::providers::mock::ScriptedModel;
use chunkwise::session::CONTINUATION_TOKEN;

use crate::common;

/// Test the full flow with a model that follows the protocol
#[tokio::test]
async fn test_translate_cooperativeModel_shouldCompleteEveryChunk() {
    let model = ScriptedModel::cooperative(1);
    let pipeline = common::mock_pipeline(common::test_config(10, 40), &model);
    let document = Document::new("story", common::JAPANESE_STORY);

    let result = pipeline.translate(&document, &CancellationToken::new()).await;

    assert!(result.is_complete(), "{}", result.summary());
    assert!(result.outcomes.len() > 3);
    // The mock echoes its source, so the output is the document itself
    assert_eq!(result.text(), common::JAPANESE_STORY);
    assert_eq!(result.render_with_source_fallback(), common::JAPANESE_STORY);
    assert_eq!(pipeline.memory().len(), result.outcomes.len());
    assert_eq!(model.call_count(), 2 * result.outcomes.len());
    for outcome in &result.outcomes {
        assert_eq!(outcome.declared_portions, Some(1));
        assert_eq!(outcome.portions_received, 1);
    }
}

/// Test that an 80 + 30 char document becomes one request
#[tokio::test]
async fn test_translate_eightyPlusThirty_shouldSendOneChunk() {
    let model = ScriptedModel::cooperative(1);
    let pipeline = common::mock_pipeline(common::test_config(50, 200), &model);
    let text = format!("{}\n\n{}", common::paragraph(78, "word"), common::paragraph(30, "tail"));
    let document = Document::new("d", text.clone());

    let result = pipeline.translate(&document, &CancellationToken::new()).await;

    assert_eq!(result.outcomes.len(), 1);
    assert_eq!(result.outcomes[0].chunk.size, 110);
    assert_eq!(ScriptedModel::source_of(&model.requests()[0]), text);
}

/// Test a shortfall marker growing the declared portion count
#[tokio::test]
async fn test_translate_shortfallMarker_shouldExtendPortionsAndValidate() {
    let model = ScriptedModel::scripted([
        "3",
        "Part one.",
        "Part two.",
        "Part three.\n[[REMAINING: 1]]",
        "Part four.",
    ]);
    let pipeline = common::mock_pipeline(common::test_config(1, 200), &model);
    let document = Document::new("d", "Partie un. Partie deux. Partie trois. Fin.");

    let result = pipeline.translate(&document, &CancellationToken::new()).await;

    let outcome = &result.outcomes[0];
    assert!(outcome.is_complete(), "{:?}", outcome.error);
    assert_eq!(outcome.declared_portions, Some(4));
    assert_eq!(outcome.portions_received, 4);
    assert_eq!(
        outcome.translation.as_deref(),
        Some("Part one. Part two. Part three. Part four.")
    );
    assert_eq!(model.call_count(), 5);

    let requests = model.requests();
    assert_eq!(requests[4].last_user_turn(), Some(CONTINUATION_TOKEN));
}

/// Test that an implausibly short translation restarts the chunk
#[tokio::test]
async fn test_translate_implausibleLength_shouldRestartChunk() {
    let model = ScriptedModel::cooperative(1);
    model.push_text("1").push_text("Too short.");
    let pipeline = common::mock_pipeline(common::test_config(1, 400), &model);
    let source = "This passage is long enough that a ten character reply cannot be its translation.";
    let document = Document::new("d", source);

    let result = pipeline.translate(&document, &CancellationToken::new()).await;

    let outcome = &result.outcomes[0];
    assert!(outcome.is_complete());
    assert_eq!(outcome.retries.protocol, 1);
    assert_eq!(outcome.translation.as_deref(), Some(source));
    // Restarted exchange opens with the chunk text alone
    assert_eq!(model.requests()[2].turns.len(), 1);
}

/// Test one re-prompt after a chatty negotiation reply
#[tokio::test]
async fn test_translate_nonNumericFirstReply_shouldRepromptOnceAndProceed() {
    let model = ScriptedModel::cooperative(1);
    model.push_text("Sure! Here is my plan for this passage.");
    let pipeline = common::mock_pipeline(common::test_config(1, 200), &model);
    let document = Document::new("d", "Une phrase simple.");

    let result = pipeline.translate(&document, &CancellationToken::new()).await;

    let outcome = &result.outcomes[0];
    assert!(outcome.is_complete());
    assert_eq!(outcome.retries.protocol, 1);
    assert_eq!(model.call_count(), 3);

    let reprompt = &model.requests()[1];
    assert_eq!(reprompt.turns.len(), 3);
    assert!(reprompt.last_user_turn().unwrap_or_default().contains("single number"));
}

/// Test that oversized chunks never reach the model
#[tokio::test]
async fn test_translate_oversizedChunk_shouldFailStructurallyWithoutModelCall() {
    let model = ScriptedModel::cooperative(1);
    let pipeline = common::mock_pipeline(common::test_config(5, 50), &model);
    let text = format!("Short opening line.\n\n{}", "x".repeat(120));
    let document = Document::new("d", text);

    let result = pipeline.translate(&document, &CancellationToken::new()).await;

    assert_eq!(result.outcomes.len(), 2);
    let oversized = &result.outcomes[1];
    assert_eq!(oversized.status(), ChunkStatus::Failed);
    assert!(matches!(
        oversized.error,
        Some(TranslationError::Structural { size: 120, max_size: 50 })
    ));
    assert!(result.outcomes[0].is_complete());
    // Count and one portion for the opening line only
    assert_eq!(model.call_count(), 2);

    // Flagged chunk is emitted as source text
    assert_eq!(result.render_with_source_fallback(), document.text());
    assert_eq!(result.untranslated().len(), 1);
}

/// Test submit and export replacements at their stages
#[tokio::test]
async fn test_translate_replacements_shouldApplyAtTheirStages() {
    let mut config = common::test_config(1, 200);
    config.chunking.replacements = vec![
        ReplacePattern::new("ruby", r"《[^》]*》", None, ReplaceStage::Immediate),
        ReplacePattern::new("ellipsis", r"\.\.\.", Some("…"), ReplaceStage::OnSubmit),
        ReplacePattern::new("quotes", "「", Some("\""), ReplaceStage::OnExport),
    ];
    let model = ScriptedModel::cooperative(1);
    let pipeline = common::mock_pipeline(config, &model);
    let document = Document::new("d", "「漢字《かんじ》...");

    let result = pipeline.translate(&document, &CancellationToken::new()).await;

    assert_eq!(ScriptedModel::source_of(&model.requests()[0]), "「漢字…");
    assert_eq!(result.outcomes[0].source, "「漢字...");
    assert_eq!(result.render_with_source_fallback(), "\"漢字…");
}

/// Test progress reporting when each chunk starts and finishes
#[tokio::test]
async fn test_translate_withProgress_shouldReportEveryChunkTwice() {
    let seen: Arc<Mutex<Vec<PipelineProgress>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let model = ScriptedModel::cooperative(1);
    let pipeline = common::mock_pipeline(common::test_config(5, 40), &model)
        .with_progress(move |progress| sink.lock().unwrap().push(progress));
    let document = Document::new("story", common::JAPANESE_STORY);

    let result = pipeline.translate(&document, &CancellationToken::new()).await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2 * result.outcomes.len());
    for (index, pair) in seen.chunks(2).enumerate() {
        assert_eq!(pair[0].chunk_index, index);
        assert_eq!(pair[0].status, ChunkStatus::InProgress);
        assert_eq!(pair[0].chunks_processed, index);
        assert_eq!(pair[1].chunk_index, index);
        assert_eq!(pair[1].status, ChunkStatus::Complete);
        assert_eq!(pair[1].chunks_processed, index + 1);
    }
    let last = seen.last().unwrap();
    assert_eq!(last.chunks_processed, last.total_chunks);
    assert_eq!(last.fraction(), 1.0);
}

/// Test that an empty document yields an empty, complete result
#[test]
fn test_translate_emptyDocument_shouldMakeNoCalls() {
    let model = ScriptedModel::cooperative(1);
    let pipeline = common::mock_pipeline(common::test_config(10, 40), &model);
    let document = Document::new("empty", "");

    let result = tokio_test::block_on(async {
        pipeline.translate(&document, &CancellationToken::new()).await
    });

    assert!(result.outcomes.is_empty());
    assert!(result.is_complete());
    assert_eq!(result.text(), "");
    assert_eq!(model.call_count(), 0);
}
