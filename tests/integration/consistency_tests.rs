/*!
 * Integration tests for cross-chunk consistency: terms, memory, carry-over
 */

use tokio_util::sync::CancellationToken;

use chunkwise::document::Document;
use chunkwise::errors::TranslationError;
use chunkwise::providers::mock::ScriptedModel;
use chunkwise::terms::glossary::GlossaryEntry;
use chunkwise::terms::Resolution;

use crate::common;

/// Test that a partial name seen first resolves once the full name appears
#[tokio::test]
async fn test_translate_partialNameBeforeFullName_shouldResolveRetroactively() {
    let model = ScriptedModel::cooperative(1);
    let pipeline = common::mock_pipeline(common::test_config(10, 80), &model);
    let document = Document::new(
        "d",
        "Smith arrived at the station early.\n\nJohn Smith finally boarded the train.",
    );

    let result = pipeline.translate(&document, &CancellationToken::new()).await;

    assert!(result.is_complete());
    assert_eq!(result.outcomes.len(), 2);
    match pipeline.terms().resolve("Smith") {
        Resolution::Resolved(term) => assert_eq!(term.canonical, "John Smith"),
        other => panic!("expected Smith to resolve, got {:?}", other),
    }
    assert!(pipeline.terms().pending().is_empty());

    let requests = model.requests();
    // Chunk 1 knows no names yet; chunk 2 sees the term and the carried-over alias
    assert!(!requests[0].system_text().contains("John Smith"));
    let second_chunk = requests[2].system_text();
    assert!(second_chunk.contains("### Known names and terms"));
    assert!(second_chunk.contains("John Smith"));
    assert!(second_chunk.contains("### Previous passage"));
    assert!(second_chunk.contains("Names not yet identified: Smith"));
}

/// Test that sentence-initial adverbs never become part of a name
#[tokio::test]
async fn test_translate_sentenceInitialAdverbs_shouldKeepNamesClean() {
    let model = ScriptedModel::cooperative(1);
    let pipeline = common::mock_pipeline(common::test_config(10, 80), &model);
    let document = Document::new(
        "d",
        "Smith nodded slowly.\n\nYesterday John Smith arrived at the station.\n\n\
         Meanwhile John Smith waited. Later Jane Doe came.",
    );

    let result = pipeline.translate(&document, &CancellationToken::new()).await;

    assert!(result.is_complete());
    let mut canonicals: Vec<String> =
        pipeline.terms().terms().into_iter().map(|t| t.canonical).collect();
    canonicals.sort();
    assert_eq!(canonicals, vec!["Jane Doe".to_string(), "John Smith".to_string()]);
    assert_eq!(
        pipeline.terms().resolve("Smith").term().map(|t| t.canonical.clone()),
        Some("John Smith".to_string())
    );
    assert!(matches!(pipeline.terms().resolve("John"), Resolution::Resolved(_)));
    assert!(pipeline.terms().pending().is_empty());
}

/// Test glossary renderings reaching the model as reference material
#[tokio::test]
async fn test_translate_seededGlossary_shouldShowRenderingInContext() {
    let model = ScriptedModel::cooperative(1);
    let pipeline = common::mock_pipeline(common::test_config(10, 40), &model);
    pipeline.terms().seed(&[GlossaryEntry {
        source: "山田".to_string(),
        translations: vec!["Yamada".to_string()],
        description: Some("protagonist".to_string()),
    }]);
    let document = Document::new("story", common::JAPANESE_STORY);

    let result = pipeline.translate(&document, &CancellationToken::new()).await;

    assert!(result.is_complete());
    let first = model.requests()[0].system_text();
    assert!(first.contains("山田 => Yamada"), "{}", first);
    assert!(first.contains("protagonist"));
}

/// Test that a shared alias is surfaced, never silently picked
#[tokio::test]
async fn test_translate_ambiguousAlias_shouldSurfaceCandidates() {
    let model = ScriptedModel::cooperative(1);
    let pipeline = common::mock_pipeline(common::test_config(1, 200), &model);
    pipeline.terms().register("John Smith");
    pipeline.terms().register("Jane Smith");
    let document = Document::new("d", "Smith nodded without a word.");

    let result = pipeline.translate(&document, &CancellationToken::new()).await;

    let outcome = &result.outcomes[0];
    assert!(outcome.is_complete());
    assert_eq!(outcome.ambiguities.len(), 1);
    match &outcome.ambiguities[0] {
        TranslationError::AmbiguousTerm { alias, candidates } => {
            assert_eq!(alias, "Smith");
            assert_eq!(candidates.len(), 2);
        }
        other => panic!("expected an ambiguous term, got {:?}", other),
    }
    assert!(result.summary().contains("Ambiguous terms: 1"));

    let context = model.requests()[0].system_text();
    assert!(context.contains("\"Smith\" may refer to"));
    assert!(matches!(pipeline.terms().resolve("Smith"), Resolution::Ambiguous(_)));
}

/// Test concurrent documents sharing the term index and memory
#[tokio::test]
async fn test_translateAll_twoDocuments_shouldShareIndexAndMemory() {
    let model = ScriptedModel::cooperative(1);
    let pipeline = common::mock_pipeline(common::test_config(10, 60), &model);
    let documents = vec![
        Document::new("first", "Elizabeth Bennet walked to town.\n\nShe met an officer there."),
        Document::new("second", "Bennet laughed at the news.\n\nThe rain kept falling all day."),
    ];

    let results = pipeline.translate_all(&documents, &CancellationToken::new()).await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].document_id, "first");
    assert_eq!(results[1].document_id, "second");
    assert!(results.iter().all(|r| r.is_complete()));

    let total_chunks: usize = results.iter().map(|r| r.outcomes.len()).sum();
    assert_eq!(pipeline.memory().len(), total_chunks);
    assert_eq!(
        pipeline.terms().resolve("Bennet").term().map(|t| t.canonical.clone()),
        Some("Elizabeth Bennet".to_string())
    );
    for (document, result) in documents.iter().zip(&results) {
        assert_eq!(result.render_with_source_fallback(), document.text());
    }
}
