/*!
 * Tests for chunking properties over realistic documents
 */

use std::sync::Arc;

use chunkwise::chunking::{ChunkAssembler, DelimiterClass, Divider};
use chunkwise::document::{Chunk, ChunkWarning, Document};
use chunkwise::pipeline::Pipeline;
use chunkwise::providers::mock::ScriptedModel;

use crate::common;

fn chunk_with(document: &Document, min_size: usize, max_size: usize) -> Vec<Chunk> {
    let divider = Divider::new(&DelimiterClass::defaults()).expect("default classes compile");
    let boundaries = divider.divide(document.text(), max_size);
    ChunkAssembler::new(min_size, max_size).assemble(document, &boundaries)
}

fn assert_partition(document: &Document, chunks: &[Chunk]) {
    let joined: String = chunks.iter().map(|c| document.slice(c)).collect();
    assert_eq!(joined, document.text(), "chunks must cover the document in order");
    assert_eq!(chunks.first().map(|c| c.start), Some(0));
    assert_eq!(chunks.last().map(|c| c.end), Some(document.text().len()));
    for pair in chunks.windows(2) {
        assert_eq!(pair[0].end, pair[1].start, "chunks must not gap or overlap");
    }
}

fn assert_bounds(chunks: &[Chunk], min_size: usize, max_size: usize) {
    for chunk in chunks {
        let flagged_over = chunk.warnings.iter().any(|w| matches!(w, ChunkWarning::Oversized { .. }));
        let flagged_under = chunk.warnings.iter().any(|w| matches!(w, ChunkWarning::Undersized { .. }));
        assert!(chunk.size <= max_size || flagged_over, "chunk {} too large", chunk.index);
        assert!(
            chunk.size >= min_size || flagged_under || chunks.len() == 1,
            "chunk {} too small",
            chunk.index
        );
    }
}

#[test]
fn test_chunking_japaneseStory_shouldPartitionWithinBounds() {
    let document = Document::new("story", common::JAPANESE_STORY);

    for (min_size, max_size) in [(10, 40), (20, 60), (30, 200)] {
        let chunks = chunk_with(&document, min_size, max_size);
        assert_partition(&document, &chunks);
        assert_bounds(&chunks, min_size, max_size);
    }
}

#[test]
fn test_chunking_sceneMarkers_shouldStartNewChunks() {
    let document = Document::new("story", common::JAPANESE_STORY);
    let chunks = chunk_with(&document, 5, 60);

    let scene_starts: Vec<&Chunk> = chunks
        .iter()
        .filter(|c| document.slice(c).starts_with('〇'))
        .collect();
    assert_eq!(scene_starts.len(), 2);
}

#[test]
fn test_chunking_eightyPlusThirty_shouldYieldOneChunkOf110() {
    let text = format!("{}\n\n{}", common::paragraph(78, "word"), common::paragraph(30, "tail"));
    let document = Document::new("d", text);
    assert_eq!(document.char_len(), 110);

    let chunks = chunk_with(&document, 50, 200);

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].size, 110);
    assert!(chunks[0].warnings.is_empty());
}

#[test]
fn test_chunking_longEnglishText_shouldFallBackToSentences() {
    let paragraph = (0..12)
        .map(|i| format!("Sentence number {} ends here.", i))
        .collect::<Vec<_>>()
        .join(" ");
    let text = format!("{}\n\n{}", paragraph, paragraph);
    let document = Document::new("d", text);

    let chunks = chunk_with(&document, 40, 120);

    assert_partition(&document, &chunks);
    assert_bounds(&chunks, 40, 120);
    assert!(chunks.len() > 2);
    for chunk in &chunks[..chunks.len() - 1] {
        let slice = document.slice(chunk).trim_end();
        assert!(slice.ends_with('.'), "chunk should end on a sentence: {:?}", slice);
    }
}

#[test]
fn test_chunking_noDelimiters_shouldFlagOversized() {
    let document = Document::new("d", "x".repeat(300));
    let chunks = chunk_with(&document, 10, 100);

    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].is_oversized());
    assert_eq!(
        chunks[0].warnings[0].to_string(),
        "Max length (100) exceeded: 300 chars"
    );
}

#[test]
fn test_pipelineChunk_shouldMatchDividerAndAssembler() {
    let config = common::test_config(10, 40);
    let model = ScriptedModel::cooperative(1);
    let pipeline = Pipeline::new(config, Arc::new(model)).expect("valid config");
    let document = Document::new("story", common::JAPANESE_STORY);

    assert_eq!(pipeline.chunk(&document), chunk_with(&document, 10, 40));
}
