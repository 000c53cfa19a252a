/*!
 * Document translation pipeline.
 *
 * A document goes through:
 * 1. **Preparation**: immediate replacements on the whole text
 * 2. **Chunking**: recursive division and chunk assembly
 * 3. **Translation**: one `WindowSession` per document, chunks in order
 *
 * Independent documents may be translated concurrently; they share only the
 * term index and the translation memory.
 */

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::app_config::Config;
use crate::chunking::{ChunkAssembler, Divider, ReplaceStage, Replacer};
use crate::document::{Chunk, ChunkStatus, Document};
use crate::errors::AppError;
use crate::language_utils::get_language_name;
use crate::memory::TranslationMemory;
use crate::providers::TranslationModel;
use crate::providers::ollama::{Ollama, OllamaEmbedder};
use crate::session::{ChunkOutcome, WindowSession};
use crate::terms::TermIndex;

/// Progress information during document translation.
///
/// Each chunk is reported twice: `InProgress` when it is handed to the
/// model and again with its final status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineProgress {
    pub document_id: String,

    /// Index of the chunk this event is about
    pub chunk_index: usize,

    /// Chunks finished so far, whatever their status
    pub chunks_processed: usize,

    pub total_chunks: usize,

    pub status: ChunkStatus,
}

impl PipelineProgress {
    /// Progress as a fraction (0.0 - 1.0)
    pub fn fraction(&self) -> f32 {
        if self.total_chunks == 0 {
            1.0
        } else {
            self.chunks_processed as f32 / self.total_chunks as f32
        }
    }
}

type ProgressCallback = Arc<dyn Fn(PipelineProgress) + Send + Sync>;

/// Result of translating one document.
#[derive(Debug, Clone)]
pub struct TranslatedDocument {
    pub document_id: String,

    /// One outcome per chunk, in source order
    pub outcomes: Vec<ChunkOutcome>,

    /// Total duration of the translation
    pub duration: Duration,

    export: Replacer,
}

impl TranslatedDocument {
    /// Concatenated translations of complete chunks, in source order.
    pub fn text(&self) -> String {
        self.outcomes
            .iter()
            .filter_map(|outcome| {
                outcome
                    .translation
                    .as_deref()
                    .map(|translation| with_source_spacing(&outcome.source, translation))
            })
            .collect()
    }

    /// Full output: translations where complete, source text elsewhere,
    /// with export-time replacements applied.
    pub fn render_with_source_fallback(&self) -> String {
        let rendered: String = self
            .outcomes
            .iter()
            .map(|outcome| match outcome.translation.as_deref() {
                Some(translation) => with_source_spacing(&outcome.source, translation),
                None => outcome.source.clone(),
            })
            .collect();
        self.export.apply(&rendered, ReplaceStage::OnExport).into_owned()
    }

    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(ChunkOutcome::is_complete)
    }

    pub fn count(&self, status: ChunkStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status() == status).count()
    }

    /// Chunks emitted as source text by `render_with_source_fallback`.
    pub fn untranslated(&self) -> Vec<&ChunkOutcome> {
        self.outcomes.iter().filter(|o| !o.is_complete()).collect()
    }

    /// Get a summary of the result.
    pub fn summary(&self) -> String {
        let mut parts = vec![
            format!("Document: {}", self.document_id),
            format!("Duration: {:.2}s", self.duration.as_secs_f32()),
            format!(
                "Chunks: {} complete, {} failed, {} pending",
                self.count(ChunkStatus::Complete),
                self.count(ChunkStatus::Failed),
                self.count(ChunkStatus::Pending)
            ),
        ];
        let ambiguities: usize = self.outcomes.iter().map(|o| o.ambiguities.len()).sum();
        if ambiguities > 0 {
            parts.push(format!("Ambiguous terms: {}", ambiguities));
        }
        parts.join(" | ")
    }
}

/// The main translation pipeline.
pub struct Pipeline {
    config: Config,
    model: Arc<dyn TranslationModel>,
    terms: TermIndex,
    memory: TranslationMemory,
    divider: Divider,
    assembler: ChunkAssembler,
    replacer: Replacer,
    source_language: String,
    target_language: String,
    progress: Option<ProgressCallback>,
}

impl Pipeline {
    /// Create a pipeline around a model, with a fresh term index and a local memory.
    pub fn new(config: Config, model: Arc<dyn TranslationModel>) -> Result<Self, AppError> {
        config.validate().map_err(|e| AppError::Config(e.to_string()))?;

        let divider = Divider::new(&config.chunking.delimiter_classes)?;
        let assembler = ChunkAssembler::new(config.chunking.min_size, config.chunking.max_size);
        let replacer = Replacer::new(&config.chunking.replacements)?;
        let source_language = get_language_name(&config.source_language)?;
        let target_language = get_language_name(&config.target_language)?;

        Ok(Self {
            config,
            model,
            terms: TermIndex::default(),
            memory: TranslationMemory::local(),
            divider,
            assembler,
            replacer,
            source_language,
            target_language,
            progress: None,
        })
    }

    /// Create a pipeline backed by the configured Ollama server.
    pub fn from_config(config: Config) -> Result<Self, AppError> {
        let timeout = Duration::from_secs(config.session.call_timeout_secs);
        let client = Ollama::new(&config.provider.endpoint, config.provider.model.clone(), timeout)?
            .with_temperature(config.provider.temperature);

        let memory = if config.provider.embedding_model.trim().is_empty() {
            TranslationMemory::local()
        } else {
            let embedder = OllamaEmbedder::new(client.clone(), config.provider.embedding_model.clone());
            TranslationMemory::new(Arc::new(embedder))
        };

        Ok(Self::new(config, Arc::new(client))?.with_memory(memory))
    }

    /// Share an existing term index.
    pub fn with_terms(mut self, terms: TermIndex) -> Self {
        self.terms = terms;
        self
    }

    /// Share an existing translation memory.
    pub fn with_memory(mut self, memory: TranslationMemory) -> Self {
        self.memory = memory;
        self
    }

    /// Called after every chunk.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(PipelineProgress) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn terms(&self) -> &TermIndex {
        &self.terms
    }

    pub fn memory(&self) -> &TranslationMemory {
        &self.memory
    }

    /// Apply immediate replacements. The identifier is kept.
    pub fn prepare(&self, document: &Document) -> Document {
        let text = self.replacer.apply(document.text(), ReplaceStage::Immediate);
        Document::new(document.id(), text.into_owned())
    }

    /// Divide and assemble a prepared document into chunks.
    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let boundaries = self.divider.divide(document.text(), self.config.chunking.max_size);
        self.assembler.assemble(document, &boundaries)
    }

    /// Translate one document. Chunk failures are recorded in the result
    /// and never stop the remaining chunks; cancellation leaves them pending.
    pub async fn translate(&self, document: &Document, cancel: &CancellationToken) -> TranslatedDocument {
        let start_time = Instant::now();
        let prepared = self.prepare(document);
        let chunks = self.chunk(&prepared);
        info!("Translating '{}': {} chunks", prepared.id(), chunks.len());

        let mut session = WindowSession::new(
            self.model.clone(),
            self.terms.clone(),
            self.memory.clone(),
            self.config.session.clone(),
            &self.source_language,
            &self.target_language,
        )
        .with_replacer(self.replacer.clone());

        let mut outcomes = Vec::with_capacity(chunks.len());
        for (index, chunk) in chunks.iter().enumerate() {
            if !cancel.is_cancelled() {
                self.report(prepared.id(), index, index, chunks.len(), ChunkStatus::InProgress);
            }
            let outcome = session.translate_chunk(&prepared, chunk, cancel).await;
            self.report(prepared.id(), index, index + 1, chunks.len(), outcome.status());
            outcomes.push(outcome);
        }

        let result = TranslatedDocument {
            document_id: prepared.id().to_string(),
            outcomes,
            duration: start_time.elapsed(),
            export: self.replacer.clone(),
        };
        if result.is_complete() {
            info!("{}", result.summary());
        } else {
            warn!("{}", result.summary());
        }
        result
    }

    /// Translate independent documents concurrently. Results keep input order.
    pub async fn translate_all(&self, documents: &[Document], cancel: &CancellationToken) -> Vec<TranslatedDocument> {
        join_all(documents.iter().map(|document| self.translate(document, cancel))).await
    }

    fn report(
        &self,
        document_id: &str,
        chunk_index: usize,
        chunks_processed: usize,
        total_chunks: usize,
        status: ChunkStatus,
    ) {
        if let Some(callback) = &self.progress {
            callback(PipelineProgress {
                document_id: document_id.to_string(),
                chunk_index,
                chunks_processed,
                total_chunks,
                status,
            });
        }
    }
}

/// Give a chunk translation the trailing whitespace of its source, so
/// paragraph breaks between chunks survive the model trimming them.
fn with_source_spacing(source: &str, translation: &str) -> String {
    let trailing = &source[source.trim_end().len()..];
    let body = translation.trim_end();
    format!("{}{}", body, trailing)
}
