//! Per-conversation context tying the pipeline together.
//!
//! A [`Session`] is created when a conversation starts and dropped when it
//! ends. It owns the vector index, the conversation log and handles to the
//! embedding and generation backends. Ingestion and questions take the same
//! lock, so a search never observes a half-written index.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, warn};

use crate::error::{EmbeddingError, ExtractionError, PipelineError};
use crate::models::{
    Config, ConversationLog, Document, IngestMode, IngestedDocument, Query, RetrievalResult,
    TurnState,
};
use crate::services::{
    AnswerEngine, Embedder, Generator, IndexState, IndexStore, PlainTextExtractor, Retriever,
    TextChunker, TextExtractor, VectorIndex,
};

/// Pipeline parameters for a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub min_score: Option<f32>,
    pub generation_timeout: Option<Duration>,
    pub ingest_mode: IngestMode,
    pub max_document_size: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.chunking.chunk_size,
            chunk_overlap: config.chunking.chunk_overlap,
            top_k: config.retrieval.top_k,
            min_score: config.retrieval.min_score,
            generation_timeout: config
                .generation
                .timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            ingest_mode: config.ingestion.mode,
            max_document_size: config.ingestion.max_file_size,
        }
    }
}

/// Outcome of a single upload.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub document: String,
    pub chunks: usize,
    /// Chunks held by the index after this upload.
    pub total_chunks: usize,
    pub dimension: Option<usize>,
    /// The same content was already indexed.
    pub skipped: bool,
    pub duration_ms: u64,
}

/// An answer and the context it was generated from.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub question: String,
    pub text: String,
    pub retrieval: RetrievalResult,
    pub duration_ms: u64,
}

impl Answer {
    /// Whether retrieved context was part of the prompt.
    pub fn used_context(&self) -> bool {
        !self.retrieval.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub documents: Vec<IngestedDocument>,
    pub chunks: usize,
    pub dimension: Option<usize>,
    pub turns: usize,
}

#[derive(Debug, Default)]
struct SessionInner {
    index: IndexState,
    documents: Vec<IngestedDocument>,
    conversation: ConversationLog,
}

pub struct Session {
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    extractor: Arc<dyn TextExtractor>,
    chunker: TextChunker,
    retriever: Retriever,
    engine: AnswerEngine,
    top_k: usize,
    ingest_mode: IngestMode,
    inner: Mutex<SessionInner>,
    state: watch::Sender<TurnState>,
    store: Option<IndexStore>,
}

/// Ends a claimed turn. A dropped `ask` future leaves the session ready for
/// the next question instead of stuck in `Processing`.
struct TurnGuard<'a> {
    state: &'a watch::Sender<TurnState>,
    armed: bool,
}

impl TurnGuard<'_> {
    fn finish(mut self, success: bool) {
        self.armed = false;
        self.state.send_modify(|s| *s = s.finish(success));
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            debug!("question abandoned before it finished");
            self.state.send_modify(|s| *s = s.abandon());
        }
    }
}

impl Session {
    pub fn new(
        options: SessionOptions,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self, PipelineError> {
        let chunker = TextChunker::new(options.chunk_size, options.chunk_overlap)?;
        if options.top_k == 0 {
            return Err(PipelineError::InvalidConfig(
                "top_k must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            embedder,
            generator,
            extractor: Arc::new(PlainTextExtractor::new(options.max_document_size)),
            chunker,
            retriever: Retriever::new(options.min_score),
            engine: AnswerEngine::new(options.generation_timeout),
            top_k: options.top_k,
            ingest_mode: options.ingest_mode,
            inner: Mutex::new(SessionInner::default()),
            state: watch::Sender::new(TurnState::AwaitingInput),
            store: None,
        })
    }

    /// Start from the index saved in `store` and save every change back.
    ///
    /// An unreadable snapshot is logged and replaced on the next save.
    pub fn with_store(mut self, store: IndexStore) -> Self {
        match store.load() {
            Ok(stored) => {
                let inner = self.inner.get_mut();
                inner.index = stored.index;
                inner.documents = stored.documents;
                if !inner.documents.is_empty() {
                    info!(
                        documents = inner.documents.len(),
                        chunks = inner.index.len(),
                        "restored stored index"
                    );
                }
            }
            Err(e) => warn!(
                path = %store.path().display(),
                error = %e,
                "could not load stored index, starting empty"
            ),
        }
        self.store = Some(store);
        self
    }

    /// Replace the text extractor used by [`Session::ingest`].
    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn state(&self) -> TurnState {
        *self.state.borrow()
    }

    /// Receive processing-state changes, e.g. to show a "thinking" indicator.
    pub fn subscribe(&self) -> watch::Receiver<TurnState> {
        self.state.subscribe()
    }

    /// Called by the front end once an error has been shown.
    pub fn acknowledge_error(&self) {
        self.state.send_modify(|s| *s = s.acknowledge());
    }

    /// Extract, chunk, embed and index an uploaded file.
    ///
    /// On failure the index is left exactly as it was.
    pub async fn ingest(&self, filename: &str, bytes: &[u8]) -> Result<IngestReport, PipelineError> {
        let text = self
            .extractor
            .extract(filename, bytes)
            .map_err(|e| self.ingest_failed(filename, e.into()))?;
        self.ingest_text(filename, text).await
    }

    /// Index already-extracted text.
    pub async fn ingest_text(
        &self,
        filename: &str,
        text: String,
    ) -> Result<IngestReport, PipelineError> {
        let start = Instant::now();
        let document = Document::new(filename, text);
        let mut inner = self.inner.lock().await;

        if inner
            .documents
            .iter()
            .any(|d| d.checksum == document.checksum)
        {
            info!(document = filename, "content already indexed, skipping");
            return Ok(IngestReport {
                document: document.id,
                chunks: 0,
                total_chunks: inner.index.len(),
                dimension: inner.index.index().and_then(VectorIndex::dimension),
                skipped: true,
                duration_ms: start.elapsed().as_millis() as u64,
            });
        }

        let chunks = self.chunker.split(&document);
        if chunks.is_empty() {
            let err = ExtractionError::EmptyDocument(filename.to_string());
            return Err(self.ingest_failed(filename, err.into()));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        debug!(document = filename, chunks = texts.len(), "embedding chunks");
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .await
            .map_err(|e| self.ingest_failed(filename, e.into()))?;

        if embeddings.len() != chunks.len() {
            let err = EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            ));
            return Err(self.ingest_failed(filename, err.into()));
        }

        let count = chunks.len();
        let entries = chunks.into_iter().zip(embeddings).collect();

        let state = &mut *inner;
        match &mut state.index {
            IndexState::Populated(index) if self.ingest_mode == IngestMode::Append => index
                .insert(entries)
                .map_err(|e| self.ingest_failed(filename, e))?,
            _ => {
                let mut index = VectorIndex::new();
                index
                    .insert(entries)
                    .map_err(|e| self.ingest_failed(filename, e))?;
                if self.ingest_mode == IngestMode::Replace {
                    state.documents.clear();
                }
                state.index = IndexState::Populated(index);
            }
        }

        inner.documents.push(IngestedDocument {
            id: document.id.clone(),
            checksum: document.checksum,
            chunks: count,
        });
        self.persist(&inner);

        let report = IngestReport {
            document: document.id,
            chunks: count,
            total_chunks: inner.index.len(),
            dimension: inner.index.index().and_then(VectorIndex::dimension),
            skipped: false,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            document = %report.document,
            chunks = report.chunks,
            total = report.total_chunks,
            "document indexed"
        );
        Ok(report)
    }

    /// Save the index if the session has a store. Failures only lose
    /// persistence, never the in-memory index.
    fn persist(&self, inner: &SessionInner) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.save(&inner.index, &inner.documents) {
            warn!(path = %store.path().display(), error = %e, "could not save index");
        }
    }

    fn ingest_failed(&self, filename: &str, cause: PipelineError) -> PipelineError {
        let err = PipelineError::ingestion(filename, cause);
        error!(error = %err, "ingestion failed");
        err
    }

    /// Retrieve context for `question` without generating an answer.
    pub async fn retrieve(
        &self,
        question: &str,
        top_k: usize,
    ) -> Result<RetrievalResult, PipelineError> {
        let query = Query::new(question, top_k)?;
        let inner = self.inner.lock().await;
        self.search(&inner.index, &query).await
    }

    async fn search(
        &self,
        index: &IndexState,
        query: &Query,
    ) -> Result<RetrievalResult, PipelineError> {
        if index.is_empty() {
            return Ok(RetrievalResult::empty());
        }
        let query_vector = self.embedder.embed(&query.question).await?;
        self.retriever
            .retrieve_from(index, &query_vector, query.top_k)
    }

    /// Answer a question using the session's default `top_k`.
    pub async fn ask(&self, question: &str) -> Result<Answer, PipelineError> {
        self.ask_with(question, self.top_k).await
    }

    /// Run one question through the pipeline.
    ///
    /// The user turn is logged before processing; the assistant turn only on
    /// success. A question submitted while another is in flight fails with
    /// [`PipelineError::SessionBusy`].
    pub async fn ask_with(&self, question: &str, top_k: usize) -> Result<Answer, PipelineError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "question must not be empty".to_string(),
            ));
        }
        let query = Query::new(question, top_k)?;

        let mut accepted = false;
        self.state.send_if_modified(|state| {
            if state.can_begin() {
                *state = TurnState::Processing;
                accepted = true;
            }
            accepted
        });
        if !accepted {
            return Err(PipelineError::SessionBusy);
        }
        let turn = TurnGuard {
            state: &self.state,
            armed: true,
        };

        let start = Instant::now();
        // A running upload holds the lock, so the user turn is logged once it
        // finishes; the state already reads Processing meanwhile.
        let mut inner = self.inner.lock().await;
        inner.conversation.push_user(question);

        let result = self.run(&inner.index, &query).await;
        let success = result.is_ok();

        let answer = match result {
            Ok((text, retrieval)) => {
                inner.conversation.push_assistant(text.clone());
                let answer = Answer {
                    question: query.question,
                    text,
                    retrieval,
                    duration_ms: start.elapsed().as_millis() as u64,
                };
                info!(
                    context_chunks = answer.retrieval.len(),
                    duration_ms = answer.duration_ms,
                    "question answered"
                );
                Ok(answer)
            }
            Err(e) => {
                error!(error = %e, "question failed");
                Err(e)
            }
        };

        drop(inner);
        turn.finish(success);
        answer
    }

    async fn run(
        &self,
        index: &IndexState,
        query: &Query,
    ) -> Result<(String, RetrievalResult), PipelineError> {
        let retrieval = self.search(index, query).await?;
        if retrieval.is_empty() {
            debug!("no context available, asking the model directly");
        }
        let text = self
            .engine
            .answer(&query.question, &retrieval, self.generator.as_ref())
            .await?;
        Ok((text, retrieval))
    }

    /// Snapshot of the conversation so far.
    pub async fn conversation(&self) -> ConversationLog {
        self.inner.lock().await.conversation.clone()
    }

    pub async fn stats(&self) -> SessionStats {
        let inner = self.inner.lock().await;
        SessionStats {
            documents: inner.documents.clone(),
            chunks: inner.index.len(),
            dimension: inner.index.index().and_then(VectorIndex::dimension),
            turns: inner.conversation.len(),
        }
    }

    /// Drop every indexed document. The conversation is kept.
    pub async fn reset_index(&self) {
        let mut inner = self.inner.lock().await;
        inner.index = IndexState::Empty;
        inner.documents.clear();
        self.persist(&inner);
        info!("index reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use crate::models::{Embedding, Role};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// One dimension per known word; unknown words are ignored.
    struct VocabEmbedder {
        vocab: Vec<&'static str>,
        calls: AtomicUsize,
    }

    impl VocabEmbedder {
        fn new(vocab: &[&'static str]) -> Self {
            Self {
                vocab: vocab.to_vec(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for VocabEmbedder {
        async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut v = vec![0.0; self.vocab.len()];
            for word in text
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| !w.is_empty())
            {
                let word = word.to_lowercase();
                if let Some(i) = self.vocab.iter().position(|v| *v == word) {
                    v[i] += 1.0;
                }
            }
            Ok(v)
        }
    }

    struct FixedDim(usize);

    #[async_trait]
    impl Embedder for FixedDim {
        async fn embed(&self, _text: &str) -> Result<Embedding, EmbeddingError> {
            Ok(vec![1.0; self.0])
        }
    }

    struct Unreachable;

    #[async_trait]
    impl Embedder for Unreachable {
        async fn embed(&self, _text: &str) -> Result<Embedding, EmbeddingError> {
            Err(EmbeddingError::ConnectionError("refused".to_string()))
        }
    }

    /// Echoes the prompt back.
    struct Echo;

    #[async_trait]
    impl Generator for Echo {
        async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
            Ok(prompt.to_string())
        }
    }

    struct Broken;

    #[async_trait]
    impl Generator for Broken {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            Err(GenerationError::ServerError("model crashed".to_string()))
        }
    }

    /// Answers after a delay.
    struct Slow(Duration);

    #[async_trait]
    impl Generator for Slow {
        async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
            tokio::time::sleep(self.0).await;
            Ok(prompt.to_string())
        }
    }

    /// Vocabulary embedder whose batch calls take a while.
    struct SlowBatch(VocabEmbedder);

    #[async_trait]
    impl Embedder for SlowBatch {
        async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
            self.0.embed(text).await
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                out.push(self.0.embed(text).await?);
            }
            Ok(out)
        }
    }

    fn options() -> SessionOptions {
        SessionOptions {
            chunk_size: 12,
            chunk_overlap: 4,
            top_k: 2,
            ..SessionOptions::default()
        }
    }

    fn session(embedder: Arc<dyn Embedder>, generator: Arc<dyn Generator>) -> Session {
        Session::new(options(), embedder, generator).unwrap()
    }

    fn vocab() -> Arc<VocabEmbedder> {
        Arc::new(VocabEmbedder::new(&["the", "cat", "sat", "dog", "ran"]))
    }

    #[test]
    fn test_invalid_options_rejected() {
        let bad = SessionOptions {
            chunk_size: 4,
            chunk_overlap: 4,
            ..SessionOptions::default()
        };
        assert!(Session::new(bad, vocab(), Arc::new(Echo)).is_err());

        let bad = SessionOptions {
            top_k: 0,
            ..SessionOptions::default()
        };
        assert!(Session::new(bad, vocab(), Arc::new(Echo)).is_err());
    }

    #[test]
    fn test_zero_timeout_disables_limit() {
        let mut config = Config::default();
        assert_eq!(
            SessionOptions::from_config(&config).generation_timeout,
            Some(Duration::from_secs(300))
        );
        config.generation.timeout_secs = Some(0);
        assert_eq!(SessionOptions::from_config(&config).generation_timeout, None);
    }

    #[tokio::test]
    async fn test_ingest_and_ask() {
        let session = session(vocab(), Arc::new(Echo));
        let report = session
            .ingest("pets.txt", b"The cat sat. The dog ran.")
            .await
            .unwrap();
        assert_eq!(report.chunks, 3);
        assert_eq!(report.dimension, Some(5));
        assert!(!report.skipped);

        let answer = session.ask("Where did the cat sit?").await.unwrap();
        assert_eq!(answer.retrieval.hits[0].chunk.text, "The cat sat.");
        assert!(answer.used_context());
        assert!(answer.text.starts_with("Use the following context"));
        assert_eq!(session.state(), TurnState::AwaitingInput);

        let log = session.conversation().await;
        let roles: Vec<_> = log.turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn test_ask_without_documents_falls_back() {
        let embedder = vocab();
        let session = session(embedder.clone(), Arc::new(Echo));
        let answer = session.ask("What is a cat?").await.unwrap();
        assert_eq!(answer.text, "What is a cat?");
        assert!(!answer.used_context());
        // nothing to search, so the question is never embedded
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_duplicate_upload_skipped() {
        let session = session(vocab(), Arc::new(Echo));
        session.ingest("a.txt", b"The cat sat.").await.unwrap();
        let again = session.ingest("copy.txt", b"The cat sat.").await.unwrap();
        assert!(again.skipped);
        assert_eq!(again.total_chunks, 1);
        assert_eq!(session.stats().await.documents.len(), 1);
    }

    #[tokio::test]
    async fn test_uploads_are_additive() {
        let session = session(vocab(), Arc::new(Echo));
        session.ingest("a.txt", b"The cat sat.").await.unwrap();
        let report = session.ingest("b.txt", b"The dog ran.").await.unwrap();
        assert_eq!(report.total_chunks, 2);
    }

    #[tokio::test]
    async fn test_replace_mode_rebuilds_index() {
        let options = SessionOptions {
            ingest_mode: IngestMode::Replace,
            ..options()
        };
        let session = Session::new(options, vocab(), Arc::new(Echo)).unwrap();
        session.ingest("a.txt", b"The cat sat.").await.unwrap();
        let report = session.ingest("b.txt", b"The dog ran.").await.unwrap();
        assert_eq!(report.total_chunks, 1);
        let stats = session.stats().await;
        assert_eq!(stats.documents.len(), 1);
        assert_eq!(stats.documents[0].id, "b.txt");
    }

    #[tokio::test]
    async fn test_failed_ingestion_preserves_index() {
        let session = session(Arc::new(FixedDim(3)), Arc::new(Echo));
        session.ingest("a.txt", b"first document").await.unwrap();
        let before = session.stats().await;

        let other = Session::new(options(), Arc::new(Unreachable), Arc::new(Echo)).unwrap();
        let err = other.ingest("b.txt", b"second").await.unwrap_err();
        assert!(matches!(err, PipelineError::IngestionFailure { .. }));
        assert_eq!(other.stats().await.chunks, 0);

        let err = session.ingest("c.txt", &[0u8, 159, 146, 150]).await.unwrap_err();
        assert!(matches!(err, PipelineError::IngestionFailure { .. }));
        let after = session.stats().await;
        assert_eq!(after.chunks, before.chunks);
        assert_eq!(after.documents.len(), before.documents.len());
    }

    #[tokio::test]
    async fn test_dimension_change_is_ingestion_failure() {
        let first = Arc::new(FixedDim(3));
        let session = session(first, Arc::new(Echo));
        session.ingest("a.txt", b"alpha").await.unwrap();

        // same session state, embedder now disagrees
        let swapped = Session {
            embedder: Arc::new(FixedDim(4)),
            ..session
        };
        let err = swapped.ingest("b.txt", b"beta").await.unwrap_err();
        match err {
            PipelineError::IngestionFailure { source, .. } => assert!(matches!(
                *source,
                PipelineError::DimensionMismatch {
                    expected: 3,
                    actual: 4
                }
            )),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(swapped.stats().await.chunks, 1);
    }

    #[tokio::test]
    async fn test_empty_document_rejected() {
        let session = session(vocab(), Arc::new(Echo));
        let err = session.ingest("blank.txt", b"").await.unwrap_err();
        match err {
            PipelineError::IngestionFailure { source, .. } => assert!(matches!(
                *source,
                PipelineError::Extraction(ExtractionError::EmptyDocument(_))
            )),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generation_failure_state_and_log() {
        let session = session(vocab(), Arc::new(Broken));
        let err = session.ask("anything?").await.unwrap_err();
        assert!(matches!(err, PipelineError::GenerationFailure(_)));
        assert_eq!(session.state(), TurnState::ErrorDisplayed);

        let log = session.conversation().await;
        assert_eq!(log.len(), 1);
        assert_eq!(log.turns()[0].role, Role::User);

        session.acknowledge_error();
        assert_eq!(session.state(), TurnState::AwaitingInput);
    }

    #[tokio::test]
    async fn test_busy_while_processing() {
        let session = session(vocab(), Arc::new(Echo));
        session.state.send_replace(TurnState::Processing);
        assert!(matches!(
            session.ask("hello?").await,
            Err(PipelineError::SessionBusy)
        ));
        assert!(session.conversation().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_question_releases_session() {
        let options = SessionOptions {
            generation_timeout: None,
            ..options()
        };
        let session =
            Session::new(options, vocab(), Arc::new(Slow(Duration::from_secs(60)))).unwrap();

        let abandoned =
            tokio::time::timeout(Duration::from_secs(1), session.ask("first?")).await;
        assert!(abandoned.is_err());
        assert_eq!(session.state(), TurnState::AwaitingInput);

        let second = session.ask("second?").await.unwrap();
        assert_eq!(second.text, "second?");
        assert_eq!(session.state(), TurnState::AwaitingInput);
    }

    #[tokio::test(start_paused = true)]
    async fn test_question_waits_for_running_upload() {
        let embedder = Arc::new(SlowBatch(VocabEmbedder::new(&["the", "cat", "sat"])));
        let session = session(embedder, Arc::new(Echo));

        let (report, answer) = tokio::join!(session.ingest("pets.txt", b"The cat sat."), async {
            tokio::task::yield_now().await;
            let mut rx = session.subscribe();
            let answer = session.ask("cat sat?");
            tokio::pin!(answer);
            // the upload still holds the index, so the question only waits
            tokio::select! {
                _ = &mut answer => panic!("question finished before the upload"),
                _ = rx.wait_for(|s| *s == TurnState::Processing) => {}
            }
            assert!(session.inner.try_lock().is_err());
            answer.await
        });

        assert_eq!(report.unwrap().chunks, 1);
        let answer = answer.unwrap();
        assert!(answer.used_context());
        let log = session.conversation().await;
        assert_eq!(log.len(), 2);
        assert_eq!(session.state(), TurnState::AwaitingInput);
    }

    #[tokio::test]
    async fn test_store_restores_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        let first = session(vocab(), Arc::new(Echo)).with_store(IndexStore::new(&path, "vocab"));
        first.ingest("pets.txt", b"The cat sat. The dog ran.").await.unwrap();
        drop(first);

        let second = session(vocab(), Arc::new(Echo)).with_store(IndexStore::new(&path, "vocab"));
        let stats = second.stats().await;
        assert_eq!(stats.documents.len(), 1);
        assert_eq!(stats.chunks, 3);
        let answer = second.ask("Where did the cat sit?").await.unwrap();
        assert_eq!(answer.retrieval.hits[0].chunk.text, "The cat sat.");

        // same content again is still recognised after the restart
        let again = second.ingest("copy.txt", b"The cat sat. The dog ran.").await.unwrap();
        assert!(again.skipped);

        second.reset_index().await;
        let third = session(vocab(), Arc::new(Echo)).with_store(IndexStore::new(&path, "vocab"));
        assert_eq!(third.stats().await.chunks, 0);
    }

    #[tokio::test]
    async fn test_unreadable_store_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, "garbage").unwrap();

        let session = session(vocab(), Arc::new(Echo)).with_store(IndexStore::new(&path, "vocab"));
        assert_eq!(session.stats().await.chunks, 0);
        session.ingest("a.txt", b"The cat sat.").await.unwrap();

        let reloaded = IndexStore::new(&path, "vocab").load().unwrap();
        assert_eq!(reloaded.documents.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_upload_leaves_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let session = session(vocab(), Arc::new(Echo)).with_store(IndexStore::new(&path, "vocab"));
        session.ingest("a.txt", b"The cat sat.").await.unwrap();
        let saved = std::fs::read(&path).unwrap();

        assert!(session.ingest("blank.txt", b"").await.is_err());
        assert_eq!(std::fs::read(&path).unwrap(), saved);
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let session = session(vocab(), Arc::new(Echo));
        assert!(matches!(
            session.ask("   ").await,
            Err(PipelineError::InvalidConfig(_))
        ));
        assert_eq!(session.state(), TurnState::AwaitingInput);
    }

    #[tokio::test]
    async fn test_state_is_published() {
        let session = session(vocab(), Arc::new(Echo));
        let mut rx = session.subscribe();
        session.ask("hello?").await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), TurnState::AwaitingInput);
    }

    #[tokio::test]
    async fn test_reset_index() {
        let session = session(vocab(), Arc::new(Echo));
        session.ingest("a.txt", b"The cat sat.").await.unwrap();
        session.reset_index().await;
        let stats = session.stats().await;
        assert_eq!(stats.chunks, 0);
        assert!(stats.documents.is_empty());
        assert_eq!(stats.dimension, None);

        let answer = session.ask("cat?").await.unwrap();
        assert_eq!(answer.text, "cat?");
    }

    #[tokio::test]
    async fn test_retrieve_only() {
        let session = session(vocab(), Arc::new(Broken));
        session
            .ingest("pets.txt", b"The cat sat. The dog ran.")
            .await
            .unwrap();
        let result = session.retrieve("dog ran", 1).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.hits[0].chunk.text, " dog ran.");
        assert!(session.conversation().await.is_empty());
    }
}
