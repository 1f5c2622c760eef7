pub mod answer;
pub mod chunker;
pub mod embedding;
pub mod extract;
pub mod generation;
mod metrics;
mod ollama;
pub mod retriever;
pub mod store;
pub mod vector_index;

pub use answer::{AnswerEngine, CONTEXT_DELIMITER, build_prompt};
pub use chunker::{TextChunker, expected_chunk_count, split};
pub use embedding::{Embedder, OllamaEmbedder};
pub use extract::{DocumentExtractor, PdfExtractor, PlainTextExtractor, TextExtractor, normalize_text};
pub use generation::{Generator, OllamaGenerator};
pub use metrics::{AnswerOutcome, MetricsStore, MetricsSummary};
pub use retriever::Retriever;
pub use store::{IndexStore, StoredIndex};
pub use vector_index::{IndexEntry, IndexState, VectorIndex, cosine_similarity};
