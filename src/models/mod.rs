mod config;
mod conversation;
mod document;
mod search;

pub use config::{
    ChunkingConfig, Config, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_MODEL,
    DEFAULT_OLLAMA_URL, DEFAULT_TOP_K, EmbeddingConfig, GenerationConfig, IngestMode,
    IngestionConfig, MetricsConfig, OutputConfig, RetrievalConfig, StorageConfig,
};
pub use conversation::{ConversationLog, ConversationTurn, Role, TurnState};
pub use document::{Chunk, Document, Embedding, IngestedDocument};
pub use search::{OutputFormat, Query, RetrievalResult, ScoredChunk};
