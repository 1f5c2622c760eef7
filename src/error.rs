//! Error types for the document Q&A pipeline.

use std::time::Duration;

use thiserror::Error;

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to connect to embedding server: {0}")]
    ConnectionError(String),

    #[error("embedding server error: {0}")]
    ServerError(String),

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding timeout")]
    Timeout,
}

/// Errors reported by a generation backend.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("failed to connect to generation server: {0}")]
    ConnectionError(String),

    #[error("generation server error: {0}")]
    ServerError(String),

    #[error("generation request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid generation response: {0}")]
    InvalidResponse(String),
}

/// Errors related to turning uploaded bytes into text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("document is not valid UTF-8 text: {0}")]
    InvalidEncoding(String),

    #[error("document exceeds maximum size: {size} > {max}")]
    TooLarge { size: u64, max: u64 },

    #[error("document contains no text: {0}")]
    EmptyDocument(String),

    #[error("could not parse document: {0}")]
    Malformed(String),
}

/// Errors related to the on-disk index.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("index file is corrupt: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("unsupported index file version {0}")]
    UnsupportedVersion(u32),

    #[error("stored index is inconsistent: {0}")]
    Inconsistent(String),
}

/// Errors produced by the retrieval-augmented answering pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("generation failed: {0}")]
    GenerationFailure(#[source] GenerationError),

    #[error("generation timed out after {}s", .0.as_secs())]
    GenerationTimeout(Duration),

    #[error("failed to ingest {document}: {source}")]
    IngestionFailure {
        document: String,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("a question is already being processed")]
    SessionBusy,
}

impl PipelineError {
    /// Wrap an error raised while ingesting `document`.
    pub fn ingestion(document: impl Into<String>, source: PipelineError) -> Self {
        PipelineError::IngestionFailure {
            document: document.into(),
            source: Box::new(source),
        }
    }

    /// Whether the error came from the generation step.
    pub fn is_generation(&self) -> bool {
        matches!(
            self,
            PipelineError::GenerationFailure(_) | PipelineError::GenerationTimeout(_)
        )
    }

    /// Short message suitable for showing to the person asking.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::InvalidConfig(msg) => format!("Invalid settings: {msg}"),
            PipelineError::DimensionMismatch { .. } => {
                "The embedding model does not match the indexed documents. Reset the index and upload again."
                    .to_string()
            }
            PipelineError::GenerationFailure(_) => {
                "The language model failed to produce an answer.".to_string()
            }
            PipelineError::GenerationTimeout(limit) => format!(
                "The language model did not answer within {}s.",
                limit.as_secs()
            ),
            PipelineError::IngestionFailure { document, source } => {
                format!("Error processing {document}: {source}")
            }
            PipelineError::Embedding(_) => "Could not reach the embedding model.".to_string(),
            PipelineError::Extraction(e) => format!("Could not read document: {e}"),
            PipelineError::SessionBusy => "Still thinking about the previous question.".to_string(),
        }
    }
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingestion_failure_keeps_cause() {
        let err = PipelineError::ingestion(
            "notes.txt",
            PipelineError::DimensionMismatch {
                expected: 3,
                actual: 4,
            },
        );
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(
            source.as_deref(),
            Some("embedding dimension mismatch: expected 3, got 4")
        );
        assert!(err.user_message().contains("notes.txt"));
    }

    #[test]
    fn test_generation_kinds() {
        let timeout = PipelineError::GenerationTimeout(Duration::from_secs(5));
        assert!(timeout.is_generation());
        assert_eq!(timeout.to_string(), "generation timed out after 5s");
        assert!(!PipelineError::SessionBusy.is_generation());
        let failure =
            PipelineError::GenerationFailure(GenerationError::ServerError("boom".to_string()));
        assert!(failure.is_generation());
    }
}
