//! Query and retrieval models.

use serde::{Deserialize, Serialize};

use super::document::Chunk;
use crate::error::PipelineError;

/// Output format for CLI results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
    /// Documentation-friendly Markdown format
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

/// A question together with how many chunks to retrieve for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub question: String,
    pub top_k: usize,
}

impl Query {
    /// Create a query, rejecting `top_k == 0`.
    pub fn new(question: impl Into<String>, top_k: usize) -> Result<Self, PipelineError> {
        if top_k == 0 {
            return Err(PipelineError::InvalidConfig(
                "top_k must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            question: question.into(),
            top_k,
        })
    }
}

/// A retrieved chunk and its similarity to the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Hits ordered by descending score.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub hits: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn new(hits: Vec<ScoredChunk>) -> Self {
        Self { hits }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoredChunk> {
        self.hits.iter()
    }

    /// Drop hits scoring below `min_score`.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.hits.retain(|hit| hit.score >= min_score);
        self
    }
}
