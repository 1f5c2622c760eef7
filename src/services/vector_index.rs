//! In-memory, append-only vector index with cosine similarity search.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PipelineError;
use crate::models::{Chunk, Embedding, RetrievalResult, ScoredChunk};

/// A chunk together with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Embedding,
}

/// Brute-force nearest-neighbour index.
///
/// The first insert fixes the embedding dimension for the lifetime of the
/// index. Entries are never updated or removed; rebuilding means dropping the
/// index and creating a new one.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    dimension: Option<usize>,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild an index from previously stored entries.
    pub fn from_entries(entries: Vec<IndexEntry>) -> Result<Self, PipelineError> {
        let mut index = Self::new();
        index.insert(
            entries
                .into_iter()
                .map(|entry| (entry.chunk, entry.embedding))
                .collect(),
        )?;
        Ok(index)
    }

    /// Dimension established by the first insert.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Append entries. Either the whole batch is stored or none of it.
    pub fn insert(&mut self, entries: Vec<(Chunk, Embedding)>) -> Result<(), PipelineError> {
        let Some(first) = entries.first() else {
            return Ok(());
        };

        let expected = match self.dimension {
            Some(dim) => dim,
            None if first.1.is_empty() => {
                return Err(PipelineError::InvalidConfig(
                    "embeddings must not be empty".to_string(),
                ));
            }
            None => first.1.len(),
        };

        if let Some((_, bad)) = entries.iter().find(|(_, e)| e.len() != expected) {
            return Err(PipelineError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }

        self.dimension = Some(expected);
        let count = entries.len();
        self.entries.extend(
            entries
                .into_iter()
                .map(|(chunk, embedding)| IndexEntry { chunk, embedding }),
        );
        debug!(added = count, total = self.entries.len(), dim = expected, "index insert");
        Ok(())
    }

    /// Return up to `top_k` entries by descending cosine similarity.
    ///
    /// Equal scores keep insertion order.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<RetrievalResult, PipelineError> {
        if top_k == 0 {
            return Err(PipelineError::InvalidConfig(
                "top_k must be at least 1".to_string(),
            ));
        }

        let Some(dimension) = self.dimension else {
            return Ok(RetrievalResult::empty());
        };

        if query.len() != dimension {
            return Err(PipelineError::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_similarity(query, &entry.embedding)))
            .collect();

        // sort_by is stable, so ties stay in insertion order
        scored.sort_by(|a, b| descending(a.1, b.1));
        scored.truncate(top_k);

        let hits = scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect();

        Ok(RetrievalResult::new(hits))
    }
}

/// Whether a session has built an index yet.
#[derive(Debug, Clone, Default)]
pub enum IndexState {
    #[default]
    Empty,
    Populated(VectorIndex),
}

impl IndexState {
    pub fn index(&self) -> Option<&VectorIndex> {
        match self {
            IndexState::Empty => None,
            IndexState::Populated(index) => Some(index),
        }
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.index().map_or(0, VectorIndex::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn descending(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// Cosine similarity of two equal-length vectors; 0 when either norm is 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}
