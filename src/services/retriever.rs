//! Top-k retrieval on top of the vector index.

use crate::error::PipelineError;
use crate::models::{RetrievalConfig, RetrievalResult};
use crate::services::vector_index::{IndexState, VectorIndex};

#[derive(Debug, Clone, Default)]
pub struct Retriever {
    min_score: Option<f32>,
}

impl Retriever {
    pub fn new(min_score: Option<f32>) -> Self {
        Self { min_score }
    }

    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self::new(config.min_score)
    }

    /// Search `index` for the `top_k` chunks closest to `query_vector`.
    pub fn retrieve(
        &self,
        index: &VectorIndex,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<RetrievalResult, PipelineError> {
        if top_k == 0 {
            return Err(PipelineError::InvalidConfig(
                "top_k must be at least 1".to_string(),
            ));
        }

        let result = index.search(query_vector, top_k)?;
        Ok(match self.min_score {
            Some(min) => result.with_min_score(min),
            None => result,
        })
    }

    /// Like [`Retriever::retrieve`], treating an unbuilt index as empty.
    pub fn retrieve_from(
        &self,
        state: &IndexState,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<RetrievalResult, PipelineError> {
        match state {
            IndexState::Populated(index) => self.retrieve(index, query_vector, top_k),
            IndexState::Empty if top_k == 0 => Err(PipelineError::InvalidConfig(
                "top_k must be at least 1".to_string(),
            )),
            IndexState::Empty => Ok(RetrievalResult::empty()),
        }
    }
}
