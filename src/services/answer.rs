//! Prompt assembly and answer generation.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::models::RetrievalResult;
use crate::services::generation::Generator;

/// Separator placed between retrieved chunks in the context block.
pub const CONTEXT_DELIMITER: &str = "\n\n";

/// Build the prompt sent to the generator.
///
/// With no retrieved chunks the question itself is the prompt.
pub fn build_prompt(question: &str, retrieval: &RetrievalResult) -> String {
    if retrieval.is_empty() {
        return question.to_string();
    }

    let context = retrieval
        .iter()
        .map(|hit| hit.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_DELIMITER);

    format!(
        "Use the following context to answer the question.\nContext:\n{context}\nQuestion: {question}\nAnswer:"
    )
}

/// Turns a question and its retrieved context into an answer.
#[derive(Debug, Clone, Default)]
pub struct AnswerEngine {
    timeout: Option<Duration>,
}

impl AnswerEngine {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Generate an answer. The generator's output is returned unmodified.
    pub async fn answer(
        &self,
        question: &str,
        retrieval: &RetrievalResult,
        generator: &dyn Generator,
    ) -> Result<String, PipelineError> {
        let prompt = build_prompt(question, retrieval);
        debug!(
            context_chunks = retrieval.len(),
            prompt_chars = prompt.chars().count(),
            "generating answer"
        );

        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, generator.generate(&prompt))
                .await
                .map_err(|_| {
                    warn!(timeout_secs = limit.as_secs(), "generation timed out");
                    PipelineError::GenerationTimeout(limit)
                })?,
            None => generator.generate(&prompt).await,
        };

        result.map_err(|e| {
            warn!(error = %e, "generation failed");
            PipelineError::GenerationFailure(e)
        })
    }
}
