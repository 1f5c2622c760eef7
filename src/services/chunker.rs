//! Fixed-size text chunking with overlap.

use crate::error::PipelineError;
use crate::models::{Chunk, ChunkingConfig, Document};

/// Splits documents into overlapping chunks of at most `chunk_size` chars.
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Create a chunker, failing unless `0 <= overlap < chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, PipelineError> {
        if chunk_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(PipelineError::InvalidConfig(format!(
                "overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self, PipelineError> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Chunk a document into overlapping segments.
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        let chars: Vec<char> = document.content.chars().collect();
        let total = chars.len();
        let step = self.chunk_size - self.overlap;

        let mut chunks = Vec::with_capacity(expected_chunk_count(total, self.chunk_size, self.overlap));
        let mut start = 0;

        while start < total {
            let end = (start + self.chunk_size).min(total);
            let text: String = chars[start..end].iter().collect();
            chunks.push(Chunk::new(document, chunks.len() as u32, start, end, text));

            if end == total {
                break;
            }
            start += step;
        }

        chunks
    }
}

/// Split with explicit parameters.
pub fn split(
    document: &Document,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, PipelineError> {
    Ok(TextChunker::new(chunk_size, overlap)?.split(document))
}

/// Number of chunks `split` produces for a text of `len` chars.
pub fn expected_chunk_count(len: usize, chunk_size: usize, overlap: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let step = chunk_size - overlap;
    len.saturating_sub(overlap).div_ceil(step).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(content: &str) -> Document {
        Document::new("test.txt", content.to_string())
    }

    fn reconstruct(chunks: &[Chunk], overlap: usize) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let skip = if i == 0 { 0 } else { overlap };
            out.extend(chunk.text.chars().skip(skip));
        }
        out
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        assert!(matches!(
            TextChunker::new(0, 0),
            Err(PipelineError::InvalidConfig(_))
        ));
        assert!(matches!(
            TextChunker::new(10, 10),
            Err(PipelineError::InvalidConfig(_))
        ));
        assert!(TextChunker::new(10, 9).is_ok());
        assert!(TextChunker::new(1, 0).is_ok());
    }

    #[test]
    fn test_small_document_single_chunk() {
        let chunks = split(&doc("Hello, world!"), 100, 20).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks[0].end_offset, 13);
    }

    #[test]
    fn test_empty_document() {
        assert!(split(&doc(""), 10, 2).unwrap().is_empty());
    }

    #[test]
    fn test_known_boundaries() {
        let chunks = split(&doc("The cat sat. The dog ran."), 12, 4).unwrap();
        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["The cat sat.", "sat. The dog", " dog ran."]);

        let offsets: Vec<_> = chunks
            .iter()
            .map(|c| (c.start_offset, c.end_offset))
            .collect();
        assert_eq!(offsets, vec![(0, 12), (8, 20), (16, 25)]);
    }

    #[test]
    fn test_length_equal_to_chunk_size_is_one_chunk() {
        let chunks = split(&doc("abcdefghijkl"), 12, 4).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(expected_chunk_count(12, 12, 4), 1);

        let chunks = split(&doc("abcdefghijklm"), 12, 4).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(expected_chunk_count(13, 12, 4), 2);
    }

    #[test]
    fn test_reconstruction_and_count() {
        let text = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. \
                    Sed do eiusmod tempor incididunt ut labore et dolore magna aliqua.";
        let len = text.chars().count();
        for (size, overlap) in [(1, 0), (5, 0), (7, 3), (16, 15), (50, 10), (200, 50)] {
            let chunks = split(&doc(text), size, overlap).unwrap();
            assert_eq!(reconstruct(&chunks, overlap), text, "size={size} overlap={overlap}");
            assert_eq!(chunks.len(), expected_chunk_count(len, size, overlap));
            for chunk in &chunks {
                assert!(chunk.len() <= size);
            }
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let chunks = split(&doc(&"abcdefghij".repeat(5)), 10, 3).unwrap();
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].start_offset, pair[0].end_offset - 3);
            let tail: String = pair[0].text.chars().skip(7).collect();
            let head: String = pair[1].text.chars().take(3).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn test_multibyte_offsets_are_chars() {
        let chunks = split(&doc("héllo wörld ünïcode"), 6, 2).unwrap();
        assert_eq!(chunks[0].text, "héllo ");
        assert_eq!(chunks[1].start_offset, 4);
        assert_eq!(reconstruct(&chunks, 2), "héllo wörld ünïcode");
    }

    #[test]
    fn test_deterministic() {
        let d = doc("some repeated text that will be chunked more than once");
        let a = split(&d, 9, 2).unwrap();
        let b = split(&d, 9, 2).unwrap();
        assert_eq!(a, b);
        for (i, chunk) in a.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i as u32);
            assert_eq!(chunk.document_id, "test.txt");
        }
    }
}
