use serde::{Deserialize, Serialize};

use crate::utils::calculate_checksum;

/// Dense vector produced by an embedder for a single text.
pub type Embedding = Vec<f32>;

/// Extracted document text, immutable once ingested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Source identifier, usually the uploaded filename.
    pub id: String,
    pub content: String,
    pub checksum: String,
    pub created_at: String,
}

/// Contiguous slice of a document. Offsets count chars, not bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: u32,
    pub start_offset: usize,
    pub end_offset: usize,
    pub text: String,
}

/// A document held by an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestedDocument {
    pub id: String,
    pub checksum: String,
    pub chunks: usize,
}

impl Document {
    pub fn new(id: impl Into<String>, content: String) -> Self {
        let checksum = calculate_checksum(&content);
        Self {
            id: id.into(),
            content,
            checksum,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Length of the content in chars.
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

impl Chunk {
    /// Ids differ between two versions of a document uploaded under one name.
    pub fn generate_id(document_id: &str, checksum: &str, chunk_index: u32) -> String {
        use uuid::Uuid;
        let name = format!("{}:{}:{}", document_id, checksum, chunk_index);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
    }

    pub fn new(
        document: &Document,
        chunk_index: u32,
        start_offset: usize,
        end_offset: usize,
        text: String,
    ) -> Self {
        Self {
            id: Self::generate_id(&document.id, &document.checksum, chunk_index),
            document_id: document.id.clone(),
            chunk_index,
            start_offset,
            end_offset,
            text,
        }
    }

    pub fn len(&self) -> usize {
        self.end_offset - self.start_offset
    }

    pub fn is_empty(&self) -> bool {
        self.end_offset == self.start_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_generate_id() {
        let id = Chunk::generate_id("report.txt", "abc", 5);
        assert_eq!(id.len(), 36);
        assert_eq!(id.chars().filter(|c| *c == '-').count(), 4);
        assert_eq!(id, Chunk::generate_id("report.txt", "abc", 5));
        assert_ne!(id, Chunk::generate_id("report.txt", "abc", 6));
        assert_ne!(id, Chunk::generate_id("other.txt", "abc", 5));
    }

    #[test]
    fn test_reuploaded_name_gets_new_chunk_ids() {
        let old = Document::new("notes.txt", "first draft".to_string());
        let new = Document::new("notes.txt", "second draft".to_string());
        let a = Chunk::new(&old, 0, 0, 5, "first".to_string());
        let b = Chunk::new(&new, 0, 0, 6, "second".to_string());
        assert_eq!(a.document_id, b.document_id);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_document_new() {
        let doc = Document::new("notes.md", "héllo".to_string());
        assert_eq!(doc.id, "notes.md");
        assert_eq!(doc.checksum.len(), 64);
        assert_eq!(doc.char_len(), 5);
        assert!(!doc.created_at.is_empty());
    }

    #[test]
    fn test_same_content_same_checksum() {
        let a = Document::new("a.txt", "same".to_string());
        let b = Document::new("b.txt", "same".to_string());
        assert_eq!(a.checksum, b.checksum);
    }
}
