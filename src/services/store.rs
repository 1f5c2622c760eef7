//! Index snapshot kept on disk between runs.
//!
//! The snapshot is a single JSON file holding the indexed chunks, their
//! embeddings and the documents they came from. It is tied to the embedding
//! model that produced it; a snapshot from another model is ignored.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::models::IngestedDocument;
use crate::services::vector_index::{IndexEntry, IndexState, VectorIndex};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    model: &'a str,
    documents: &'a [IngestedDocument],
    entries: &'a [IndexEntry],
}

#[derive(Deserialize)]
struct Snapshot {
    version: u32,
    model: String,
    documents: Vec<IngestedDocument>,
    entries: Vec<IndexEntry>,
}

/// Contents of a loaded snapshot.
#[derive(Debug, Default)]
pub struct StoredIndex {
    pub index: IndexState,
    pub documents: Vec<IngestedDocument>,
}

#[derive(Debug, Clone)]
pub struct IndexStore {
    path: PathBuf,
    model: String,
}

impl IndexStore {
    pub fn new(path: impl Into<PathBuf>, model: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            model: model.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot. A missing file is an empty index.
    pub fn load(&self) -> Result<StoredIndex, StoreError> {
        if !self.path.exists() {
            return Ok(StoredIndex::default());
        }

        let content = fs::read_to_string(&self.path)?;
        let snapshot: Snapshot = serde_json::from_str(&content)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StoreError::UnsupportedVersion(snapshot.version));
        }
        if snapshot.model != self.model {
            warn!(
                stored = %snapshot.model,
                current = %self.model,
                "stored index was built with another embedding model, ignoring it"
            );
            return Ok(StoredIndex::default());
        }

        let indexed: usize = snapshot.documents.iter().map(|d| d.chunks).sum();
        if indexed != snapshot.entries.len() {
            return Err(StoreError::Inconsistent(format!(
                "documents list {} chunks, file holds {}",
                indexed,
                snapshot.entries.len()
            )));
        }

        let index = if snapshot.entries.is_empty() {
            IndexState::Empty
        } else {
            let index = VectorIndex::from_entries(snapshot.entries)
                .map_err(|e| StoreError::Inconsistent(e.to_string()))?;
            IndexState::Populated(index)
        };
        debug!(
            path = %self.path.display(),
            documents = snapshot.documents.len(),
            chunks = index.len(),
            "loaded stored index"
        );

        Ok(StoredIndex {
            index,
            documents: snapshot.documents,
        })
    }

    /// Write the snapshot, replacing the previous file in one rename.
    pub fn save(&self, index: &IndexState, documents: &[IngestedDocument]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let snapshot = SnapshotRef {
            version: SNAPSHOT_VERSION,
            model: &self.model,
            documents,
            entries: index.index().map(VectorIndex::entries).unwrap_or_default(),
        };
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(&snapshot)?)?;
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), chunks = index.len(), "saved index");
        Ok(())
    }
}
