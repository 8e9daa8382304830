use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::indexer::chunker::ChunkType;
use crate::indexer::languages::Language;
use crate::indexer::record::ChunkRecord;

#[derive(Debug, Clone, Serialize)]
pub struct StoredDocument {
    pub path: String,
    pub modified_at: DateTime<Utc>,
    pub indexed_at: DateTime<Utc>,
    pub chunk_count: usize,
}

/// What an upsert did to the records of one document.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpsertStats {
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub record: ChunkRecord,
    /// `1 - cosine_distance / 2`, in `[0, 1]`.
    pub similarity: f64,
}

/// Metadata restrictions applied to a vector search. Empty matches everything.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_type: Option<ChunkType>,

    /// Directory or file path; matches itself and everything below it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,

    /// Filename glob (`*.rs`, `test_?.py`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_pattern: Option<String>,
}

impl MetadataFilter {
    pub fn is_empty(&self) -> bool {
        self.language.is_none()
            && self.chunk_type.is_none()
            && self.path_prefix.is_none()
            && self.file_pattern.is_none()
    }

    /// Fields set on `other` win over the ones set here.
    #[must_use]
    pub fn merged(&self, other: &MetadataFilter) -> MetadataFilter {
        MetadataFilter {
            language: other.language.or(self.language),
            chunk_type: other.chunk_type.or(self.chunk_type),
            path_prefix: other.path_prefix.clone().or_else(|| self.path_prefix.clone()),
            file_pattern: other
                .file_pattern
                .clone()
                .or_else(|| self.file_pattern.clone()),
        }
    }
}
