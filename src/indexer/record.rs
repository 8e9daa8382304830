//! ChunkRecord construction and natural-key identity.
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::chunker::{Chunk, ChunkType};
use super::languages::Language;
use super::reader::SourceFile;

/// Natural key of a record: the same path and line range always name the
/// same record, across runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId {
    pub path: String,
    pub line_start: usize,
    pub line_end: usize,
}

impl RecordId {
    pub fn new(path: impl Into<String>, line_start: usize, line_end: usize) -> Self {
        Self {
            path: path.into(),
            line_start,
            line_end,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.path, self.line_start, self.line_end)
    }
}

/// Metadata stored and filtered alongside every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub path: String,
    pub filename: String,
    pub language: Language,
    pub chunk_type: ChunkType,
    pub line_start: usize,
    pub line_end: usize,
}

/// A chunk plus provenance; the unit handed to the vector store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub metadata: ChunkMetadata,
    pub text: String,
}

impl ChunkRecord {
    pub fn id(&self) -> RecordId {
        RecordId::new(
            self.metadata.path.clone(),
            self.metadata.line_start,
            self.metadata.line_end,
        )
    }

    /// `filename:start-end`
    pub fn citation(&self) -> String {
        format!(
            "{}:{}-{}",
            self.metadata.filename, self.metadata.line_start, self.metadata.line_end
        )
    }

    /// `[filename:start-end]`, the inline form used in answers.
    pub fn cite(&self) -> String {
        format!("[{}]", self.citation())
    }

    /// Text sent to the embedder: a short provenance header, then the code.
    pub fn embedding_text(&self) -> String {
        format!(
            "{} {}:{}-{}\n{}",
            self.metadata.language,
            self.metadata.path,
            self.metadata.line_start,
            self.metadata.line_end,
            self.text
        )
    }
}

/// Build one record per chunk, re-slicing the text from the source lines.
pub fn build_records(source: &SourceFile, chunks: &[Chunk<'_>]) -> Vec<ChunkRecord> {
    let filename = source.filename().to_string();
    chunks
        .iter()
        .map(|chunk| ChunkRecord {
            metadata: ChunkMetadata {
                path: source.path.clone(),
                filename: filename.clone(),
                language: source.language,
                chunk_type: chunk.chunk_type,
                line_start: chunk.line_start,
                line_end: chunk.line_end,
            },
            text: source.slice(chunk.line_start, chunk.line_end).to_string(),
        })
        .collect()
}

/// Records keyed by [`RecordId`], iterated in path/line order.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    records: BTreeMap<RecordId, ChunkRecord>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `record`, returning the one it replaced under the same key.
    pub fn insert(&mut self, record: ChunkRecord) -> Option<ChunkRecord> {
        self.records.insert(record.id(), record)
    }

    pub fn get(&self, id: &RecordId) -> Option<&ChunkRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &RecordId> {
        self.records.keys()
    }

    pub fn iter(&self) -> btree_map::Values<'_, RecordId, ChunkRecord> {
        self.records.values()
    }
}

impl FromIterator<ChunkRecord> for RecordSet {
    fn from_iter<I: IntoIterator<Item = ChunkRecord>>(iter: I) -> Self {
        let mut set = RecordSet::new();
        for record in iter {
            set.insert(record);
        }
        set
    }
}

impl IntoIterator for RecordSet {
    type Item = ChunkRecord;
    type IntoIter = btree_map::IntoValues<RecordId, ChunkRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_values()
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a ChunkRecord;
    type IntoIter = btree_map::Values<'a, RecordId, ChunkRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.values()
    }
}
