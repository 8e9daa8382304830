use crate::db::Db;
use crate::embedder::{Embedder, EmbedderError};
use crate::indexer::chunker::{BoundaryChunker, ChunkerConfig};
use crate::indexer::reader::{SourceFile, read_source, relative_key};
use crate::indexer::record::{ChunkRecord, RecordSet, build_records};
use crate::indexer::scan::{FileScanner, default_excludes};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Failures that abort a whole ingestion pass. Per-file problems never do.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("no files found under {0}")]
    NoFiles(PathBuf),

    #[error("invalid exclude pattern: {0}")]
    Pattern(#[from] globset::Error),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
}

#[derive(Error, Debug)]
enum FileError {
    #[error(transparent)]
    Embed(#[from] EmbedderError),

    #[error(transparent)]
    Store(#[from] rusqlite::Error),
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Files the scan produced.
    pub scanned: usize,
    pub indexed: usize,
    /// Modification time matched the stored one.
    pub unchanged: usize,
    /// Binary, undecodable, oversized or unreadable.
    pub unreadable: usize,
    /// Embedding or store failure.
    pub failed: usize,
    pub added: usize,
    pub updated: usize,
    /// Documents pruned because their file is gone.
    pub removed: usize,
    pub chunks: usize,
}

impl IngestReport {
    /// Files not (re)indexed on purpose: unchanged plus unreadable.
    pub fn skipped(&self) -> usize {
        self.unchanged + self.unreadable
    }
}

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub chunker: ChunkerConfig,
    pub exclude: Vec<String>,
    /// 0 disables the size guard.
    pub max_file_bytes: u64,
    /// Files never indexed even when they sit inside the repository, such
    /// as the store itself and the config file.
    pub skip_files: Vec<PathBuf>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            chunker: ChunkerConfig::default(),
            exclude: default_excludes(),
            max_file_bytes: 1024 * 1024,
            skip_files: Vec::new(),
        }
    }
}

pub struct Indexer<'a, E: Embedder + ?Sized> {
    pub db: &'a mut Db,
    pub embedder: &'a E,
    chunker: BoundaryChunker,
    scanner: FileScanner,
    max_file_bytes: u64,
}

impl<'a, E: Embedder + ?Sized> Indexer<'a, E> {
    pub fn new(db: &'a mut Db, embedder: &'a E, config: &IndexerConfig) -> Result<Self, IndexError> {
        Ok(Self {
            db,
            embedder,
            chunker: BoundaryChunker::new(config.chunker),
            scanner: FileScanner::new(&config.exclude)?.with_skipped_files(&config.skip_files),
            max_file_bytes: config.max_file_bytes,
        })
    }

    /// Index every file under `root` with differential sync.
    ///
    /// Files whose modification time matches the store are skipped unless
    /// `force`; documents whose files vanished are pruned.
    pub fn index_directory<P: AsRef<Path>>(
        &mut self,
        root: P,
        force: bool,
    ) -> Result<IngestReport, IndexError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(IndexError::NotADirectory(root.to_path_buf()));
        }

        let files = self.scanner.scan(root);
        if files.is_empty() {
            return Err(IndexError::NoFiles(root.to_path_buf()));
        }
        info!("Indexing {} files under {}", files.len(), root.display());

        let existing = self.db.list_documents()?;
        let mut seen = HashSet::with_capacity(files.len());
        let mut report = IngestReport {
            scanned: files.len(),
            ..Default::default()
        };

        for path in &files {
            let key = relative_key(root, path);

            let mod_time: DateTime<Utc> = match fs::metadata(path).and_then(|m| m.modified()) {
                Ok(t) => t.into(),
                Err(e) => {
                    warn!("Skipping {key}: {e}");
                    report.unreadable += 1;
                    continue;
                }
            };

            let previous = existing.get(&key);
            if let Some(stored) = previous {
                if !force && stored.timestamp() == mod_time.timestamp() {
                    seen.insert(key);
                    report.unchanged += 1;
                    continue;
                }
            }

            let source = match read_source(root, path, self.max_file_bytes) {
                Ok(source) => source,
                Err(e) => {
                    warn!("Skipping {key}: {e}");
                    report.unreadable += 1;
                    continue;
                }
            };
            seen.insert(key);

            match self.index_source(&source, mod_time) {
                Ok(chunks) => {
                    report.indexed += 1;
                    report.chunks += chunks;
                    if previous.is_some() {
                        report.updated += 1;
                    } else {
                        report.added += 1;
                    }
                }
                Err(e) => {
                    error!("Failed to index {}: {e}", source.path);
                    report.failed += 1;
                }
            }
        }

        for path in existing.keys() {
            if !seen.contains(path) && self.db.delete_document(path)? {
                info!("Removed {path}");
                report.removed += 1;
            }
        }

        info!(
            "Indexed {} files ({} chunks), skipped {}, failed {}, removed {}",
            report.indexed,
            report.chunks,
            report.skipped(),
            report.failed,
            report.removed
        );
        Ok(report)
    }

    /// Chunk, embed and store one file; returns its chunk count.
    fn index_source(
        &mut self,
        source: &SourceFile,
        mod_time: DateTime<Utc>,
    ) -> Result<usize, FileError> {
        let chunks = self.chunker.chunk_source(source);
        let records = unique_records(&source.path, build_records(source, &chunks));

        let texts: Vec<String> = records.iter().map(ChunkRecord::embedding_text).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let vectors = if refs.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed_batch(&refs)?
        };

        let stats = self
            .db
            .upsert_document(&source.path, mod_time, &records, &vectors)?;
        debug!(
            "{}: {} chunks ({} new, {} updated, {} removed)",
            source.path,
            records.len(),
            stats.inserted,
            stats.updated,
            stats.removed
        );
        Ok(records.len())
    }
}

/// One record per line range, in line order.
fn unique_records(path: &str, records: Vec<ChunkRecord>) -> Vec<ChunkRecord> {
    let produced = records.len();
    let set: RecordSet = records.into_iter().collect();
    if set.len() < produced {
        warn!("{path}: dropped {} records with a repeated line range", produced - set.len());
    }
    set.into_iter().collect()
}
