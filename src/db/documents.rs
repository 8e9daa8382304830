use super::{Db, models::*, serialize_vector};
use crate::indexer::chunker::ChunkType;
use crate::indexer::languages::Language;
use crate::indexer::record::{ChunkMetadata, ChunkRecord};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Result, Row, params};
use std::collections::HashMap;

pub(crate) const RECORD_COLUMNS: &str =
    "c.path, c.filename, c.language, c.chunk_type, c.line_start, c.line_end, c.content";

/// Map the seven [`RECORD_COLUMNS`] at the front of `row`.
pub(crate) fn map_record(row: &Row<'_>) -> Result<ChunkRecord> {
    let language: String = row.get(2)?;
    let chunk_type: String = row.get(3)?;
    Ok(ChunkRecord {
        metadata: ChunkMetadata {
            path: row.get(0)?,
            filename: row.get(1)?,
            language: Language::from_name(&language).unwrap_or(Language::Text),
            chunk_type: ChunkType::from_name(&chunk_type).unwrap_or(ChunkType::Window),
            line_start: row.get::<_, i64>(4)? as usize,
            line_end: row.get::<_, i64>(5)? as usize,
        },
        text: row.get(6)?,
    })
}

impl Db {
    /// Returns a map of path -> modified_at for all indexed documents
    pub fn list_documents(&self) -> Result<HashMap<String, DateTime<Utc>>> {
        let mut stmt = self.conn.prepare("SELECT path, modified_at FROM documents")?;
        let rows = stmt.query_map([], |row| {
            let path: String = row.get(0)?;
            let modified_at: DateTime<Utc> = row.get(1)?;
            Ok((path, modified_at))
        })?;

        let mut docs = HashMap::new();
        for row in rows {
            let (path, modified_at) = row?;
            docs.insert(path, modified_at);
        }

        Ok(docs)
    }

    /// Indexed documents with their chunk counts, ordered by path.
    pub fn documents(&self) -> Result<Vec<StoredDocument>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT d.path, d.modified_at, d.indexed_at, COUNT(c.id)
            FROM documents d
            LEFT JOIN chunks c ON c.document_id = d.id
            GROUP BY d.id
            ORDER BY d.path
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(StoredDocument {
                path: row.get(0)?,
                modified_at: row.get(1)?,
                indexed_at: row.get(2)?,
                chunk_count: row.get::<_, i64>(3)? as usize,
            })
        })?;
        rows.collect()
    }

    /// Deletes a document with its chunks and vectors.
    pub fn delete_document(&self, path: &str) -> Result<bool> {
        let doc_id: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM documents WHERE path = ?",
                params![path],
                |row| row.get(0),
            )
            .optional()?;

        let Some(doc_id) = doc_id else {
            return Ok(false);
        };

        // vec0 tables do not take part in foreign-key cascades
        self.conn.execute(
            "DELETE FROM vec_chunks WHERE rowid IN (SELECT id FROM chunks WHERE document_id = ?)",
            params![doc_id],
        )?;
        let rows = self
            .conn
            .execute("DELETE FROM documents WHERE id = ?", params![doc_id])?;
        Ok(rows > 0)
    }

    /// Replace the records of `path` with `records`, keyed by line range.
    ///
    /// Ranges present before and after are updated in place, new ones are
    /// inserted, and ranges no longer produced are removed. `embeddings[i]`
    /// belongs to `records[i]`.
    pub fn upsert_document(
        &mut self,
        path: &str,
        modified_at: DateTime<Utc>,
        records: &[ChunkRecord],
        embeddings: &[Vec<f32>],
    ) -> Result<UpsertStats> {
        if records.len() != embeddings.len() {
            return Err(rusqlite::Error::InvalidParameterCount(
                embeddings.len(),
                records.len(),
            ));
        }

        let tx = self.conn.transaction()?;
        let mut stats = UpsertStats::default();

        let doc_id: i64 = tx.query_row(
            r#"
            INSERT INTO documents (path, modified_at, indexed_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(path) DO UPDATE SET
                modified_at = excluded.modified_at,
                indexed_at = CURRENT_TIMESTAMP
            RETURNING id
            "#,
            params![path, modified_at],
            |row| row.get(0),
        )?;

        let mut existing: HashMap<(i64, i64), i64> = HashMap::new();
        {
            let mut stmt =
                tx.prepare("SELECT id, line_start, line_end FROM chunks WHERE document_id = ?")?;
            let rows = stmt.query_map(params![doc_id], |row| {
                Ok(((row.get(1)?, row.get(2)?), row.get(0)?))
            })?;
            for row in rows {
                let (range, id) = row?;
                existing.insert(range, id);
            }
        }

        for (record, embedding) in records.iter().zip(embeddings) {
            let meta = &record.metadata;
            let range = (meta.line_start as i64, meta.line_end as i64);

            let chunk_id = match existing.remove(&range) {
                Some(id) => {
                    tx.execute(
                        "UPDATE chunks SET filename = ?, language = ?, chunk_type = ?, content = ? WHERE id = ?",
                        params![
                            meta.filename,
                            meta.language.as_str(),
                            meta.chunk_type.as_str(),
                            record.text,
                            id
                        ],
                    )?;
                    tx.execute("DELETE FROM vec_chunks WHERE rowid = ?", params![id])?;
                    stats.updated += 1;
                    id
                }
                None => {
                    tx.execute(
                        "INSERT INTO chunks (document_id, path, filename, language, chunk_type, line_start, line_end, content) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                        params![
                            doc_id,
                            path,
                            meta.filename,
                            meta.language.as_str(),
                            meta.chunk_type.as_str(),
                            range.0,
                            range.1,
                            record.text
                        ],
                    )?;
                    stats.inserted += 1;
                    tx.last_insert_rowid()
                }
            };

            tx.execute(
                "INSERT INTO vec_chunks (rowid, embedding) VALUES (?, ?)",
                params![chunk_id, serialize_vector(embedding)],
            )?;
        }

        for id in existing.into_values() {
            tx.execute("DELETE FROM vec_chunks WHERE rowid = ?", params![id])?;
            tx.execute("DELETE FROM chunks WHERE id = ?", params![id])?;
            stats.removed += 1;
        }

        tx.commit()?;
        Ok(stats)
    }

    /// Stored records of one document in line order.
    pub fn records_for_path(&self, path: &str) -> Result<Vec<ChunkRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM chunks c WHERE c.path = ? ORDER BY c.line_start"
        ))?;
        let rows = stmt.query_map(params![path], map_record)?;
        rows.collect()
    }

    pub fn chunk_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
