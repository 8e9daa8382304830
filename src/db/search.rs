use super::documents::{RECORD_COLUMNS, map_record};
use super::models::{MetadataFilter, SearchHit};
use super::{Db, serialize_vector};
use rusqlite::Result;
use rusqlite::types::Value;

/// Escape LIKE wildcards so `s` matches literally under `ESCAPE '\'`.
fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn glob_to_like(pattern: &str) -> String {
    escape_like(pattern).replace('*', "%").replace('?', "_")
}

fn map_search_row(row: &rusqlite::Row<'_>) -> Result<SearchHit> {
    let distance: f64 = row.get(7)?;
    Ok(SearchHit {
        record: map_record(row)?,
        similarity: 1.0 - (distance / 2.0),
    })
}

impl Db {
    /// Nearest `k` chunks to `query_vector` by cosine distance, restricted
    /// by `filter`.
    pub fn search(
        &self,
        query_vector: &[f32],
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<SearchHit>> {
        let mut query = format!(
            r#"
            SELECT {RECORD_COLUMNS},
                vec_distance_cosine(v.embedding, ?) as distance
            FROM vec_chunks v
            JOIN chunks c ON v.rowid = c.id
            "#
        );

        let mut where_clauses = Vec::new();
        let mut params: Vec<Value> = vec![Value::Blob(serialize_vector(query_vector))];

        if let Some(language) = filter.language {
            where_clauses.push("c.language = ?");
            params.push(Value::Text(language.as_str().to_string()));
        }
        if let Some(chunk_type) = filter.chunk_type {
            where_clauses.push("c.chunk_type = ?");
            params.push(Value::Text(chunk_type.as_str().to_string()));
        }
        if let Some(prefix) = filter.path_prefix.as_deref() {
            let prefix = prefix.trim_start_matches("./").trim_end_matches('/');
            if !prefix.is_empty() {
                where_clauses.push(r"(c.path = ? OR c.path LIKE ? ESCAPE '\')");
                params.push(Value::Text(prefix.to_string()));
                params.push(Value::Text(format!("{}/%", escape_like(prefix))));
            }
        }
        if let Some(pattern) = filter.file_pattern.as_deref() {
            let like_pat = glob_to_like(pattern);
            where_clauses.push(r"(c.path LIKE ? ESCAPE '\' OR c.path LIKE ? ESCAPE '\')");
            params.push(Value::Text(format!("%/{like_pat}")));
            params.push(Value::Text(like_pat));
        }

        if !where_clauses.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&where_clauses.join(" AND "));
        }

        query.push_str(" ORDER BY distance ASC, c.path ASC, c.line_start ASC LIMIT ?");
        params.push(Value::Integer(k as i64));

        let param_refs: Vec<&dyn rusqlite::ToSql> =
            params.iter().map(|p| p as &dyn rusqlite::ToSql).collect();

        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(param_refs.as_slice(), map_search_row)?;
        rows.collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::chunker::ChunkType;
    use crate::indexer::languages::Language;
    use crate::indexer::reader::SourceFile;
    use crate::indexer::record::{ChunkMetadata, ChunkRecord};
    use chrono::Utc;

    const DIMS: usize = 3;

    fn record(path: &str, chunk_type: ChunkType, text: &str) -> ChunkRecord {
        let source = SourceFile::from_content(path, text);
        ChunkRecord {
            metadata: ChunkMetadata {
                path: source.path.clone(),
                filename: source.filename().to_string(),
                language: source.language,
                chunk_type,
                line_start: 1,
                line_end: 1,
            },
            text: text.to_string(),
        }
    }

    fn seeded() -> Db {
        let mut db = Db::open_in_memory(DIMS).unwrap();
        let rows = [
            ("docs/a.md", ChunkType::TopLevel, [1.0, 0.0, 0.0]),
            ("src/b.rs", ChunkType::Function, [0.9, 0.1, 0.0]),
            ("docs/nested/c.md", ChunkType::TopLevel, [0.0, 1.0, 0.0]),
            ("src_old/d_e.rs", ChunkType::Class, [0.0, 0.0, 1.0]),
        ];
        for (path, chunk_type, vector) in rows {
            db.upsert_document(
                path,
                Utc::now(),
                &[record(path, chunk_type, "body")],
                &[vector.to_vec()],
            )
            .unwrap();
        }
        db
    }

    fn paths(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.record.metadata.path.as_str()).collect()
    }

    #[test]
    fn test_search_ranks_by_similarity() {
        let db = seeded();
        let hits = db
            .search(&[1.0, 0.0, 0.0], 2, &MetadataFilter::default())
            .unwrap();
        assert_eq!(paths(&hits), vec!["docs/a.md", "src/b.rs"]);
        assert!(hits[0].similarity > 0.99);
        assert!(hits[0].similarity >= hits[1].similarity);
        assert_eq!(hits[0].record.metadata.language, Language::Markdown);
        assert_eq!(hits[0].record.citation(), "a.md:1-1");
    }

    #[test]
    fn test_search_filters() {
        let db = seeded();
        let query = [0.5, 0.5, 0.5];

        let by_prefix = MetadataFilter {
            path_prefix: Some("docs/".to_string()),
            ..Default::default()
        };
        let mut hits = paths(&db.search(&query, 10, &by_prefix).unwrap())
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        hits.sort();
        assert_eq!(hits, vec!["docs/a.md", "docs/nested/c.md"]);

        let src = MetadataFilter {
            path_prefix: Some("src".to_string()),
            ..Default::default()
        };
        assert_eq!(paths(&db.search(&query, 10, &src).unwrap()), vec!["src/b.rs"]);

        let by_pattern = MetadataFilter {
            file_pattern: Some("*.rs".to_string()),
            ..Default::default()
        };
        assert_eq!(db.search(&query, 10, &by_pattern).unwrap().len(), 2);

        let literal_underscore = MetadataFilter {
            file_pattern: Some("d_e.rs".to_string()),
            ..Default::default()
        };
        assert_eq!(
            paths(&db.search(&query, 10, &literal_underscore).unwrap()),
            vec!["src_old/d_e.rs"]
        );

        let by_type = MetadataFilter {
            language: Some(Language::Rust),
            chunk_type: Some(ChunkType::Function),
            ..Default::default()
        };
        assert_eq!(paths(&db.search(&query, 10, &by_type).unwrap()), vec!["src/b.rs"]);
    }

    #[test]
    fn test_glob_to_like() {
        assert_eq!(glob_to_like("*.rs"), "%.rs");
        assert_eq!(glob_to_like("a_?.py"), "a\\__.py");
        assert_eq!(glob_to_like("100%"), "100\\%");
    }
}
