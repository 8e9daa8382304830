/// MCP Tool handlers for coderag.
///
/// 1. ask              – intent-tuned retrieval plus a cited answer
/// 2. search           – ranked chunks with citations and scores
/// 3. index_repository – ingest a directory (differential unless forced)
/// 4. list_documents   – list indexed documents
/// 5. delete_document  – drop a document and its chunks from the store
///
/// Embedding, HTTP and SQLite work is blocking, so every handler moves it
/// onto `spawn_blocking`.
use crate::indexer::core::{IndexError, Indexer};
use crate::mcp::server::McpContext;
use crate::query::retriever::{QueryError, QueryOverrides};
use rmcp::handler::server::ServerHandler;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{ErrorData as McpError, handler::server::tool::ToolRouter, model::*, tool, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

// ── Parameter structs ────────────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
struct QueryParams {
    /// Natural-language question about the indexed code
    question: String,
    /// Max results (tuned by the question's intent when omitted)
    top_k: Option<usize>,
    /// Restrict to one language (e.g. 'rust', 'python', 'typescript')
    language: Option<String>,
    /// Restrict to one chunk kind: function | class | top_level | window
    chunk_type: Option<String>,
    /// Limit to a directory (e.g. 'src/db')
    path: Option<String>,
    /// Filter by filename glob pattern (e.g. '*_test.go')
    file_pattern: Option<String>,
}

impl QueryParams {
    fn overrides(&self) -> Result<QueryOverrides, QueryError> {
        QueryOverrides::parse(
            self.top_k,
            self.language.as_deref(),
            self.chunk_type.as_deref(),
            self.path.as_deref(),
            self.file_pattern.as_deref(),
        )
    }
}

#[derive(Deserialize, JsonSchema)]
struct IndexParams {
    /// Repository directory to index recursively
    directory: String,
    /// Force re-index even if unchanged (default: false)
    force: Option<bool>,
}

#[derive(Deserialize, JsonSchema)]
struct PathParam {
    /// Repository-relative path of the document (as shown by list_documents)
    path: String,
}

// ── Response helpers ─────────────────────────────────────────────────

fn json_result(value: serde_json::Value) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(&value).unwrap_or_default(),
    )]))
}

fn error_result(msg: &str) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(msg.to_string())]))
}

fn internal(what: &str, e: impl std::fmt::Display) -> McpError {
    McpError::internal_error(format!("{what}: {e}"), None)
}

async fn blocking<T, F>(f: F) -> Result<T, McpError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| internal("worker task failed", e))
}

fn hits_json(hits: &[crate::db::models::SearchHit]) -> Vec<serde_json::Value> {
    hits.iter()
        .map(|h| {
            let meta = &h.record.metadata;
            serde_json::json!({
                "citation": h.record.cite(),
                "path": meta.path,
                "language": meta.language,
                "chunk_type": meta.chunk_type,
                "line_start": meta.line_start,
                "line_end": meta.line_end,
                "similarity": h.similarity,
                "content": h.record.text,
            })
        })
        .collect()
}

// ── Tool implementations ─────────────────────────────────────────────

#[derive(Clone)]
pub struct AppTools {
    pub ctx: McpContext,
    pub tool_router: ToolRouter<Self>,
}

impl ServerHandler for AppTools {}

#[tool_router]
impl AppTools {
    pub fn new(ctx: McpContext) -> Self {
        Self {
            ctx,
            tool_router: Self::tool_router(),
        }
    }

    // ── Tool 1: ask ─────────────────────────────────────────────────

    #[tool(
        description = "Answer a question about the indexed repository. Retrieval depth is tuned to the question's intent (where / how / why / explain); the answer cites evidence as [filename:start-end]."
    )]
    async fn ask(&self, params: Parameters<QueryParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        if p.question.trim().is_empty() {
            return error_result("question is required");
        }
        let overrides = match p.overrides() {
            Ok(o) => o,
            Err(e) => return error_result(&e.to_string()),
        };

        let ctx = self.ctx.clone();
        let question = p.question;
        let outcome = blocking(move || {
            let db = ctx.db.blocking_lock();
            ctx.retriever.ask(
                &db,
                ctx.embedder.as_ref(),
                ctx.synthesizer.as_ref(),
                &question,
                &overrides,
            )
        })
        .await?;

        let (retrieval, answer) = outcome.map_err(|e| internal("ask failed", e))?;
        json_result(serde_json::json!({
            "intent": retrieval.intent,
            "k": retrieval.spec.k,
            "answer": answer.text,
            "citations": answer.citations,
        }))
    }

    // ── Tool 2: search ──────────────────────────────────────────────

    #[tool(
        description = "Vector search over indexed code chunks. The number of results follows the question's intent unless top_k is given. Supports language, chunk type, directory and filename pattern filters."
    )]
    async fn search(&self, params: Parameters<QueryParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        if p.question.trim().is_empty() {
            return error_result("question is required");
        }
        let overrides = match p.overrides() {
            Ok(o) => o,
            Err(e) => return error_result(&e.to_string()),
        };

        let ctx = self.ctx.clone();
        let question = p.question;
        let retrieval = blocking(move || {
            let db = ctx.db.blocking_lock();
            ctx.retriever
                .retrieve(&db, ctx.embedder.as_ref(), &question, &overrides)
        })
        .await?
        .map_err(|e| internal("search failed", e))?;

        json_result(serde_json::json!({
            "intent": retrieval.intent,
            "k": retrieval.spec.k,
            "results": hits_json(&retrieval.hits),
        }))
    }

    // ── Tool 3: index_repository ────────────────────────────────────

    #[tool(
        description = "Index a source repository directory. Unchanged files are skipped unless force is set; documents whose files vanished are removed."
    )]
    async fn index_repository(
        &self,
        params: Parameters<IndexParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        if p.directory.trim().is_empty() {
            return error_result("directory is required");
        }

        let ctx = self.ctx.clone();
        let root = PathBuf::from(&p.directory);
        let force = p.force.unwrap_or(false);
        let outcome = blocking(move || {
            let mut db = ctx.db.blocking_lock();
            let config = ctx.config.indexer_config();
            Indexer::new(&mut db, ctx.embedder.as_ref(), &config)?.index_directory(&root, force)
        })
        .await?;

        match outcome {
            Ok(report) => {
                info!("Indexed {} via MCP", p.directory);
                json_result(serde_json::json!({
                    "success": true,
                    "skipped": report.skipped(),
                    "report": report,
                }))
            }
            Err(e @ (IndexError::NoFiles(_) | IndexError::NotADirectory(_))) => {
                error_result(&e.to_string())
            }
            Err(e) => Err(internal("indexing failed", e)),
        }
    }

    // ── Tool 4: list_documents ──────────────────────────────────────

    #[tool(description = "Retrieve list of indexed documents")]
    async fn list_documents(&self) -> Result<CallToolResult, McpError> {
        let ctx = self.ctx.clone();
        let docs = blocking(move || {
            let db = ctx.db.blocking_lock();
            db.documents()
        })
        .await?
        .map_err(|e| internal("list failed", e))?;

        let documents: Vec<serde_json::Value> = docs
            .iter()
            .map(|d| {
                serde_json::json!({
                    "path": d.path,
                    "modified_at": d.modified_at.to_rfc3339(),
                    "indexed_at": d.indexed_at.to_rfc3339(),
                    "chunks": d.chunk_count,
                })
            })
            .collect();

        json_result(serde_json::json!({ "documents": documents }))
    }

    // ── Tool 5: delete_document ─────────────────────────────────────

    #[tool(description = "Delete a document and its chunks from the index. The file itself is left alone.")]
    async fn delete_document(
        &self,
        params: Parameters<PathParam>,
    ) -> Result<CallToolResult, McpError> {
        let path = params.0.path;
        if path.is_empty() {
            return error_result("path is required");
        }

        let ctx = self.ctx.clone();
        let key = path.clone();
        let deleted = blocking(move || {
            let db = ctx.db.blocking_lock();
            db.delete_document(&key)
        })
        .await?
        .map_err(|e| internal("delete failed", e))?;

        if !deleted {
            return error_result(&format!("document not indexed: {path}"));
        }
        json_result(serde_json::json!({
            "success": true,
            "message": "Document deleted successfully",
        }))
    }
}
