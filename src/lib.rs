//! # coderag: code-aware retrieval over source repositories
//!
//! Splits source files into chunks at syntactic boundaries, stores them with
//! citable metadata and embeddings, and answers questions with retrieval
//! depth tuned to what the question is asking.
//!
//! ## Architecture
//!
//! - **[`config`]**: Configuration loading, validation, and defaults
//! - **[`db`]**: SQLite + sqlite-vec store keyed by `(path, line_start, line_end)`
//! - **[`embedder`]**: Embedding trait with an offline hash embedder and an HTTP client
//! - **[`indexer`]**: Line reading, language detection, boundary chunking, ingestion
//! - **[`query`]**: Intent classification, retrieval tuning, cited answers
//! - **[`mcp`]**: MCP server exposing ask/search/index tools (stdio transport via rmcp)

pub mod config;
pub mod db;
pub mod embedder;
pub mod indexer;
pub mod mcp;
pub mod query;
