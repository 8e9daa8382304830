use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::answer::{Answer, SynthesisError, Synthesizer};
use super::intent::{Intent, IntentClassifier};
use super::tuner::{MetadataFilter, RetrievalSpec, RetrievalTable, RetrievalTuner};
use crate::db::Db;
use crate::db::models::SearchHit;
use crate::embedder::{Embedder, EmbedderError};
use crate::indexer::chunker::ChunkType;
use crate::indexer::languages::Language;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("failed to embed question: {0}")]
    Embedding(#[from] EmbedderError),

    #[error("vector search failed: {0}")]
    Store(#[from] rusqlite::Error),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error("invalid filter: {0}")]
    InvalidFilter(String),
}

/// Caller-supplied narrowing of the tuned spec.
#[derive(Debug, Clone, Default)]
pub struct QueryOverrides {
    pub k: Option<usize>,
    pub filter: MetadataFilter,
}

impl QueryOverrides {
    /// Overrides from loosely typed caller input such as CLI flags or tool
    /// parameters. Blank strings count as absent.
    pub fn parse(
        k: Option<usize>,
        language: Option<&str>,
        chunk_type: Option<&str>,
        path_prefix: Option<&str>,
        file_pattern: Option<&str>,
    ) -> Result<Self, QueryError> {
        fn given(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|v| !v.is_empty())
        }

        let language = given(language)
            .map(|name| {
                Language::from_name(&name.to_lowercase())
                    .ok_or_else(|| QueryError::InvalidFilter(format!("unknown language {name:?}")))
            })
            .transpose()?;
        let chunk_type = given(chunk_type)
            .map(|name| {
                ChunkType::from_name(&name.to_lowercase())
                    .ok_or_else(|| QueryError::InvalidFilter(format!("unknown chunk type {name:?}")))
            })
            .transpose()?;

        Ok(Self {
            k,
            filter: MetadataFilter {
                language,
                chunk_type,
                path_prefix: given(path_prefix)
                    .map(|p| p.trim_start_matches("./").trim_end_matches('/').to_string()),
                file_pattern: given(file_pattern).map(str::to_string),
            },
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Retrieval {
    pub intent: Intent,
    pub spec: RetrievalSpec,
    pub hits: Vec<SearchHit>,
}

/// Question → intent → [`RetrievalSpec`] → embedding → ranked records.
#[derive(Debug, Clone, Default)]
pub struct Retriever {
    classifier: IntentClassifier,
    tuner: RetrievalTuner,
}

impl Retriever {
    pub fn new(classifier: IntentClassifier, table: RetrievalTable) -> Self {
        Self {
            classifier,
            tuner: RetrievalTuner::new(table),
        }
    }

    /// Intent and effective retrieval parameters for `question`, without touching the store.
    pub fn plan(&self, question: &str, overrides: &QueryOverrides) -> (Intent, RetrievalSpec) {
        let intent = self.classifier.classify(question);
        let spec = self
            .tuner
            .tune(intent)
            .with_overrides(overrides.k, &overrides.filter);
        (intent, spec)
    }

    pub fn retrieve<E: Embedder + ?Sized>(
        &self,
        db: &Db,
        embedder: &E,
        question: &str,
        overrides: &QueryOverrides,
    ) -> Result<Retrieval, QueryError> {
        let (intent, spec) = self.plan(question, overrides);
        debug!("Question classified as {intent}, k={}", spec.k);

        let vector = embedder.embed(question)?;
        let hits = db.search(&vector, spec.k, &spec.filter)?;
        Ok(Retrieval { intent, spec, hits })
    }

    /// Retrieve, then synthesize a cited answer from the hits.
    pub fn ask<E: Embedder + ?Sized>(
        &self,
        db: &Db,
        embedder: &E,
        synthesizer: &dyn Synthesizer,
        question: &str,
        overrides: &QueryOverrides,
    ) -> Result<(Retrieval, Answer), QueryError> {
        let retrieval = self.retrieve(db, embedder, question, overrides)?;
        let answer = synthesizer.synthesize(question, retrieval.intent, &retrieval.hits)?;
        Ok((retrieval, answer))
    }
}
