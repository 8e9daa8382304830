//! Answer synthesis over retrieved chunks.
//!
//! Every answer carries the `[filename:start-end]` citations of the evidence
//! it was built from.
use std::fmt::Write as _;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::intent::Intent;
use crate::db::models::SearchHit;

const NO_MATCH: &str = "No indexed code matched the question.";

#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("completion request failed: {0}")]
    RequestFailed(String),

    #[error("invalid completion response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    /// `[filename:start-end]` strings, in rank order, without duplicates.
    pub citations: Vec<String>,
}

impl Answer {
    fn no_match() -> Self {
        Self {
            text: NO_MATCH.to_string(),
            citations: Vec::new(),
        }
    }
}

pub trait Synthesizer: Send + Sync {
    fn synthesize(
        &self,
        question: &str,
        intent: Intent,
        hits: &[SearchHit],
    ) -> Result<Answer, SynthesisError>;
}

/// Citations of `hits` in rank order, duplicates dropped.
pub fn citations(hits: &[SearchHit]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(hits.len());
    for hit in hits {
        let cite = hit.record.cite();
        if !out.contains(&cite) {
            out.push(cite);
        }
    }
    out
}

/// Numbered evidence blocks, each headed by its citation.
pub fn build_context(hits: &[SearchHit]) -> String {
    let mut context = String::new();
    for (i, hit) in hits.iter().enumerate() {
        let meta = &hit.record.metadata;
        let _ = writeln!(
            context,
            "{}. {} {} in {}",
            i + 1,
            hit.record.cite(),
            meta.chunk_type,
            meta.path
        );
        let _ = writeln!(context, "```{}", meta.language);
        context.push_str(&hit.record.text);
        if !hit.record.text.ends_with('\n') {
            context.push('\n');
        }
        context.push_str("```\n\n");
    }
    context
}

// ── Extractive ───────────────────────────────────────────────────────

/// Offline synthesizer: lists the evidence with citations, most relevant
/// first, quoting the opening lines of each chunk.
#[derive(Debug, Clone)]
pub struct ExtractiveSynthesizer {
    pub excerpt_lines: usize,
}

impl Default for ExtractiveSynthesizer {
    fn default() -> Self {
        Self { excerpt_lines: 8 }
    }
}

impl Synthesizer for ExtractiveSynthesizer {
    fn synthesize(
        &self,
        _question: &str,
        intent: Intent,
        hits: &[SearchHit],
    ) -> Result<Answer, SynthesisError> {
        if hits.is_empty() {
            return Ok(Answer::no_match());
        }

        let mut text = String::from(match intent {
            Intent::File => "Most likely locations:\n",
            Intent::How | Intent::Why => "Relevant code, most relevant first:\n",
            Intent::Explain | Intent::Default => "Related code:\n",
        });

        for hit in hits {
            let meta = &hit.record.metadata;
            let _ = writeln!(
                text,
                "\n{} {} in {} (score {:.2})",
                hit.record.cite(),
                meta.chunk_type,
                meta.path,
                hit.similarity
            );
            if intent == Intent::File {
                continue;
            }
            let total = hit.record.text.lines().count();
            for line in hit.record.text.lines().take(self.excerpt_lines) {
                let _ = writeln!(text, "    {line}");
            }
            if total > self.excerpt_lines {
                let _ = writeln!(text, "    ...");
            }
        }

        Ok(Answer {
            text,
            citations: citations(hits),
        })
    }
}

// ── Chat completion ──────────────────────────────────────────────────

const SYSTEM_PROMPT: &str = "You answer questions about a source code repository using only the \
numbered evidence provided. Cite every claim inline with the bracketed reference of the evidence \
it comes from, exactly as written, for example [main.rs:10-42]. If the evidence does not answer \
the question, say so.";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Deserialize)]
struct ChatContent {
    content: Option<String>,
}

/// Synthesizer backed by an OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatSynthesizer {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
}

impl ChatSynthesizer {
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: Option<String>,
        temperature: f32,
    ) -> Result<Self, SynthesisError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SynthesisError::RequestFailed(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            temperature,
        })
    }
}

fn user_prompt(question: &str, intent: Intent, hits: &[SearchHit]) -> String {
    format!(
        "Question ({intent}): {question}\n\nEvidence:\n\n{}",
        build_context(hits)
    )
}

fn parse_completion(body: &str) -> Result<String, SynthesisError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| SynthesisError::InvalidResponse(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| SynthesisError::InvalidResponse("no completion content".to_string()))
}

/// Citations the answer actually uses; all of them when it uses none.
fn used_citations(text: &str, hits: &[SearchHit]) -> Vec<String> {
    let all = citations(hits);
    let used: Vec<String> = all.iter().filter(|c| text.contains(c.as_str())).cloned().collect();
    if used.is_empty() { all } else { used }
}

impl Synthesizer for ChatSynthesizer {
    fn synthesize(
        &self,
        question: &str,
        intent: Intent,
        hits: &[SearchHit],
    ) -> Result<Answer, SynthesisError> {
        if hits.is_empty() {
            return Ok(Answer::no_match());
        }

        let prompt = user_prompt(question, intent, hits);
        let url = format!("{}/chat/completions", self.endpoint);
        debug!("Requesting completion from {url} with {} evidence blocks", hits.len());

        let mut req = self.client.post(&url).json(&ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
        });
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .map_err(|e| SynthesisError::RequestFailed(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .map_err(|e| SynthesisError::RequestFailed(e.to_string()))?;
        if !status.is_success() {
            return Err(SynthesisError::RequestFailed(format!("HTTP {status}: {body}")));
        }

        let text = parse_completion(&body)?;
        let citations = used_citations(&text, hits);
        Ok(Answer { text, citations })
    }
}
