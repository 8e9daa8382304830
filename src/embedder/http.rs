/// Embedder backed by an OpenAI-compatible `/embeddings` endpoint.
use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Embedder, EmbedderError, l2_normalize};

const BATCH_SIZE: usize = 64;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

pub struct HttpEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    dimensions: usize,
}

impl HttpEmbedder {
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: Option<String>,
        dimensions: usize,
    ) -> Result<Self, EmbedderError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EmbedderError::RequestFailed(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            dimensions,
        })
    }

    fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let url = format!("{}/embeddings", self.endpoint);
        debug!("Embedding {} texts via {url}", texts.len());

        let mut req = self.client.post(&url).json(&EmbeddingRequest {
            model: &self.model,
            input: texts,
        });
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .map_err(|e| EmbedderError::RequestFailed(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(EmbedderError::RequestFailed(format!("HTTP {status}: {body}")));
        }

        let body = resp
            .text()
            .map_err(|e| EmbedderError::RequestFailed(e.to_string()))?;
        parse_embeddings(&body, texts.len(), self.dimensions)
    }
}

/// Decode a response body into `expected` unit vectors ordered by `index`.
fn parse_embeddings(
    body: &str,
    expected: usize,
    dimensions: usize,
) -> Result<Vec<Vec<f32>>, EmbedderError> {
    let mut parsed: EmbeddingResponse =
        serde_json::from_str(body).map_err(|e| EmbedderError::InvalidResponse(e.to_string()))?;

    if parsed.data.len() != expected {
        return Err(EmbedderError::InvalidResponse(format!(
            "expected {expected} embeddings, got {}",
            parsed.data.len()
        )));
    }
    parsed.data.sort_by_key(|d| d.index);

    parsed
        .data
        .into_iter()
        .map(|d| {
            if d.embedding.len() != dimensions {
                return Err(EmbedderError::DimensionMismatch {
                    expected: dimensions,
                    actual: d.embedding.len(),
                });
            }
            let mut v = d.embedding;
            l2_normalize(&mut v);
            Ok(v)
        })
        .collect()
}

impl Embedder for HttpEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        self.request(&[text])?
            .pop()
            .ok_or_else(|| EmbedderError::InvalidResponse("empty response".to_string()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            out.extend(self.request(batch)?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_orders_by_index() {
        let body = r#"{"data":[
            {"index":1,"embedding":[0.0,2.0]},
            {"index":0,"embedding":[3.0,0.0]}
        ]}"#;
        let vecs = parse_embeddings(body, 2, 2).unwrap();
        assert_eq!(vecs, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_parse_rejects_wrong_count() {
        let body = r#"{"data":[{"index":0,"embedding":[1.0]}]}"#;
        let err = parse_embeddings(body, 2, 1).unwrap_err();
        assert!(matches!(err, EmbedderError::InvalidResponse(_)));
    }

    #[test]
    fn test_parse_rejects_wrong_dimensions() {
        let body = r#"{"data":[{"index":0,"embedding":[1.0,0.0,0.0]}]}"#;
        let err = parse_embeddings(body, 1, 4).unwrap_err();
        assert!(matches!(
            err,
            EmbedderError::DimensionMismatch {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_embeddings("not json", 1, 1),
            Err(EmbedderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_endpoint_is_normalized() {
        let embedder = HttpEmbedder::new("http://localhost:8080/v1/", "m", None, 8).unwrap();
        assert_eq!(embedder.endpoint, "http://localhost:8080/v1");
        assert_eq!(embedder.dimensions(), 8);
    }
}
