use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::embed::{Embedder, Embedding};
use crate::{Error, Result};

/// Blocking client for OpenAI-compatible embedding endpoints.
///
/// Inputs are sent in batches of at most `batch_size`. A failed batch fails
/// the whole call; nothing is retried.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimension: usize,
    batch_size: usize,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        if config.model.trim().is_empty() {
            return Err(Error::Config("missing embedding model name".into()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        // local gateways accept any key; "EMPTY" mirrors what they expect
        let key = config.api_key.as_deref().unwrap_or("EMPTY").trim();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|_| Error::Config("invalid embedding API key".into()))?,
        );

        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to build embedding HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.api_base.trim_end_matches('/')),
            model: config.model.clone(),
            dimension: config.dimension,
            batch_size: config.batch_size.max(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Embedding>> {
        debug!(endpoint = %self.endpoint, inputs = inputs.len(), "embedding batch");
        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .map_err(|e| Error::Embedding(format!("request to {} failed: {e}", self.endpoint)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(Error::Embedding(format!(
                "embedding request failed ({status}): {body}"
            )));
        }

        let payload: EmbeddingResponse = resp
            .json()
            .map_err(|e| Error::Embedding(format!("failed to parse embedding response: {e}")))?;
        payload.into_embeddings(inputs.len())
    }
}

impl Embedder for OpenAiEmbedder {
    fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            embeddings.extend(self.embed_batch(batch)?);
        }
        Ok(embeddings)
    }

    fn embed_query(&self, text: &str) -> Result<Embedding> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("gateway returned no embeddings".to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

impl EmbeddingResponse {
    fn into_embeddings(self, expected_len: usize) -> Result<Vec<Embedding>> {
        if self.data.len() != expected_len {
            return Err(Error::Embedding(format!(
                "gateway returned {} embeddings for {} inputs",
                self.data.len(),
                expected_len
            )));
        }
        let mut data = self.data;
        data.sort_by_key(|d| d.index.unwrap_or(0));
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{serve, unused_base_url, Reply};

    fn config(base: String, batch_size: usize) -> EmbeddingConfig {
        EmbeddingConfig {
            api_base: format!("{base}/v1"),
            batch_size,
            dimension: 2,
            timeout_secs: 5,
            ..EmbeddingConfig::default()
        }
    }

    #[test]
    fn test_response_reordered_by_index() {
        let payload: EmbeddingResponse = serde_json::from_str(
            r#"{"data": [{"embedding": [0.0, 1.0], "index": 1}, {"embedding": [1.0, 0.0], "index": 0}]}"#,
        )
        .unwrap();
        let embeddings = payload.into_embeddings(2).unwrap();
        assert_eq!(embeddings, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_response_count_mismatch() {
        let payload: EmbeddingResponse =
            serde_json::from_str(r#"{"data": [{"embedding": [1.0]}]}"#).unwrap();
        assert!(matches!(payload.into_embeddings(2), Err(Error::Embedding(_))));
    }

    #[test]
    fn test_embed_documents_in_batches() {
        let (base, handle) = serve(vec![
            Reply::ok(r#"{"data": [{"embedding": [1.0, 0.0], "index": 0}, {"embedding": [0.0, 1.0], "index": 1}]}"#),
            Reply::ok(r#"{"data": [{"embedding": [0.5, 0.5], "index": 0}]}"#),
        ]);
        let embedder = OpenAiEmbedder::new(&config(base, 2)).unwrap();

        let embeddings = embedder.embed_documents(&["a", "b", "c"]).unwrap();
        assert_eq!(embeddings.len(), 3);
        assert_eq!(embeddings[2], vec![0.5, 0.5]);

        let requests = handle.join().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].starts_with("POST /v1/embeddings"));
        assert!(requests[0].contains(r#""input":["a","b"]"#));
        assert!(requests[1].contains(r#""input":["c"]"#));
        assert!(requests[0].contains(r#""model":"bge-embedding""#));
    }

    #[test]
    fn test_server_error_is_embedding_error() {
        let (base, handle) = serve(vec![Reply::status(500, "model crashed")]);
        let embedder = OpenAiEmbedder::new(&config(base, 8)).unwrap();

        let err = embedder.embed_query("fever").unwrap_err();
        assert!(matches!(&err, Error::Embedding(msg) if msg.contains("model crashed")));
        handle.join().unwrap();
    }

    #[test]
    fn test_connection_refused_is_embedding_error() {
        let embedder = OpenAiEmbedder::new(&config(unused_base_url(), 8)).unwrap();
        assert!(matches!(embedder.embed_query("fever"), Err(Error::Embedding(_))));
    }
}
