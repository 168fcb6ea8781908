use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RerankConfig;
use crate::rerank::Reranker;
use crate::{Error, Result};

/// Blocking client for `/rerank` endpoints (Cohere/Jina style).
///
/// Any transport failure, timeout, non-2xx status or unreadable body is
/// reported as [`Error::RerankUnavailable`]; the input order is never
/// silently returned in its place.
pub struct HttpReranker {
    client: Client,
    endpoint: String,
    model: String,
}

impl HttpReranker {
    pub fn new(config: &RerankConfig) -> Result<Self> {
        if config.model.trim().is_empty() {
            return Err(Error::Config("missing rerank model name".into()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let key = config.api_key.as_deref().unwrap_or("EMPTY").trim();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|_| Error::Config("invalid rerank API key".into()))?,
        );

        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to build rerank HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/rerank", config.api_base.trim_end_matches('/')),
            model: config.model.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Reranker for HttpReranker {
    fn rerank(&self, query: &str, documents: &[&str], top_n: usize) -> Result<Vec<String>> {
        if top_n == 0 {
            return Err(Error::InvalidParameter("top_n must be at least 1".into()));
        }
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        debug!(endpoint = %self.endpoint, documents = documents.len(), top_n, "rerank request");
        let request = RerankRequest {
            model: &self.model,
            query,
            documents,
            top_n,
            return_documents: true,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .map_err(|e| {
                let kind = if e.is_timeout() { "timed out" } else { "failed" };
                Error::RerankUnavailable(format!("request to {} {kind}: {e}", self.endpoint))
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(Error::RerankUnavailable(format!(
                "rerank request failed ({status}): {body}"
            )));
        }

        let payload: RerankResponse = resp.json().map_err(|e| {
            Error::RerankUnavailable(format!("failed to parse rerank response: {e}"))
        })?;
        payload.into_texts(documents, top_n)
    }
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [&'a str],
    top_n: usize,
    return_documents: bool,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Debug, Deserialize)]
struct RerankResult {
    #[serde(default)]
    index: Option<usize>,
    #[serde(default)]
    document: Option<RerankDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RerankDocument {
    Object { text: String },
    Text(String),
}

impl RerankResponse {
    /// Ranked texts, resolving by index when the service omits the document.
    fn into_texts(self, documents: &[&str], top_n: usize) -> Result<Vec<String>> {
        self.results
            .into_iter()
            .take(top_n)
            .map(|result| match (result.document, result.index) {
                (Some(RerankDocument::Object { text }), _)
                | (Some(RerankDocument::Text(text)), _) => Ok(text),
                (None, Some(i)) => documents.get(i).map(|d| d.to_string()).ok_or_else(|| {
                    Error::RerankUnavailable(format!(
                        "rerank result index {i} out of range for {} documents",
                        documents.len()
                    ))
                }),
                (None, None) => Err(Error::RerankUnavailable(
                    "rerank result has neither document nor index".to_string(),
                )),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{serve, unused_base_url, Reply};

    fn reranker(base: String) -> HttpReranker {
        HttpReranker::new(&RerankConfig {
            api_base: format!("{base}/v1"),
            timeout_secs: 5,
            ..RerankConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_extracts_document_texts_in_ranked_order() {
        let (base, handle) = serve(vec![Reply::ok(
            r#"{"id": "r1", "results": [
                {"index": 1, "relevance_score": 0.98, "document": {"text": "passage B"}},
                {"index": 0, "relevance_score": 0.12, "document": {"text": "passage A"}}
            ]}"#,
        )]);

        let ranked = reranker(base)
            .rerank("stroke", &["passage A", "passage B", "passage C"], 2)
            .unwrap();
        assert_eq!(ranked, vec!["passage B", "passage A"]);

        let requests = handle.join().unwrap();
        assert!(requests[0].starts_with("POST /v1/rerank"));
        assert!(requests[0].contains(r#""model":"bge-reranker""#));
        assert!(requests[0].contains(r#""query":"stroke""#));
        assert!(requests[0].contains(r#""documents":["passage A","passage B","passage C"]"#));
        assert!(requests[0].contains(r#""top_n":2"#));
    }

    #[test]
    fn test_truncates_to_top_n() {
        let payload: RerankResponse = serde_json::from_str(
            r#"{"results": [{"document": {"text": "a"}}, {"document": {"text": "b"}}, {"document": {"text": "c"}}]}"#,
        )
        .unwrap();
        assert_eq!(payload.into_texts(&[], 2).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_fewer_results_than_top_n() {
        let payload: RerankResponse =
            serde_json::from_str(r#"{"results": [{"document": {"text": "a"}}]}"#).unwrap();
        assert_eq!(payload.into_texts(&[], 5).unwrap(), vec!["a"]);
    }

    #[test]
    fn test_resolves_by_index_without_document() {
        let payload: RerankResponse = serde_json::from_str(
            r#"{"results": [{"index": 2, "relevance_score": 0.7}, {"index": 0, "relevance_score": 0.1}]}"#,
        )
        .unwrap();
        assert_eq!(payload.into_texts(&["x", "y", "z"], 3).unwrap(), vec!["z", "x"]);
    }

    #[test]
    fn test_plain_string_document() {
        let payload: RerankResponse =
            serde_json::from_str(r#"{"results": [{"index": 0, "document": "x"}]}"#).unwrap();
        assert_eq!(payload.into_texts(&["x"], 1).unwrap(), vec!["x"]);
    }

    #[test]
    fn test_index_out_of_range() {
        let payload: RerankResponse =
            serde_json::from_str(r#"{"results": [{"index": 9}]}"#).unwrap();
        assert!(matches!(
            payload.into_texts(&["x"], 1),
            Err(Error::RerankUnavailable(_))
        ));
    }

    #[test]
    fn test_server_error_is_unavailable() {
        let (base, handle) = serve(vec![Reply::status(503, "overloaded")]);
        let err = reranker(base).rerank("q", &["a"], 1).unwrap_err();
        assert!(matches!(&err, Error::RerankUnavailable(msg) if msg.contains("overloaded")));
        handle.join().unwrap();
    }

    #[test]
    fn test_malformed_body_is_unavailable() {
        let (base, handle) = serve(vec![Reply::ok(r#"{"unexpected": true}"#)]);
        let err = reranker(base).rerank("q", &["a"], 1).unwrap_err();
        assert!(matches!(err, Error::RerankUnavailable(_)));
        handle.join().unwrap();
    }

    #[test]
    fn test_connection_refused_is_unavailable() {
        let err = reranker(unused_base_url()).rerank("q", &["a"], 1).unwrap_err();
        assert!(matches!(err, Error::RerankUnavailable(_)));
    }

    #[test]
    fn test_empty_documents_skip_the_call() {
        let ranked = reranker(unused_base_url()).rerank("q", &[], 3).unwrap();
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_zero_top_n_rejected() {
        let err = reranker(unused_base_url()).rerank("q", &["a"], 0).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }
}
