use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::config::QdrantConfig;
use crate::store::{EmbeddingRecord, Metadata, RetrievalHit, StoreQuery, VectorStore};
use crate::{Error, Result};

/// Points per upsert request
const UPSERT_BATCH: usize = 64;

/// Payload key holding the record text
const TEXT_KEY: &str = "text";

/// Blocking Qdrant REST client bound to one collection.
///
/// Collections are created with cosine distance. Only dense search is
/// supported; hybrid requests are downgraded by the caller.
pub struct QdrantStore {
    client: Client,
    base: String,
    collection: String,
}

impl QdrantStore {
    pub fn new(config: &QdrantConfig) -> Result<Self> {
        if !(config.url.starts_with("http://") || config.url.starts_with("https://")) {
            return Err(Error::Config("Qdrant url must be an http(s) URL".into()));
        }
        if config.collection.trim().is_empty() {
            return Err(Error::Config("missing Qdrant collection name".into()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = config.api_key.as_deref() {
            headers.insert(
                "api-key",
                HeaderValue::from_str(key.trim())
                    .map_err(|_| Error::Config("invalid Qdrant API key".into()))?,
            );
        }
        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to build Qdrant HTTP client: {e}")))?;

        Ok(Self {
            client,
            base: config.url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base, self.collection)
    }

    fn send(&self, request: RequestBuilder, action: &str) -> Result<Response> {
        let resp = request
            .send()
            .map_err(|e| Error::Store(format!("Qdrant {action} failed: {e}")))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp
            .text()
            .unwrap_or_else(|_| "<body unavailable>".to_string());
        Err(Error::Store(format!("Qdrant {action} failed ({status}): {body}")))
    }

    fn drop_collection(&self) -> Result<()> {
        let resp = self
            .client
            .delete(self.collection_url())
            .send()
            .map_err(|e| Error::Store(format!("Qdrant drop collection failed: {e}")))?;
        let status = resp.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        let body = resp
            .text()
            .unwrap_or_else(|_| "<body unavailable>".to_string());
        Err(Error::Store(format!(
            "Qdrant drop collection failed ({status}): {body}"
        )))
    }

    fn upsert(&self, records: &[EmbeddingRecord]) -> Result<()> {
        let request = UpsertRequest {
            points: records.iter().map(Point::from).collect(),
        };
        let url = format!("{}/points?wait=true", self.collection_url());
        self.send(self.client.put(url).json(&request), "upsert")?;
        Ok(())
    }
}

impl VectorStore for QdrantStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    fn recreate(&mut self, dimension: usize) -> Result<()> {
        info!(collection = %self.collection, dimension, "recreating Qdrant collection");
        self.drop_collection()?;
        let body = json!({ "vectors": { "size": dimension, "distance": "Cosine" } });
        self.send(
            self.client.put(self.collection_url()).json(&body),
            "create collection",
        )?;
        Ok(())
    }

    fn add(&mut self, records: &[EmbeddingRecord], overwrite: bool) -> Result<usize> {
        if overwrite {
            let dimension = records.first().map(|r| r.vector.len()).ok_or_else(|| {
                Error::Store("cannot overwrite a collection with zero records".into())
            })?;
            self.recreate(dimension)?;
        }

        for batch in records.chunks(UPSERT_BATCH) {
            debug!(collection = %self.collection, points = batch.len(), "upserting points");
            self.upsert(batch)?;
        }
        Ok(records.len())
    }

    fn query(&self, query: &StoreQuery<'_>) -> Result<Vec<RetrievalHit>> {
        let mut body = json!({
            "vector": query.embedding,
            "limit": query.top_k,
            "with_payload": true,
        });
        if !query.filter.is_empty() {
            let must: Vec<Value> = query
                .filter
                .conditions()
                .iter()
                .map(|(key, value)| json!({ "key": key, "match": { "value": value } }))
                .collect();
            body["filter"] = json!({ "must": must });
        }

        let url = format!("{}/points/search", self.collection_url());
        let resp = self.send(self.client.post(url).json(&body), "search")?;
        let payload: SearchResponse = resp
            .json()
            .map_err(|e| Error::Store(format!("failed to parse Qdrant search response: {e}")))?;
        payload.into_hits()
    }

    fn count(&self) -> Result<usize> {
        let url = format!("{}/points/count", self.collection_url());
        let resp = self.send(
            self.client.post(url).json(&json!({ "exact": true })),
            "count",
        )?;
        let payload: CountResponse = resp
            .json()
            .map_err(|e| Error::Store(format!("failed to parse Qdrant count response: {e}")))?;
        Ok(payload.result.count)
    }
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    points: Vec<Point<'a>>,
}

#[derive(Serialize)]
struct Point<'a> {
    id: u64,
    vector: &'a [f32],
    payload: Map<String, Value>,
}

impl<'a> From<&'a EmbeddingRecord> for Point<'a> {
    fn from(record: &'a EmbeddingRecord) -> Self {
        let mut payload: Map<String, Value> = record
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        payload.insert(TEXT_KEY.to_string(), Value::String(record.text.clone()));
        Self {
            id: record.id,
            vector: &record.vector,
            payload,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<ScoredPoint>,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    score: f32,
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

impl SearchResponse {
    fn into_hits(self) -> Result<Vec<RetrievalHit>> {
        self.result
            .into_iter()
            .map(|point| {
                let mut payload = point.payload.unwrap_or_default();
                let text = match payload.remove(TEXT_KEY) {
                    Some(Value::String(text)) => text,
                    _ => {
                        return Err(Error::Store(
                            "Qdrant point is missing its text payload".to_string(),
                        ))
                    }
                };
                let metadata: Metadata = payload.into_iter().collect();
                Ok(RetrievalHit {
                    text,
                    score: point.score,
                    metadata,
                })
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    result: CountResult,
}

#[derive(Debug, Deserialize)]
struct CountResult {
    count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MetadataFilter, SearchMode};
    use crate::test_support::{serve, Reply};

    fn store(url: String) -> QdrantStore {
        QdrantStore::new(&QdrantConfig {
            url,
            timeout_secs: 5,
            ..QdrantConfig::default()
        })
        .unwrap()
    }

    fn record(id: u64, text: &str) -> EmbeddingRecord {
        let mut metadata = Metadata::new();
        metadata.insert("disease_name".into(), json!("Stroke"));
        EmbeddingRecord {
            id,
            text: text.to_string(),
            vector: vec![0.6, 0.8],
            metadata,
        }
    }

    #[test]
    fn test_overwrite_drops_creates_then_upserts() {
        let (base, handle) = serve(vec![
            Reply::status(404, r#"{"status": {"error": "Not found"}}"#),
            Reply::ok(r#"{"result": true, "status": "ok"}"#),
            Reply::ok(r#"{"result": {"status": "completed"}, "status": "ok"}"#),
        ]);
        let mut store = store(base);

        let written = store.add(&[record(7, "facial droop")], true).unwrap();
        assert_eq!(written, 1);

        let requests = handle.join().unwrap();
        assert!(requests[0].starts_with("DELETE /collections/diagnosis_standards "));
        assert!(requests[1].starts_with("PUT /collections/diagnosis_standards "));
        assert!(requests[1].contains(r#""distance":"Cosine""#));
        assert!(requests[1].contains(r#""size":2"#));
        assert!(requests[2].starts_with("PUT /collections/diagnosis_standards/points?wait=true"));
        assert!(requests[2].contains(r#""id":7"#));
        assert!(requests[2].contains(r#""text":"facial droop""#));
        assert!(requests[2].contains(r#""disease_name":"Stroke""#));
    }

    #[test]
    fn test_overwrite_without_records_is_rejected() {
        let mut store = store("http://127.0.0.1:1".to_string());
        assert!(matches!(store.add(&[], true), Err(Error::Store(_))));
    }

    #[test]
    fn test_failed_create_is_store_error() {
        let (base, handle) = serve(vec![
            Reply::ok(r#"{"result": true}"#),
            Reply::status(400, r#"{"status": {"error": "bad vector size"}}"#),
        ]);
        let mut store = store(base);

        let err = store.recreate(0).unwrap_err();
        assert!(matches!(&err, Error::Store(msg) if msg.contains("bad vector size")));
        handle.join().unwrap();
    }

    #[test]
    fn test_search_parses_hits_and_sends_filter() {
        let (base, handle) = serve(vec![Reply::ok(
            r#"{"result": [
                {"id": 1, "score": 0.91, "payload": {"text": "passage A", "disease_name": "Stroke", "is_emergency": true}},
                {"id": 2, "score": 0.42, "payload": {"text": "passage B"}}
            ], "status": "ok"}"#,
        )]);
        let store = store(base);
        let filter = MetadataFilter::new().must_equal("is_emergency", true);

        let hits = store
            .query(&StoreQuery {
                embedding: &[1.0, 0.0],
                text: "stroke",
                top_k: 2,
                mode: SearchMode::Dense,
                filter: &filter,
            })
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "passage A");
        assert!((hits[0].score - 0.91).abs() < 1e-6);
        assert_eq!(hits[0].metadata.get("disease_name"), Some(&json!("Stroke")));
        assert!(!hits[0].metadata.contains_key(TEXT_KEY));

        let requests = handle.join().unwrap();
        assert!(requests[0].starts_with("POST /collections/diagnosis_standards/points/search"));
        assert!(requests[0].contains(r#""limit":2"#));
        assert!(requests[0].contains(r#""key":"is_emergency""#));
    }

    #[test]
    fn test_point_without_text_is_error() {
        let payload: SearchResponse =
            serde_json::from_str(r#"{"result": [{"id": 1, "score": 0.5, "payload": {}}]}"#).unwrap();
        assert!(matches!(payload.into_hits(), Err(Error::Store(_))));
    }

    #[test]
    fn test_count() {
        let (base, handle) = serve(vec![Reply::ok(r#"{"result": {"count": 12}, "status": "ok"}"#)]);
        assert_eq!(store(base).count().unwrap(), 12);
        handle.join().unwrap();
    }

    #[test]
    fn test_rejects_bad_url() {
        let config = QdrantConfig {
            url: "localhost:6333".into(),
            ..QdrantConfig::default()
        };
        assert!(matches!(QdrantStore::new(&config), Err(Error::Config(_))));
    }
}
