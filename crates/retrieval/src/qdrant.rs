//! HTTP adapter for a Qdrant-style vector store.
//!
//! Uses the Query API with server-side inference: queries are sent as
//! `{text, model}` documents against the collection's named vectors
//! (`dense`, `sparse`); hybrid mode prefetches both and fuses store-side.
//! Transport errors propagate; the pipelines decide whether a turn can
//! proceed without context.

use cp_domain::config::RetrievalConfig;
use cp_domain::error::{Error, Result};
use serde_json::{json, Value};

use crate::engine::{SearchMode, VectorSearch};
use crate::item::RetrievedItem;

pub struct QdrantStore {
    base_url: String,
    api_key: Option<String>,
    collection: String,
    dense_vector: String,
    sparse_vector: String,
    category_key: String,
    dense_model: String,
    sparse_model: String,
    client: reqwest::Client,
}

impl QdrantStore {
    pub fn from_config(cfg: &RetrievalConfig) -> Result<Self> {
        if cfg.url.is_empty() {
            return Err(Error::Config("retrieval.url is empty".into()));
        }
        let api_key = std::env::var(&cfg.api_key_env).ok();
        if api_key.is_none() {
            tracing::warn!(env = %cfg.api_key_env, "vector store API key not set");
        }
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_sec))
            .build()
            .map_err(|e| Error::Retrieval(e.to_string()))?;
        Ok(Self {
            base_url: cfg.url.trim_end_matches('/').to_string(),
            api_key,
            collection: cfg.collection.clone(),
            dense_vector: cfg.dense_vector.clone(),
            sparse_vector: cfg.sparse_vector.clone(),
            category_key: cfg.category_key.clone(),
            dense_model: cfg.dense_model.clone(),
            sparse_model: cfg.sparse_model.clone(),
            client,
        })
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let url = format!(
            "{}/collections/{}/points/{path}",
            self.base_url, self.collection
        );
        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("api-key", key);
        }
        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(format!("vector store {path}"))
            } else {
                Error::Retrieval(e.to_string())
            }
        })?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Retrieval(format!("HTTP {status}: {text}")));
        }
        resp.json().await.map_err(|e| Error::Retrieval(e.to_string()))
    }

    fn category_filter(&self, category: Option<&str>) -> Option<Value> {
        category.map(|c| {
            json!({
                "must": [{
                    "key": self.category_key,
                    "match": {"value": c},
                }]
            })
        })
    }

    fn query_body(&self, query: &str, mode: SearchMode, k: usize, category: Option<&str>) -> Value {
        let dense = json!({"text": query, "model": self.dense_model});
        let sparse = json!({"text": query, "model": self.sparse_model});

        let mut body = match mode {
            SearchMode::Dense => json!({
                "query": dense,
                "using": self.dense_vector,
            }),
            SearchMode::Sparse => json!({
                "query": sparse,
                "using": self.sparse_vector,
            }),
            SearchMode::Hybrid => json!({
                "prefetch": [
                    {"query": dense, "using": self.dense_vector, "limit": k * 2},
                    {"query": sparse, "using": self.sparse_vector, "limit": k * 2},
                ],
                "query": {"fusion": "rrf"},
            }),
        };
        body["limit"] = json!(k);
        body["with_payload"] = json!(true);
        if let Some(filter) = self.category_filter(category) {
            body["filter"] = filter;
        }
        body
    }
}

/// Pull the document metadata out of a point payload. Payloads written by
/// ingestion tooling nest the real metadata under a `metadata` key; older
/// points carry it flat.
fn normalize_metadata(payload: &Value) -> Value {
    if let Some(inner) = payload.get("metadata") {
        if inner.get("source").is_some()
            || inner.get("title").is_some()
            || inner.get("category").is_some()
        {
            return inner.clone();
        }
    }
    payload.clone()
}

fn point_to_item(index: usize, point: &Value) -> RetrievedItem {
    let payload = point.get("payload").cloned().unwrap_or(Value::Null);
    let content = payload
        .get("page_content")
        .or_else(|| payload.get("content"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    RetrievedItem {
        doc_id: format!("DOC{}", index + 1),
        score: point.get("score").and_then(Value::as_f64).unwrap_or(0.0),
        content,
        metadata: normalize_metadata(&payload),
    }
}

#[async_trait::async_trait]
impl VectorSearch for QdrantStore {
    async fn search(
        &self,
        query: &str,
        mode: SearchMode,
        k: usize,
        category: Option<&str>,
    ) -> Result<Vec<RetrievedItem>> {
        let body = self.query_body(query, mode, k, category);
        let value = self.post("query", body).await?;
        let points = value
            .pointer("/result/points")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(points
            .iter()
            .enumerate()
            .map(|(i, p)| point_to_item(i, p))
            .collect())
    }

    async fn sample_categories(&self, limit: usize) -> Result<Vec<String>> {
        let body = json!({
            "limit": limit,
            "with_payload": true,
            "with_vectors": false,
        });
        let value = self.post("scroll", body).await?;
        let points = value
            .pointer("/result/points")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut cats: Vec<String> = points
            .iter()
            .filter_map(|p| {
                p.pointer("/payload/metadata/category")
                    .and_then(Value::as_str)
                    .map(String::from)
            })
            .collect();
        cats.sort();
        cats.dedup();
        Ok(cats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_metadata_is_unwrapped() {
        let payload = json!({
            "page_content": "본문",
            "metadata": {"category": "terms", "title": "약관", "source": "doc.pdf"},
        });
        let meta = normalize_metadata(&payload);
        assert_eq!(meta["category"], "terms");
    }

    #[test]
    fn flat_payload_is_kept_as_is() {
        let payload = json!({"category": "terms", "title": "약관"});
        let meta = normalize_metadata(&payload);
        assert_eq!(meta["category"], "terms");
    }

    #[test]
    fn point_conversion_reads_content_and_score() {
        let point = json!({
            "id": 7,
            "score": 0.42,
            "payload": {
                "page_content": "위약금 안내",
                "metadata": {"category": "terms", "title": "t", "source": "s"},
            },
        });
        let item = point_to_item(0, &point);
        assert_eq!(item.doc_id, "DOC1");
        assert_eq!(item.content, "위약금 안내");
        assert!((item.score - 0.42).abs() < f64::EPSILON);
        assert_eq!(item.category(), "terms");
    }
}
