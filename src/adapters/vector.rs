//! Vector store adapter (Qdrant-style HTTP API)

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::{classify_http, classify_status, SearchHit, VectorStore};
use crate::resilience::{AdapterError, CallFailure, Guard};

pub struct HttpVectorStore {
    http: reqwest::Client,
    base_url: String,
    collection: String,
    guard: Guard,
}

impl HttpVectorStore {
    pub fn new(base_url: &str, collection: &str, guard: Guard) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
            guard,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<SearchHit>,
}

#[async_trait]
impl VectorStore for HttpVectorStore {
    async fn upsert(
        &self,
        cancel: &CancellationToken,
        id: &str,
        vector: &[f32],
        payload: Value,
    ) -> Result<(), AdapterError> {
        let url = format!(
            "{}/collections/{}/points",
            self.base_url, self.collection
        );
        let body = json!({
            "points": [{ "id": id, "vector": vector, "payload": payload }]
        });
        self.guard
            .execute("vector.upsert", cancel, || {
                let url = url.clone();
                let body = body.clone();
                async move {
                    let resp = self
                        .http
                        .put(&url)
                        .json(&body)
                        .send()
                        .await
                        .map_err(|e| classify_http(&e))?;
                    if !resp.status().is_success() {
                        return Err(classify_status(resp.status()));
                    }
                    Ok(())
                }
            })
            .await
    }

    async fn search(
        &self,
        cancel: &CancellationToken,
        vector: &[f32],
        top_k: usize,
        min_score: f64,
    ) -> Result<Vec<SearchHit>, AdapterError> {
        let url = format!(
            "{}/collections/{}/points/search",
            self.base_url, self.collection
        );
        let body = json!({
            "vector": vector,
            "limit": top_k,
            "score_threshold": min_score,
            "with_payload": true,
        });
        self.guard
            .execute("vector.search", cancel, || {
                let url = url.clone();
                let body = body.clone();
                async move {
                    let resp = self
                        .http
                        .post(&url)
                        .json(&body)
                        .send()
                        .await
                        .map_err(|e| classify_http(&e))?;
                    if !resp.status().is_success() {
                        return Err(classify_status(resp.status()));
                    }
                    let parsed: SearchResponse = resp
                        .json()
                        .await
                        .map_err(|e| CallFailure::Transient(format!("malformed response: {e}")))?;
                    Ok(parsed.result)
                }
            })
            .await
    }
}
