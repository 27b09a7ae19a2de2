//! Text generator adapter - embeddings and completions over HTTP
//!
//! Both operations fail transiently when the model service is saturated;
//! the guard's retry budget absorbs brief unavailability and surfaces the
//! rest as `UPSTREAM_UNAVAILABLE`, which the recommender treats as "fall
//! back to specialist actions".

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::{classify_http, classify_status, TextGenerator};
use crate::resilience::{AdapterError, CallFailure, Guard};

/// Completion tuning options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationParams {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    #[serde(default)]
    pub stop: Vec<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            model: "default".to_string(),
            max_tokens: 1024,
            temperature: 0.2,
            stop: Vec::new(),
        }
    }
}

pub struct HttpTextGenerator {
    http: reqwest::Client,
    base_url: String,
    guard: Guard,
}

impl HttpTextGenerator {
    pub fn new(base_url: &str, guard: Guard) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            guard,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    text: String,
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn embed(
        &self,
        cancel: &CancellationToken,
        text: &str,
    ) -> Result<Vec<f32>, AdapterError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({ "input": text });
        self.guard
            .execute("generator.embed", cancel, || {
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
                    let parsed: EmbedResponse = resp
                        .json()
                        .await
                        .map_err(|e| CallFailure::Transient(format!("malformed response: {e}")))?;
                    if parsed.embedding.is_empty() {
                        return Err(CallFailure::Transient("empty embedding".to_string()));
                    }
                    Ok(parsed.embedding)
                }
            })
            .await
    }

    async fn generate(
        &self,
        cancel: &CancellationToken,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, AdapterError> {
        let url = format!("{}/v1/completions", self.base_url);
        let body = json!({
            "model": params.model,
            "prompt": prompt,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
            "stop": params.stop,
        });
        self.guard
            .execute("generator.generate", cancel, || {
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
                    let parsed: GenerateResponse = resp
                        .json()
                        .await
                        .map_err(|e| CallFailure::Transient(format!("malformed response: {e}")))?;
                    Ok(parsed.text)
                }
            })
            .await
    }
}
