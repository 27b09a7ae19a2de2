//! Cluster introspection over the Kubernetes-style read API
//!
//! Narrow read-only surface: pod listings, pod logs, namespace events.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::{classify_http, classify_status, ClusterIntrospection, EventInfo, PodInfo};
use crate::resilience::{AdapterError, CallFailure, Guard};

pub struct HttpClusterIntrospection {
    http: reqwest::Client,
    base_url: String,
    guard: Guard,
}

impl HttpClusterIntrospection {
    pub fn new(base_url: &str, guard: Guard) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            guard,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
        query: Vec<(String, String)>,
    ) -> Result<T, CallFailure> {
        let resp = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| classify_http(&e))?;
        if !resp.status().is_success() {
            return Err(classify_status(resp.status()));
        }
        resp.json()
            .await
            .map_err(|e| CallFailure::Transient(format!("malformed response: {e}")))
    }
}

#[derive(Debug, Deserialize)]
struct PodList {
    items: Vec<PodInfo>,
}

#[derive(Debug, Deserialize)]
struct EventList {
    items: Vec<EventInfo>,
}

#[async_trait]
impl ClusterIntrospection for HttpClusterIntrospection {
    async fn list_pods(
        &self,
        cancel: &CancellationToken,
        selector: &str,
    ) -> Result<Vec<PodInfo>, AdapterError> {
        let url = format!("{}/api/v1/pods", self.base_url);
        let selector = selector.to_string();
        self.guard
            .execute("introspection.list_pods", cancel, || {
                let url = url.clone();
                let query = vec![("labelSelector".to_string(), selector.clone())];
                async move {
                    let list: PodList = self.get_json(url, query).await?;
                    Ok(list.items)
                }
            })
            .await
    }

    async fn fetch_logs(
        &self,
        cancel: &CancellationToken,
        pod: &str,
        since: DateTime<Utc>,
        max_lines: usize,
    ) -> Result<String, AdapterError> {
        let url = format!("{}/api/v1/pods/{}/log", self.base_url, pod);
        self.guard
            .execute("introspection.fetch_logs", cancel, || {
                let url = url.clone();
                let query = vec![
                    ("sinceTime".to_string(), since.to_rfc3339()),
                    ("tailLines".to_string(), max_lines.to_string()),
                ];
                async move {
                    let resp = self
                        .http
                        .get(&url)
                        .query(&query)
                        .send()
                        .await
                        .map_err(|e| classify_http(&e))?;
                    if !resp.status().is_success() {
                        return Err(classify_status(resp.status()));
                    }
                    resp.text()
                        .await
                        .map_err(|e| CallFailure::Transient(format!("malformed response: {e}")))
                }
            })
            .await
    }

    async fn fetch_events(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<EventInfo>, AdapterError> {
        let url = format!("{}/api/v1/namespaces/{}/events", self.base_url, namespace);
        self.guard
            .execute("introspection.fetch_events", cancel, || {
                let url = url.clone();
                let query = vec![("sinceTime".to_string(), since.to_rfc3339())];
                async move {
                    let list: EventList = self.get_json(url, query).await?;
                    Ok(list.items)
                }
            })
            .await
    }
}
