//! Prometheus-compatible metrics source
//!
//! Speaks the Prometheus HTTP API (`/api/v1/query`, `/api/v1/query_range`,
//! `/api/v1/alerts`). Range responses are re-sampled onto the requested step
//! grid with NaN sentinels for missing points, so the correlation analyzer
//! always sees equal-length aligned arrays.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::{classify_http, classify_status, MetricsSource, ProviderAlert, RangeSeries};
use crate::resilience::{AdapterError, CallFailure, Guard};

pub struct HttpMetricsSource {
    http: reqwest::Client,
    base_url: String,
    guard: Guard,
}

impl HttpMetricsSource {
    pub fn new(base_url: &str, guard: Guard) -> Self {
        let http = reqwest::Client::new();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            guard,
        }
    }
}

// ---- wire format -----------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PromResponse<T> {
    status: String,
    #[serde(default)]
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PromQueryData {
    result: Vec<PromResult>,
}

#[derive(Debug, Deserialize)]
struct PromResult {
    #[serde(default)]
    value: Option<(f64, String)>,
    #[serde(default)]
    values: Vec<(f64, String)>,
}

#[derive(Debug, Default, Deserialize)]
struct PromAlertsData {
    alerts: Vec<ProviderAlert>,
}

fn parse_sample(ts: f64, raw: &str) -> (DateTime<Utc>, f64) {
    let when = Utc
        .timestamp_opt(ts as i64, ((ts.fract()) * 1e9) as u32)
        .single()
        .unwrap_or_else(Utc::now);
    let value = raw.parse::<f64>().unwrap_or(f64::NAN);
    (when, value)
}

impl HttpMetricsSource {
    async fn get_query<T: serde::de::DeserializeOwned + Default>(
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
        let body: PromResponse<T> = resp
            .json()
            .await
            .map_err(|e| CallFailure::Transient(format!("malformed response: {e}")))?;
        if body.status != "success" {
            return Err(CallFailure::Permanent(
                body.error.unwrap_or_else(|| "query failed".to_string()),
            ));
        }
        body.data
            .ok_or_else(|| CallFailure::Transient("response missing data".to_string()))
    }
}

#[async_trait]
impl MetricsSource for HttpMetricsSource {
    async fn query_instant(
        &self,
        cancel: &CancellationToken,
        expr: &str,
        at: DateTime<Utc>,
    ) -> Result<(f64, DateTime<Utc>), AdapterError> {
        let url = format!("{}/api/v1/query", self.base_url);
        let expr = expr.to_string();
        self.guard
            .execute("metrics.query_instant", cancel, || {
                let query = vec![
                    ("query".to_string(), expr.clone()),
                    ("time".to_string(), at.timestamp().to_string()),
                ];
                let url = url.clone();
                async move {
                    let data: PromQueryData = self.get_query(url, query).await?;
                    let sample = data
                        .result
                        .first()
                        .and_then(|r| r.value.as_ref())
                        .ok_or_else(|| {
                            CallFailure::Permanent("query returned no samples".to_string())
                        })?;
                    let (when, value) = parse_sample(sample.0, &sample.1);
                    Ok((value, when))
                }
            })
            .await
    }

    async fn query_range(
        &self,
        cancel: &CancellationToken,
        expr: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step_secs: u64,
    ) -> Result<RangeSeries, AdapterError> {
        let url = format!("{}/api/v1/query_range", self.base_url);
        let expr = expr.to_string();
        let step = step_secs.max(1);
        self.guard
            .execute("metrics.query_range", cancel, || {
                let query = vec![
                    ("query".to_string(), expr.clone()),
                    ("start".to_string(), start.timestamp().to_string()),
                    ("end".to_string(), end.timestamp().to_string()),
                    ("step".to_string(), step.to_string()),
                ];
                let url = url.clone();
                async move {
                    let data: PromQueryData = self.get_query(url, query).await?;
                    let samples: Vec<(DateTime<Utc>, f64)> = data
                        .result
                        .first()
                        .map(|r| {
                            r.values
                                .iter()
                                .map(|(ts, v)| parse_sample(*ts, v))
                                .collect()
                        })
                        .unwrap_or_default();

                    // Re-sample onto the requested grid; a grid slot without a
                    // sample becomes NaN so the analyzer can drop it pairwise.
                    let mut series = RangeSeries::default();
                    let mut cursor = start;
                    let mut idx = 0usize;
                    while cursor <= end {
                        // Compare at second granularity; fractional-nano
                        // drift in parsed timestamps must not open gaps.
                        let slot = cursor.timestamp();
                        let value = loop {
                            match samples.get(idx) {
                                Some((ts, v)) if ts.timestamp() == slot => break *v,
                                Some((ts, _)) if ts.timestamp() < slot => idx += 1,
                                _ => break f64::NAN,
                            }
                        };
                        series.timestamps.push(cursor);
                        series.values.push(value);
                        cursor += chrono::Duration::seconds(step as i64);
                    }
                    Ok(series)
                }
            })
            .await
    }

    async fn list_active_alerts(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<ProviderAlert>, AdapterError> {
        let url = format!("{}/api/v1/alerts", self.base_url);
        self.guard
            .execute("metrics.list_active_alerts", cancel, || {
                let url = url.clone();
                async move {
                    let data: PromAlertsData = self.get_query(url, Vec::new()).await?;
                    Ok(data.alerts)
                }
            })
            .await
    }
}
