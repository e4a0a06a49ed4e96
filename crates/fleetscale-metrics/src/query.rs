//! Prometheus instant-query client.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Why a metrics backend query produced no usable result.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("metrics backend unreachable: {0}")]
    Transport(String),

    #[error("metrics backend returned HTTP {0}")]
    Status(u16),

    #[error("metrics backend reported {error_type}: {error}")]
    Backend { error_type: String, error: String },

    #[error("unexpected response shape: {0}")]
    Decode(String),

    #[error("non-numeric sample for {instance}: {value}")]
    Value { instance: String, value: String },

    #[error("invalid metrics configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for QueryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            QueryError::Decode(e.to_string())
        } else {
            QueryError::Transport(e.to_string())
        }
    }
}

/// One instance's sample from a vector result.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceValue {
    pub instance: String,
    pub value: f64,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
    #[serde(default, rename = "errorType")]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(default)]
    result: Vec<VectorSample>,
}

#[derive(Debug, Deserialize)]
struct VectorSample {
    #[serde(default)]
    metric: HashMap<String, String>,
    /// `[unix_ts, "value"]`
    value: (f64, String),
}

/// Thin client over `GET /api/v1/query`.
pub struct PrometheusClient {
    http: reqwest::Client,
    base_url: String,
}

impl PrometheusClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, QueryError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QueryError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Run an instant query and return one value per series.
    pub async fn query(&self, promql: &str) -> Result<Vec<InstanceValue>, QueryError> {
        let url = format!("{}/api/v1/query", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("query", promql)])
            .send()
            .await?;

        let status = resp.status();
        // Prometheus answers 400/422 with a JSON error body worth surfacing.
        let body: QueryResponse = match resp.json().await {
            Ok(body) => body,
            Err(_) if !status.is_success() => return Err(QueryError::Status(status.as_u16())),
            Err(e) => return Err(e.into()),
        };

        if body.status != "success" {
            return Err(QueryError::Backend {
                error_type: body.error_type.unwrap_or_else(|| "error".to_string()),
                error: body.error.unwrap_or_default(),
            });
        }
        if !status.is_success() {
            return Err(QueryError::Status(status.as_u16()));
        }

        let samples = body.data.map(|d| d.result).unwrap_or_default();
        let mut values = Vec::with_capacity(samples.len());
        for sample in samples {
            let instance = sample
                .metric
                .get("instance")
                .cloned()
                .unwrap_or_default();
            let (_, raw) = sample.value;
            let value = raw.parse::<f64>().map_err(|_| QueryError::Value {
                instance: instance.clone(),
                value: raw.clone(),
            })?;
            values.push(InstanceValue { instance, value });
        }

        debug!(series = values.len(), "prometheus query answered");
        Ok(values)
    }
}

/// Arithmetic mean of the per-instance values, `0.0` for an empty set.
pub fn mean(values: &[InstanceValue]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|v| v.value).sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetscale_notify::testing::{StubServer, closed_addr};

    const VECTOR: &str = r#"{"status":"success","data":{"resultType":"vector","result":[
        {"metric":{"instance":"10.2.22.21:9100"},"value":[1712345678.1,"40.5"]},
        {"metric":{"instance":"10.2.22.22:9100"},"value":[1712345678.1,"59.5"]}]}}"#;

    fn client(base: &str) -> PrometheusClient {
        PrometheusClient::new(base, Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn parses_vector_result() {
        let server = StubServer::start("200 OK", VECTOR).await;
        let values = client(&server.url("")).query("up").await.unwrap();

        assert_eq!(values.len(), 2);
        assert_eq!(values[0].instance, "10.2.22.21:9100");
        assert_eq!(values[1].value, 59.5);
        assert_eq!(mean(&values), 50.0);
    }

    #[tokio::test]
    async fn sends_query_as_url_parameter() {
        let server = StubServer::start("200 OK", VECTOR).await;
        client(&server.url("/")).query("up{job=\"x\"}").await.unwrap();

        let request = &server.requests()[0];
        assert!(request.starts_with("GET /api/v1/query?query=up%7Bjob%3D%22x%22%7D "));
    }

    #[tokio::test]
    async fn empty_result_is_ok_and_means_zero() {
        let server = StubServer::start(
            "200 OK",
            r#"{"status":"success","data":{"resultType":"vector","result":[]}}"#,
        )
        .await;
        let values = client(&server.url("")).query("up").await.unwrap();
        assert!(values.is_empty());
        assert_eq!(mean(&values), 0.0);
    }

    #[tokio::test]
    async fn backend_error_is_reported() {
        let server = StubServer::start(
            "400 Bad Request",
            r#"{"status":"error","errorType":"bad_data","error":"parse error"}"#,
        )
        .await;
        let err = client(&server.url("")).query("(").await.unwrap_err();
        assert!(matches!(err, QueryError::Backend { ref error_type, .. } if error_type == "bad_data"));
    }

    #[tokio::test]
    async fn non_json_error_status_is_reported() {
        let server = StubServer::start("503 Service Unavailable", "down").await;
        let err = client(&server.url("")).query("up").await.unwrap_err();
        assert!(matches!(err, QueryError::Status(503)));
    }

    #[tokio::test]
    async fn non_numeric_value_is_rejected() {
        let server = StubServer::start(
            "200 OK",
            r#"{"status":"success","data":{"result":[{"metric":{"instance":"a"},"value":[1,"abc"]}]}}"#,
        )
        .await;
        let err = client(&server.url("")).query("up").await.unwrap_err();
        assert!(matches!(err, QueryError::Value { .. }));
    }

    #[tokio::test]
    async fn unreachable_backend_is_transport_error() {
        let addr = closed_addr().await;
        let err = client(&format!("http://{addr}")).query("up").await.unwrap_err();
        assert!(matches!(err, QueryError::Transport(_)));
    }
}
