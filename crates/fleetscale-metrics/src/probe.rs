//! MetricsProbe — assembles a `MetricSample` for one cycle.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use fleetscale_core::{MetricSample, MetricsConfig};
use fleetscale_notify::Notifier;

use crate::latency::LatencyProber;
use crate::query::{PrometheusClient, QueryError, mean};
use crate::round2;

/// Anything that can observe the fleet once per cycle.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn sample(&self) -> MetricSample;
}

pub struct MetricsProbe {
    prometheus: PrometheusClient,
    prober: LatencyProber,
    cpu_query: String,
    mem_query: String,
    notifier: Arc<dyn Notifier>,
}

impl MetricsProbe {
    pub fn new(config: &MetricsConfig, notifier: Arc<dyn Notifier>) -> Result<Self, QueryError> {
        let prometheus = PrometheusClient::new(
            &config.prometheus_url,
            Duration::from_secs(config.query_timeout_secs),
        )?;
        let prober = LatencyProber::from_config(config)
            .map_err(|e| QueryError::Config(format!("probe_url {}: {e}", config.probe_url)))?;
        Ok(Self {
            prometheus,
            prober,
            cpu_query: config.cpu_query.clone(),
            mem_query: config.mem_query.clone(),
            notifier,
        })
    }

    /// Mean CPU and memory utilisation across fleet members.
    pub async fn sample_load(&self) -> (f64, f64) {
        let cpu = self.aggregate("cpu", &self.cpu_query).await;
        let mem = self.aggregate("mem", &self.mem_query).await;
        (cpu, mem)
    }

    pub async fn sample_latency(&self) -> Option<f64> {
        self.prober.sample_latency().await
    }

    async fn aggregate(&self, resource: &str, promql: &str) -> f64 {
        match self.prometheus.query(promql).await {
            Ok(values) => {
                let avg = round2(mean(&values));
                debug!(resource, series = values.len(), avg, "load sampled");
                avg
            }
            Err(e) => {
                warn!(resource, error = %e, "metrics query failed, reading as 0.0");
                self.notifier
                    .notify(&format!("Metrics query failed:\n{e}"))
                    .await;
                0.0
            }
        }
    }
}

#[async_trait]
impl MetricsSource for MetricsProbe {
    async fn sample(&self) -> MetricSample {
        let (cpu_pct, mem_pct) = self.sample_load().await;
        let latency_p90_ms = self.sample_latency().await;
        MetricSample::new(cpu_pct, mem_pct, latency_p90_ms)
    }
}
