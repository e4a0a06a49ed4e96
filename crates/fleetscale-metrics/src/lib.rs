//! fleetscale-metrics — one cycle's load observation.
//!
//! Produces a [`MetricSample`](fleetscale_core::MetricSample) from two
//! sources:
//!
//! ```text
//! MetricsProbe
//!   ├── sample_load()    → Prometheus instant queries → mean CPU / memory %
//!   └── sample_latency() → N sequential GETs → exclusive-quantile percentile
//! ```
//!
//! Nothing here fails a cycle. A backend that cannot be queried reads as
//! 0.0 load (which can make an unreachable Prometheus look like an idle
//! fleet), and a probe that cannot connect counts as the full timeout.

pub mod latency;
pub mod percentile;
pub mod probe;
pub mod query;

pub use latency::{LatencyProber, ProbeResult};
pub use percentile::exclusive_quantile;
pub use probe::{MetricsProbe, MetricsSource};
pub use query::{InstanceValue, PrometheusClient, QueryError};

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
