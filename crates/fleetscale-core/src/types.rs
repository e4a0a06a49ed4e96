//! Domain types shared across the control loop.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One cycle's view of fleet load. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Mean CPU busy percentage across fleet members.
    pub cpu_pct: f64,
    /// Mean memory used percentage across fleet members.
    pub mem_pct: f64,
    /// Probe percentile latency in milliseconds. `None` when no probe
    /// produced a sample.
    pub latency_p90_ms: Option<f64>,
}

impl MetricSample {
    /// Build a sample from already-aggregated readings.
    pub fn new(cpu_pct: f64, mem_pct: f64, latency_p90_ms: Option<f64>) -> Self {
        Self {
            cpu_pct,
            mem_pct,
            latency_p90_ms,
        }
    }
}

impl fmt::Display for MetricSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CPU: {}% | Memory: {}% | RespTime: ", self.cpu_pct, self.mem_pct)?;
        match self.latency_p90_ms {
            Some(ms) => write!(f, "{ms} ms"),
            None => write!(f, "n/a"),
        }
    }
}

/// Outcome of one evaluation. The target size is re-derived from the
/// current membership, so no payload is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalingDecision {
    ScaleOut,
    ScaleIn,
    NoAction,
}

impl ScalingDecision {
    /// True for `ScaleOut` and `ScaleIn`.
    pub fn is_action(self) -> bool {
        !matches!(self, ScalingDecision::NoAction)
    }
}

impl fmt::Display for ScalingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ScalingDecision::ScaleOut => "Scale OUT",
            ScalingDecision::ScaleIn => "Scale IN",
            ScalingDecision::NoAction => "No Action",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_display_matches_notification_layout() {
        let sample = MetricSample::new(85.0, 40.5, Some(3000.0));
        assert_eq!(
            sample.to_string(),
            "CPU: 85% | Memory: 40.5% | RespTime: 3000 ms"
        );
    }

    #[test]
    fn sample_display_without_latency() {
        let sample = MetricSample::new(1.0, 2.0, None);
        assert!(sample.to_string().ends_with("RespTime: n/a"));
    }

    #[test]
    fn only_no_action_is_inert() {
        assert!(ScalingDecision::ScaleOut.is_action());
        assert!(ScalingDecision::ScaleIn.is_action());
        assert!(!ScalingDecision::NoAction.is_action());
    }
}
