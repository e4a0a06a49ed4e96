//! DecisionEngine — hysteresis thresholding over one metric sample.

use tracing::debug;

use fleetscale_core::{FleetConfig, MetricSample, ScalerConfig, ScalingDecision, Thresholds};

/// Evaluates a sample against fixed thresholds and fleet bounds.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    thresholds: Thresholds,
    min_instances: u32,
    max_instances: u32,
}

impl DecisionEngine {
    /// Engine over `thresholds`, bounded by the fleet's min and max size.
    pub fn new(thresholds: Thresholds, fleet: &FleetConfig) -> Self {
        Self {
            thresholds,
            min_instances: fleet.min_instances,
            max_instances: fleet.max_instances,
        }
    }

    /// Engine using the thresholds and bounds from `config`.
    pub fn from_config(config: &ScalerConfig) -> Self {
        Self::new(config.thresholds.clone(), &config.fleet)
    }

    /// Decide for `current_count` members under `sample`.
    pub fn evaluate(&self, sample: &MetricSample, current_count: u32) -> ScalingDecision {
        let t = &self.thresholds;

        let overloaded = sample.cpu_pct > t.cpu_high
            || sample.mem_pct > t.mem_high
            || sample
                .latency_p90_ms
                .is_some_and(|ms| ms >= t.latency_high_ms);

        if overloaded && current_count < self.max_instances {
            debug!(
                cpu = sample.cpu_pct,
                mem = sample.mem_pct,
                latency_ms = ?sample.latency_p90_ms,
                count = current_count,
                "scale-out thresholds crossed"
            );
            return ScalingDecision::ScaleOut;
        }

        let idle = sample.cpu_pct < t.cpu_low
            && sample.mem_pct < t.mem_low
            && sample
                .latency_p90_ms
                .is_none_or(|ms| ms < t.latency_low_ms);

        if idle && current_count > self.min_instances {
            debug!(
                cpu = sample.cpu_pct,
                mem = sample.mem_pct,
                latency_ms = ?sample.latency_p90_ms,
                count = current_count,
                "scale-in thresholds crossed"
            );
            return ScalingDecision::ScaleIn;
        }

        ScalingDecision::NoAction
    }
}
