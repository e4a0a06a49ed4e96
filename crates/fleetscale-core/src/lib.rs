//! fleetscale-core — configuration and shared domain types.
//!
//! Every other fleetscale crate receives its settings from an immutable
//! [`ScalerConfig`] built here, so tests can substitute arbitrary threshold
//! sets and file locations without touching ambient state.

pub mod config;
pub mod types;

pub use config::{
    CommandConfig, ConfigError, FleetConfig, InfrastructureConfig, InventoryConfig,
    LoadBalancerConfig, MetricsConfig, MonitoringConfig, NotifyConfig, ScalerConfig,
    StateConfig, StaticGroup, Thresholds,
};
pub use types::{MetricSample, ScalingDecision};
