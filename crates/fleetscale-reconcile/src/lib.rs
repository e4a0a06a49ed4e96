//! fleetscale-reconcile — bring external systems in line with a target membership.
//!
//! # Step Order
//!
//! ```text
//! UpdatePersistedState   terraform.tfvars web_ips line
//! ApplyInfrastructure    terraform apply
//! UpdateInventory        ansible inventory.ini
//! UpdateMonitoringTargets prometheus.yml scrape_configs + restart
//! UpdateLoadBalancer     nginx upstream template + push + reload
//! ```
//!
//! The first failing step aborts the run. Nothing is rolled back: steps
//! already applied stay applied and the returned [`ReconcileReport`] lists
//! them next to the steps left pending.
//!
//! External tools sit behind [`InfrastructureApplier`], [`ConfigPusher`]
//! and [`ServiceReloader`]. [`ProcessTools`] runs the configured commands;
//! `RecordingTools`, behind the `testing` feature, records calls instead.

pub mod error;
pub mod orchestrator;
#[cfg(any(test, feature = "testing"))]
pub mod recording;
pub mod render;
pub mod step;
pub mod tools;

pub use error::{StepError, ToolError};
pub use orchestrator::{Orchestrator, ReconcileOutcome, ReconcileReport};
#[cfg(any(test, feature = "testing"))]
pub use recording::{RecordingTools, ToolCall};
pub use step::ReconcileStep;
pub use tools::{ConfigPusher, InfrastructureApplier, ManagedService, ProcessTools, ServiceReloader};
