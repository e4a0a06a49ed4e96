//! fleetscaled — the control loop driver.
//!
//! One invocation runs exactly one cycle:
//!
//! ```text
//!  MetricsSource ──sample──► DecisionEngine ◄── FleetStateStore (read once)
//!                                │
//!                          ScalingDecision
//!                                │
//!                      MembershipPlanner (target)
//!                                │
//!                         Orchestrator ──► state, apply, inventory,
//!                                │         monitoring, load balancer
//!                                ▼
//!                            Notifier
//! ```
//!
//! The binary in `main.rs` wires production collaborators; tests drive
//! [`cycle::ControlLoop`] with fakes.

pub mod cycle;

pub use cycle::{ControlLoop, CycleLock, CycleReport, NoLock};
