//! fleetscale-autoscale — threshold-based scaling decisions.
//!
//! Compares one `MetricSample` against fixed hysteresis thresholds and
//! derives the fleet membership a decision calls for. Both halves are pure:
//! no I/O, no clock, no state between calls.
//!
//! # Decision Rules
//!
//! ```text
//! if (cpu > cpu_high or mem > mem_high or latency >= latency_high)
//!    and count < max:
//!     ScaleOut
//! elif cpu < cpu_low and mem < mem_low
//!    and (latency absent or latency < latency_low)
//!    and count > min:
//!     ScaleIn
//! else:
//!     NoAction
//! ```
//!
//! Scale-out is checked first, so it wins whenever a threshold set lets
//! both rules match.
//!
//! # Membership
//!
//! Scale-out rebuilds the canonical contiguous block one larger than the
//! current count; scale-in drops the last member.

pub mod planner;
pub mod scaler;

pub use planner::MembershipPlanner;
pub use scaler::DecisionEngine;
