//! fleetscale-state — persisted fleet membership.
//!
//! The membership lives as one `web_ips = [...]` line inside the Terraform
//! variables file so that the provisioner reads the same list the control
//! loop writes. Every other line of that file belongs to the operator and
//! is carried through untouched.
//!
//! A missing or unreadable membership line is not fatal: [`FleetStateStore::load`]
//! falls back to the minimum-size canonical block.

pub mod error;
pub mod store;

pub use error::{StateError, StateResult};
pub use store::{FleetState, FleetStateStore};
