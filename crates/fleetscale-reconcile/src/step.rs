//! Reconciliation steps.

use std::fmt;

/// One idempotent update of a single external system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconcileStep {
    UpdatePersistedState,
    ApplyInfrastructure,
    UpdateInventory,
    UpdateMonitoringTargets,
    UpdateLoadBalancer,
}

impl ReconcileStep {
    /// Every step in execution order.
    pub const ALL: [ReconcileStep; 5] = [
        ReconcileStep::UpdatePersistedState,
        ReconcileStep::ApplyInfrastructure,
        ReconcileStep::UpdateInventory,
        ReconcileStep::UpdateMonitoringTargets,
        ReconcileStep::UpdateLoadBalancer,
    ];

    /// Operator-facing name used in notifications.
    pub fn title(self) -> &'static str {
        match self {
            ReconcileStep::UpdatePersistedState => "Fleet state update",
            ReconcileStep::ApplyInfrastructure => "Terraform apply",
            ReconcileStep::UpdateInventory => "Inventory update",
            ReconcileStep::UpdateMonitoringTargets => "Prometheus config update",
            ReconcileStep::UpdateLoadBalancer => "Load balancer reload",
        }
    }
}

impl fmt::Display for ReconcileStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReconcileStep::UpdatePersistedState => "update_persisted_state",
            ReconcileStep::ApplyInfrastructure => "apply_infrastructure",
            ReconcileStep::UpdateInventory => "update_inventory",
            ReconcileStep::UpdateMonitoringTargets => "update_monitoring_targets",
            ReconcileStep::UpdateLoadBalancer => "update_load_balancer",
        };
        f.write_str(name)
    }
}
