//! Orchestrator — runs the reconciliation steps in order.

use std::sync::Arc;

use tracing::{info, warn};

use fleetscale_core::{
    InventoryConfig, LoadBalancerConfig, MetricSample, MonitoringConfig, ScalerConfig,
    ScalingDecision,
};
use fleetscale_notify::Notifier;
use fleetscale_state::{FleetState, FleetStateStore};

use crate::error::StepError;
use crate::render::{render_inventory, render_scrape_configs, render_upstream, splice_scrape_configs};
use crate::step::ReconcileStep;
use crate::tools::{ConfigPusher, InfrastructureApplier, ManagedService, ProcessTools, ServiceReloader};

/// How a reconciliation run ended.
#[derive(Debug)]
pub enum ReconcileOutcome {
    Completed,
    /// `step` failed; every step before it is applied, none after it ran.
    Aborted { step: ReconcileStep, error: StepError },
}

/// What a reconciliation run did, including any partial state it left.
#[derive(Debug)]
pub struct ReconcileReport {
    pub decision: ScalingDecision,
    pub previous_count: usize,
    pub target: Vec<String>,
    pub applied: Vec<ReconcileStep>,
    pub outcome: ReconcileOutcome,
}

impl ReconcileReport {
    pub fn is_complete(&self) -> bool {
        matches!(self.outcome, ReconcileOutcome::Completed)
    }

    /// Steps that never ran, the failed one included.
    pub fn pending(&self) -> Vec<ReconcileStep> {
        ReconcileStep::ALL
            .into_iter()
            .filter(|s| !self.applied.contains(s))
            .collect()
    }
}

/// Drives the fixed step sequence against the external systems.
pub struct Orchestrator {
    store: FleetStateStore,
    inventory: InventoryConfig,
    monitoring: MonitoringConfig,
    load_balancer: LoadBalancerConfig,
    applier: Arc<dyn InfrastructureApplier>,
    pusher: Arc<dyn ConfigPusher>,
    reloader: Arc<dyn ServiceReloader>,
    notifier: Arc<dyn Notifier>,
}

impl Orchestrator {
    /// Create an orchestrator that runs the configured commands.
    pub fn new(config: &ScalerConfig, store: FleetStateStore, notifier: Arc<dyn Notifier>) -> Self {
        let tools = Arc::new(ProcessTools::new(config));
        Self {
            store,
            inventory: config.inventory.clone(),
            monitoring: config.monitoring.clone(),
            load_balancer: config.load_balancer.clone(),
            applier: tools.clone(),
            pusher: tools.clone(),
            reloader: tools,
            notifier,
        }
    }

    /// Replace all three tool collaborators with one implementation.
    pub fn with_tools<T>(mut self, tools: Arc<T>) -> Self
    where
        T: InfrastructureApplier + ConfigPusher + ServiceReloader + 'static,
    {
        self.applier = tools.clone();
        self.pusher = tools.clone();
        self.reloader = tools;
        self
    }

    /// Bring every external system in line with `target`.
    ///
    /// Stops at the first failing step and sends a failure notification
    /// for it. A success notification is sent only when all steps applied.
    pub async fn reconcile(
        &self,
        decision: ScalingDecision,
        previous: &FleetState,
        target: Vec<String>,
        sample: &MetricSample,
    ) -> ReconcileReport {
        let mut report = ReconcileReport {
            decision,
            previous_count: previous.len(),
            target,
            applied: Vec::with_capacity(ReconcileStep::ALL.len()),
            outcome: ReconcileOutcome::Completed,
        };

        for step in ReconcileStep::ALL {
            if let Err(error) = self.run_step(step, &report.target).await {
                report.outcome = ReconcileOutcome::Aborted { step, error };
                break;
            }
            report.applied.push(step);
        }

        match &report.outcome {
            ReconcileOutcome::Completed => {
                info!(
                    %decision,
                    from = report.previous_count,
                    to = report.target.len(),
                    "scaling completed"
                );
                self.notifier
                    .notify(&success_message(&report, sample))
                    .await;
            }
            ReconcileOutcome::Aborted { step, error } => {
                warn!(
                    %decision,
                    %step,
                    %error,
                    applied = ?report.applied,
                    pending = ?report.pending(),
                    "reconciliation aborted, external systems left partially updated"
                );
                self.notifier
                    .notify(&failure_message(&report, *step, error))
                    .await;
            }
        }

        report
    }

    async fn run_step(&self, step: ReconcileStep, target: &[String]) -> Result<(), StepError> {
        match step {
            ReconcileStep::UpdatePersistedState => {
                self.store.store(&FleetState::new(target.to_vec()))?;
                info!(path = ?self.store.path(), members = ?target, "fleet state updated");
            }
            ReconcileStep::ApplyInfrastructure => {
                info!("applying infrastructure");
                self.applier.apply().await?;
                info!("infrastructure applied");
            }
            ReconcileStep::UpdateInventory => {
                let path = &self.inventory.path;
                tokio::fs::write(path, render_inventory(&self.inventory, target))
                    .await
                    .map_err(StepError::io(path))?;
                info!(?path, "inventory updated");
            }
            ReconcileStep::UpdateMonitoringTargets => {
                let live = &self.monitoring.config_path;
                let existing = tokio::fs::read_to_string(live)
                    .await
                    .map_err(StepError::io(live))?;
                let block = render_scrape_configs(&self.monitoring, target);
                let updated = splice_scrape_configs(&existing, &block)
                    .ok_or_else(|| StepError::MissingMarker(live.clone()))?;

                let staging = &self.monitoring.staging_path;
                tokio::fs::write(staging, updated)
                    .await
                    .map_err(StepError::io(staging))?;
                self.pusher.push(ManagedService::Monitoring, staging).await?;
                info!(path = ?live, "monitoring targets updated");
                self.reloader.reload(ManagedService::Monitoring).await?;
                info!("monitoring restarted");
            }
            ReconcileStep::UpdateLoadBalancer => {
                let path = &self.load_balancer.template_path;
                tokio::fs::write(path, render_upstream(target))
                    .await
                    .map_err(StepError::io(path))?;
                info!(?path, "load balancer template rendered");
                self.pusher.push(ManagedService::LoadBalancer, path).await?;
                info!(host = %self.load_balancer.host, "load balancer config pushed");
                self.reloader.reload(ManagedService::LoadBalancer).await?;
                info!(host = %self.load_balancer.host, "load balancer reloaded");
            }
        }
        Ok(())
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn step_list(steps: &[ReconcileStep]) -> String {
    if steps.is_empty() {
        return "none".to_string();
    }
    steps.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(", ")
}

fn success_message(report: &ReconcileReport, sample: &MetricSample) -> String {
    format!(
        "[{}]\nInstances: {} -> {}\n{}\nTime: {}",
        report.decision,
        report.previous_count,
        report.target.len(),
        sample,
        timestamp()
    )
}

fn failure_message(report: &ReconcileReport, step: ReconcileStep, error: &StepError) -> String {
    let pending: Vec<ReconcileStep> = report
        .pending()
        .into_iter()
        .filter(|s| *s != step)
        .collect();
    format!(
        "{} failed!\nError: {}\nApplied: {}\nSkipped: {}\nTime: {}",
        step.title(),
        error,
        step_list(&report.applied),
        step_list(&pending),
        timestamp()
    )
}
