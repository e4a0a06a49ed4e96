//! ControlLoop — one observe, decide, reconcile cycle.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use fleetscale_autoscale::{DecisionEngine, MembershipPlanner};
use fleetscale_core::{MetricSample, ScalerConfig, ScalingDecision};
use fleetscale_metrics::MetricsSource;
use fleetscale_notify::Notifier;
use fleetscale_reconcile::{
    ConfigPusher, InfrastructureApplier, Orchestrator, ReconcileReport, ServiceReloader,
};
use fleetscale_state::{FleetState, FleetStateStore};

/// Mutual exclusion around a whole cycle.
///
/// The control loop itself takes no lock; two overlapping invocations would
/// both read the same membership and race on every artifact. Callers that
/// can overlap implement this and use [`ControlLoop::run_locked`].
#[async_trait]
pub trait CycleLock: Send + Sync {
    /// Held for the duration of the cycle and released on drop.
    type Guard: Send;

    async fn acquire(&self) -> anyhow::Result<Self::Guard>;
}

/// Lock that never blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLock;

#[async_trait]
impl CycleLock for NoLock {
    type Guard = ();

    async fn acquire(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// What one cycle observed and did.
#[derive(Debug)]
pub struct CycleReport {
    pub sample: MetricSample,
    pub decision: ScalingDecision,
    pub previous: FleetState,
    /// Planned membership; `None` for `NoAction`.
    pub target: Option<Vec<String>>,
    /// `None` when nothing was reconciled (no action, or a dry run).
    pub reconcile: Option<ReconcileReport>,
}

/// Observe, decide, plan and reconcile, once per call.
pub struct ControlLoop {
    source: Arc<dyn MetricsSource>,
    store: FleetStateStore,
    engine: DecisionEngine,
    planner: MembershipPlanner,
    orchestrator: Orchestrator,
    dry_run: bool,
}

impl ControlLoop {
    /// Loop wired to production reconciliation tools; swap them with
    /// [`ControlLoop::with_tools`].
    pub fn new(
        config: &ScalerConfig,
        source: Arc<dyn MetricsSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let store = FleetStateStore::new(&config.state, &config.fleet);
        let orchestrator = Orchestrator::new(
            config,
            FleetStateStore::new(&config.state, &config.fleet),
            notifier,
        );
        Self {
            source,
            store,
            engine: DecisionEngine::from_config(config),
            planner: MembershipPlanner::new(config.fleet.clone()),
            orchestrator,
            dry_run: false,
        }
    }

    /// Route every external tool call through `tools`.
    pub fn with_tools<T>(mut self, tools: Arc<T>) -> Self
    where
        T: InfrastructureApplier + ConfigPusher + ServiceReloader + 'static,
    {
        self.orchestrator = self.orchestrator.with_tools(tools);
        self
    }

    /// Decide and log only; leave every artifact untouched.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run one cycle inside `lock`.
    pub async fn run_locked<L: CycleLock>(&self, lock: &L) -> anyhow::Result<CycleReport> {
        let _guard = lock.acquire().await?;
        Ok(self.run_once().await)
    }

    /// Run one cycle. Observation and reconciliation failures are handled
    /// inside and show up in the report, so this never fails.
    pub async fn run_once(&self) -> CycleReport {
        info!("========== autoscale cycle start ==========");

        let sample = self.source.sample().await;
        let previous = self.store.load();
        info!(
            cpu = sample.cpu_pct,
            mem = sample.mem_pct,
            members = previous.len(),
            latency_p90_ms = ?sample.latency_p90_ms,
            "fleet observed"
        );

        let decision = self.engine.evaluate(&sample, previous.count());
        info!(%decision, "scaling decision");

        let Some(target) = self.planner.plan(decision, &previous.members) else {
            info!("no scaling needed");
            return CycleReport {
                sample,
                decision,
                previous,
                target: None,
                reconcile: None,
            };
        };

        info!(from = previous.len(), to = target.len(), members = ?target, "membership planned");

        if self.dry_run {
            info!("dry run, skipping reconciliation");
            return CycleReport {
                sample,
                decision,
                previous,
                target: Some(target),
                reconcile: None,
            };
        }

        let report = self
            .orchestrator
            .reconcile(decision, &previous, target.clone(), &sample)
            .await;
        debug!(applied = ?report.applied, complete = report.is_complete(), "cycle finished");

        CycleReport {
            sample,
            decision,
            previous,
            target: Some(target),
            reconcile: Some(report),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use fleetscale_notify::MemoryNotifier;
    use fleetscale_reconcile::RecordingTools;

    struct Fixed(MetricSample);

    #[async_trait]
    impl MetricsSource for Fixed {
        async fn sample(&self) -> MetricSample {
            self.0
        }
    }

    struct CountingLock {
        acquired: AtomicUsize,
        refuse: bool,
    }

    #[async_trait]
    impl CycleLock for CountingLock {
        type Guard = ();

        async fn acquire(&self) -> anyhow::Result<()> {
            if self.refuse {
                anyhow::bail!("another cycle is running");
            }
            self.acquired.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn config(dir: &std::path::Path) -> ScalerConfig {
        let mut config = ScalerConfig::default();
        config.state.tfvars_path = dir.join("terraform.tfvars");
        config.inventory.path = dir.join("inventory.ini");
        config.monitoring.config_path = dir.join("prometheus.yml");
        config.monitoring.staging_path = dir.join("prometheus.staged.yml");
        config.load_balancer.template_path = dir.join("nginx-lb.conf.j2");
        config
    }

    fn control(config: &ScalerConfig, sample: MetricSample) -> (ControlLoop, Arc<RecordingTools>) {
        let tools = Arc::new(RecordingTools::new());
        let control = ControlLoop::new(
            config,
            Arc::new(Fixed(sample)),
            Arc::new(MemoryNotifier::new()),
        )
        .with_tools(tools.clone());
        (control, tools)
    }

    #[tokio::test]
    async fn dry_run_plans_but_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let (control, tools) = control(&config, MetricSample::new(95.0, 10.0, Some(100.0)));

        let report = control.dry_run(true).run_once().await;

        assert_eq!(report.decision, ScalingDecision::ScaleOut);
        assert_eq!(report.target.as_ref().map(Vec::len), Some(3));
        assert!(report.reconcile.is_none());
        assert!(tools.calls().is_empty());
        assert!(!config.state.tfvars_path.exists());
        assert!(!config.inventory.path.exists());
    }

    #[tokio::test]
    async fn missing_state_reads_as_minimum_block() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let (control, _) = control(&config, MetricSample::new(50.0, 50.0, Some(1000.0)));

        let report = control.run_once().await;
        assert_eq!(report.previous.members, config.fleet.canonical_block(2));
        assert_eq!(report.decision, ScalingDecision::NoAction);
    }

    #[tokio::test]
    async fn run_locked_acquires_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let (control, _) = control(&config, MetricSample::new(50.0, 50.0, Some(1000.0)));
        let lock = CountingLock {
            acquired: AtomicUsize::new(0),
            refuse: false,
        };

        control.run_locked(&lock).await.unwrap();
        assert_eq!(lock.acquired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refused_lock_skips_the_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let (control, tools) = control(&config, MetricSample::new(95.0, 10.0, Some(100.0)));
        let lock = CountingLock {
            acquired: AtomicUsize::new(0),
            refuse: true,
        };

        let err = control.run_locked(&lock).await.unwrap_err();
        assert!(err.to_string().contains("another cycle"));
        assert!(tools.calls().is_empty());
    }
}
