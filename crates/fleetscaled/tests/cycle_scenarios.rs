//! Whole-cycle scenarios driven with a fixed sample and recording tools.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use fleetscale_core::{MetricSample, ScalerConfig, ScalingDecision};
use fleetscale_metrics::MetricsSource;
use fleetscale_notify::MemoryNotifier;
use fleetscale_reconcile::{ManagedService, RecordingTools, ToolCall};
use fleetscale_state::{FleetState, FleetStateStore};
use fleetscaled::ControlLoop;

const PROMETHEUS_YML: &str = "global:\n  scrape_interval: 15s\n\nscrape_configs:\n  - job_name: 'prometheus'\n";

struct Fixed(MetricSample);

#[async_trait]
impl MetricsSource for Fixed {
    async fn sample(&self) -> MetricSample {
        self.0
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    config: ScalerConfig,
    tools: Arc<RecordingTools>,
    notifier: Arc<MemoryNotifier>,
}

impl Harness {
    fn with_members(count: u32) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let mut config = ScalerConfig::default();
        config.state.tfvars_path = root.join("terraform.tfvars");
        config.inventory.path = root.join("inventory.ini");
        config.monitoring.config_path = root.join("prometheus.yml");
        config.monitoring.staging_path = root.join("prometheus.staged.yml");
        config.load_balancer.template_path = root.join("nginx-lb.conf.j2");

        std::fs::write(&config.state.tfvars_path, "vm_template = \"ubuntu-22.04\"\n").unwrap();
        std::fs::write(&config.monitoring.config_path, PROMETHEUS_YML).unwrap();
        let harness = Self {
            _dir: dir,
            config,
            tools: Arc::new(RecordingTools::new()),
            notifier: Arc::new(MemoryNotifier::new()),
        };
        harness
            .store()
            .store(&FleetState::new(harness.config.fleet.canonical_block(count)))
            .unwrap();
        harness
    }

    fn store(&self) -> FleetStateStore {
        FleetStateStore::new(&self.config.state, &self.config.fleet)
    }

    fn control(&self, sample: MetricSample) -> ControlLoop {
        ControlLoop::new(&self.config, Arc::new(Fixed(sample)), self.notifier.clone())
            .with_tools(self.tools.clone())
    }
}

fn read(path: &Path) -> Option<String> {
    std::fs::read_to_string(path).ok()
}

#[tokio::test]
async fn high_cpu_scales_out_to_contiguous_block() {
    let h = Harness::with_members(2);

    let report = h
        .control(MetricSample::new(85.0, 40.0, Some(3000.0)))
        .run_once()
        .await;

    assert_eq!(report.decision, ScalingDecision::ScaleOut);
    let expected = vec!["10.2.22.21", "10.2.22.22", "10.2.22.23"];
    assert_eq!(report.target.as_deref().unwrap(), expected.as_slice());
    assert!(report.reconcile.as_ref().unwrap().is_complete());

    assert_eq!(h.store().try_load().unwrap().members, expected);
    let tfvars = read(&h.config.state.tfvars_path).unwrap();
    assert_eq!(
        tfvars,
        "vm_template = \"ubuntu-22.04\"\nweb_ips = [\"10.2.22.21\", \"10.2.22.22\", \"10.2.22.23\"]\n"
    );

    let inventory = read(&h.config.inventory.path).unwrap();
    for ip in &expected {
        assert!(inventory.contains(&format!("{ip} ansible_user=ansible")));
    }
    let upstream = read(&h.config.load_balancer.template_path).unwrap();
    assert!(upstream.contains("    server 10.2.22.23;\n}"));

    assert_eq!(h.tools.calls().len(), 5);
    let messages = h.notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("[Scale OUT]\nInstances: 2 -> 3\n"));
}

#[tokio::test]
async fn idle_fleet_scales_in_by_one() {
    let h = Harness::with_members(3);

    let report = h
        .control(MetricSample::new(10.0, 15.0, Some(500.0)))
        .run_once()
        .await;

    assert_eq!(report.decision, ScalingDecision::ScaleIn);
    assert_eq!(h.store().try_load().unwrap().members, vec!["10.2.22.21", "10.2.22.22"]);

    let staged = read(&h.config.monitoring.staging_path).unwrap();
    assert!(staged.starts_with("global:\n  scrape_interval: 15s\n\nscrape_configs:\n"));
    assert!(staged.contains("'10.2.22.22:9100'"));
    assert!(!staged.contains("'10.2.22.23:9100'"));

    let upstream = read(&h.config.load_balancer.template_path).unwrap();
    assert!(!upstream.contains("10.2.22.23"));
    assert!(h.notifier.messages()[0].starts_with("[Scale IN]\nInstances: 3 -> 2\n"));
}

#[tokio::test]
async fn steady_load_touches_nothing() {
    let h = Harness::with_members(3);
    let tfvars_before = read(&h.config.state.tfvars_path);

    let report = h
        .control(MetricSample::new(50.0, 50.0, Some(1000.0)))
        .run_once()
        .await;

    assert_eq!(report.decision, ScalingDecision::NoAction);
    assert!(report.target.is_none());
    assert!(report.reconcile.is_none());

    assert_eq!(read(&h.config.state.tfvars_path), tfvars_before);
    assert_eq!(read(&h.config.inventory.path), None);
    assert_eq!(read(&h.config.monitoring.config_path).as_deref(), Some(PROMETHEUS_YML));
    assert_eq!(read(&h.config.load_balancer.template_path), None);
    assert!(h.tools.calls().is_empty());
    assert!(h.notifier.messages().is_empty());
}

#[tokio::test]
async fn full_fleet_never_scales_out() {
    let h = Harness::with_members(5);

    let report = h
        .control(MetricSample::new(99.0, 99.0, Some(9000.0)))
        .run_once()
        .await;

    assert_eq!(report.decision, ScalingDecision::NoAction);
    assert!(h.tools.calls().is_empty());
}

#[tokio::test]
async fn failed_apply_keeps_new_state_and_reports_failure() {
    let h = Harness {
        tools: Arc::new(RecordingTools::new().failing_apply()),
        ..Harness::with_members(2)
    };

    let report = h
        .control(MetricSample::new(85.0, 40.0, Some(3000.0)))
        .run_once()
        .await;

    let reconcile = report.reconcile.unwrap();
    assert!(!reconcile.is_complete());
    assert_eq!(h.store().try_load().unwrap().len(), 3);
    assert_eq!(read(&h.config.inventory.path), None);
    assert_eq!(read(&h.config.load_balancer.template_path), None);
    assert_eq!(h.tools.calls(), vec![ToolCall::Apply]);

    let messages = h.notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("Terraform apply failed!"));
}

#[tokio::test]
async fn unreachable_load_balancer_leaves_earlier_steps_applied() {
    let h = Harness {
        tools: Arc::new(RecordingTools::new().failing_push(ManagedService::LoadBalancer)),
        ..Harness::with_members(4)
    };

    let report = h
        .control(MetricSample::new(5.0, 5.0, Some(100.0)))
        .run_once()
        .await;

    let reconcile = report.reconcile.unwrap();
    assert_eq!(reconcile.applied.len(), 4);
    assert!(read(&h.config.inventory.path).is_some());
    assert!(read(&h.config.monitoring.staging_path).is_some());
    assert!(
        !h.tools
            .calls()
            .contains(&ToolCall::Reload(ManagedService::LoadBalancer))
    );
}
