//! fleetscale.toml configuration parser.
//!
//! Every section is optional. A missing field takes the value the fleet was
//! originally tuned with, so an empty file describes the stock deployment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Errors raised while loading or validating a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScalerConfig {
    pub thresholds: Thresholds,
    pub fleet: FleetConfig,
    pub metrics: MetricsConfig,
    pub state: StateConfig,
    pub infrastructure: InfrastructureConfig,
    pub inventory: InventoryConfig,
    pub monitoring: MonitoringConfig,
    pub load_balancer: LoadBalancerConfig,
    pub notify: NotifyConfig,
    /// Append-only process log. Stdout only when unset.
    pub log_file: Option<PathBuf>,
}

/// Hysteresis trigger levels. Percentages for CPU/memory, milliseconds
/// for latency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Thresholds {
    pub cpu_high: f64,
    pub mem_high: f64,
    pub latency_high_ms: f64,
    pub cpu_low: f64,
    pub mem_low: f64,
    pub latency_low_ms: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu_high: 80.0,
            mem_high: 80.0,
            latency_high_ms: 5000.0,
            cpu_low: 30.0,
            mem_low: 30.0,
            latency_low_ms: 800.0,
        }
    }
}

/// Size bounds and the canonical address block of the web fleet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FleetConfig {
    pub min_instances: u32,
    pub max_instances: u32,
    /// Address prefix, e.g. `10.2.22.`.
    pub address_base: String,
    /// Host number of the first fleet member.
    pub address_start: u32,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            min_instances: 2,
            max_instances: 5,
            address_base: "10.2.22.".to_string(),
            address_start: 21,
        }
    }
}

impl FleetConfig {
    /// The `index`-th address of the canonical block.
    pub fn address(&self, index: u32) -> String {
        format!("{}{}", self.address_base, self.address_start + index)
    }

    /// The first `count` addresses of the canonical block.
    pub fn canonical_block(&self, count: u32) -> Vec<String> {
        (0..count).map(|i| self.address(i)).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus base URL.
    pub prometheus_url: String,
    /// Per-query HTTP timeout.
    pub query_timeout_secs: u64,
    /// PromQL yielding CPU busy percentage per fleet instance.
    pub cpu_query: String,
    /// PromQL yielding memory used percentage per fleet instance.
    pub mem_query: String,
    /// Load-balancer-fronted URL hit by the latency probe.
    pub probe_url: String,
    /// Sequential requests per cycle.
    pub probe_count: u32,
    /// Per-request timeout; also the latency charged for a failed request.
    pub probe_timeout_secs: u64,
    /// Reported latency percentile, 1..=99.
    pub percentile: u32,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            prometheus_url: "http://localhost:9090".to_string(),
            query_timeout_secs: 10,
            cpu_query: concat!(
                "100 - (avg by(instance)(rate(node_cpu_seconds_total",
                "{job=\"node_exporter_webserver\",mode=\"idle\"}[5m])) * 100)"
            )
            .to_string(),
            mem_query: concat!(
                "(1 - (avg by(instance)(node_memory_MemAvailable_bytes",
                "{job=\"node_exporter_webserver\"}) / avg by(instance)",
                "(node_memory_MemTotal_bytes{job=\"node_exporter_webserver\"}))) * 100"
            )
            .to_string(),
            probe_url: "http://10.2.22.20/".to_string(),
            probe_count: 5,
            probe_timeout_secs: 5,
            percentile: 90,
        }
    }
}

/// Location of the persisted fleet membership.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StateConfig {
    /// Terraform variables file holding the membership line.
    pub tfvars_path: PathBuf,
    /// Variable name of the membership list.
    pub key: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            tfvars_path: PathBuf::from("terraform/terraform.tfvars"),
            key: "web_ips".to_string(),
        }
    }
}

/// An external command line. `{name}` placeholders in `args` are filled
/// in by the caller (`{src}`, `{dest}`, `{host}`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory. Inherits the process cwd when unset.
    #[serde(default)]
    pub workdir: Option<PathBuf>,
}

impl CommandConfig {
    /// A command run in the current directory.
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            workdir: None,
        }
    }

    /// Run the command from `dir` instead.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    /// Arguments with every `{key}` replaced by its value.
    pub fn render_args(&self, vars: &[(&str, &str)]) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                vars.iter().fold(arg.clone(), |acc, (key, value)| {
                    acc.replace(&format!("{{{key}}}"), value)
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InfrastructureConfig {
    pub apply: CommandConfig,
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            apply: CommandConfig::new("terraform", &["apply", "-auto-approve"])
                .in_dir("terraform"),
        }
    }
}

/// A non-scaled inventory group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StaticGroup {
    pub name: String,
    pub hosts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InventoryConfig {
    pub path: PathBuf,
    /// Group holding the scaled fleet.
    pub fleet_group: String,
    /// Connection parameters appended to every host line.
    pub host_params: String,
    pub static_groups: Vec<StaticGroup>,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        let group = |name: &str, host: &str| StaticGroup {
            name: name.to_string(),
            hosts: vec![host.to_string()],
        };
        Self {
            path: PathBuf::from("ansible/inventory.ini"),
            fleet_group: "webserver".to_string(),
            host_params: concat!(
                "ansible_user=ansible ansible_ssh_private_key_file=~/.ssh/id_rsa ",
                "ansible_python_interpreter=/usr/bin/python3"
            )
            .to_string(),
            static_groups: vec![
                group("loadbalancer", "10.2.22.20"),
                group("nfsserver", "10.2.22.26"),
                group("dbserver", "10.2.22.27"),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Live Prometheus config, rewritten from `scrape_configs:` onward.
    pub config_path: PathBuf,
    /// Staging copy rendered before the privileged copy.
    pub staging_path: PathBuf,
    pub self_target: String,
    pub fleet_job: String,
    pub exporter_port: u16,
    pub push: CommandConfig,
    pub restart: CommandConfig,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("/etc/prometheus/prometheus.yml"),
            staging_path: PathBuf::from("/tmp/prometheus.yml"),
            self_target: "localhost:9090".to_string(),
            fleet_job: "node_exporter_webserver".to_string(),
            exporter_port: 9100,
            push: CommandConfig::new("sudo", &["cp", "{src}", "{dest}"]),
            restart: CommandConfig::new("sudo", &["systemctl", "restart", "prometheus"]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoadBalancerConfig {
    pub host: String,
    /// Where the upstream template is rendered locally.
    pub template_path: PathBuf,
    pub push: CommandConfig,
    pub reload: CommandConfig,
}

impl Default for LoadBalancerConfig {
    fn default() -> Self {
        Self {
            host: "10.2.22.20".to_string(),
            template_path: PathBuf::from("ansible/roles/loadbalancer/templates/nginx-lb.conf.j2"),
            push: CommandConfig::new(
                "ansible",
                &[
                    "{host}",
                    "-m",
                    "copy",
                    "-a",
                    "src={src} dest=/etc/nginx/sites-available/default mode=0644",
                    "--become",
                ],
            )
            .in_dir("ansible"),
            reload: CommandConfig::new(
                "ansible",
                &["{host}", "-m", "shell", "-a", "sudo systemctl reload nginx"],
            )
            .in_dir("ansible"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotifyConfig {
    pub api_base: String,
    pub token_env: String,
    pub chat_id_env: String,
    pub timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.telegram.org".to_string(),
            token_env: "TELEGRAM_BOT_TOKEN".to_string(),
            chat_id_env: "TELEGRAM_CHAT_ID".to_string(),
            timeout_secs: 10,
        }
    }
}

impl ScalerConfig {
    /// Load and validate a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ScalerConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings under which the decision rules stop making sense.
    ///
    /// Inverted hysteresis is allowed: the engine checks scale-out first, so
    /// such a set is only logged.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fleet = &self.fleet;
        if fleet.min_instances == 0 {
            return Err(ConfigError::Invalid("fleet.min_instances must be at least 1".into()));
        }
        if fleet.min_instances > fleet.max_instances {
            return Err(ConfigError::Invalid(format!(
                "fleet.min_instances ({}) exceeds fleet.max_instances ({})",
                fleet.min_instances, fleet.max_instances
            )));
        }

        if fleet.address_start.checked_add(fleet.max_instances).is_none() {
            return Err(ConfigError::Invalid(format!(
                "fleet.address_start ({}) + fleet.max_instances ({}) overflows",
                fleet.address_start, fleet.max_instances
            )));
        }

        let t = &self.thresholds;
        for (name, low, high) in [
            ("cpu", t.cpu_low, t.cpu_high),
            ("mem", t.mem_low, t.mem_high),
            ("latency", t.latency_low_ms, t.latency_high_ms),
        ] {
            if low > high {
                warn!(
                    threshold = name,
                    low,
                    high,
                    "scale-in threshold above scale-out threshold, scale-out wins when both match"
                );
            }
        }

        let m = &self.metrics;
        if !(1..=99).contains(&m.percentile) {
            return Err(ConfigError::Invalid(format!(
                "metrics.percentile must be within 1..=99, got {}",
                m.percentile
            )));
        }
        if m.probe_count == 0 {
            return Err(ConfigError::Invalid("metrics.probe_count must be at least 1".into()));
        }
        // The latency probe speaks plain HTTP/1.1 only.
        if !m.probe_url.starts_with("http://") {
            return Err(ConfigError::Invalid(format!(
                "metrics.probe_url must be an http:// URL, got {}",
                m.probe_url
            )));
        }

        Ok(())
    }
}
