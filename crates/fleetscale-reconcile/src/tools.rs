//! External tool collaborators.
//!
//! Each trait covers one capability the orchestrator needs from the
//! outside world. Calls block the cycle until the tool exits; no timeout is
//! imposed beyond whatever the tool enforces itself.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use fleetscale_core::{CommandConfig, ScalerConfig};

use crate::error::ToolError;

/// A service whose configuration the orchestrator rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagedService {
    Monitoring,
    LoadBalancer,
}

/// Converges provisioned infrastructure with the persisted membership.
#[async_trait]
pub trait InfrastructureApplier: Send + Sync {
    async fn apply(&self) -> Result<(), ToolError>;
}

/// Installs a locally rendered file as a service's live configuration.
#[async_trait]
pub trait ConfigPusher: Send + Sync {
    async fn push(&self, service: ManagedService, source: &Path) -> Result<(), ToolError>;
}

/// Makes a service pick up its new configuration.
#[async_trait]
pub trait ServiceReloader: Send + Sync {
    async fn reload(&self, service: ManagedService) -> Result<(), ToolError>;
}

/// Runs the command lines from `ScalerConfig`.
#[derive(Debug, Clone)]
pub struct ProcessTools {
    apply: CommandConfig,
    monitoring_push: CommandConfig,
    monitoring_restart: CommandConfig,
    monitoring_dest: String,
    lb_push: CommandConfig,
    lb_reload: CommandConfig,
    lb_host: String,
}

impl ProcessTools {
    /// Tools running the command lines configured in `config`.
    pub fn new(config: &ScalerConfig) -> Self {
        Self {
            apply: config.infrastructure.apply.clone(),
            monitoring_push: config.monitoring.push.clone(),
            monitoring_restart: config.monitoring.restart.clone(),
            monitoring_dest: config.monitoring.config_path.display().to_string(),
            lb_push: config.load_balancer.push.clone(),
            lb_reload: config.load_balancer.reload.clone(),
            lb_host: config.load_balancer.host.clone(),
        }
    }
}

#[async_trait]
impl InfrastructureApplier for ProcessTools {
    async fn apply(&self) -> Result<(), ToolError> {
        run(&self.apply, &[]).await
    }
}

#[async_trait]
impl ConfigPusher for ProcessTools {
    async fn push(&self, service: ManagedService, source: &Path) -> Result<(), ToolError> {
        // Commands may run in another directory.
        let src = std::path::absolute(source)
            .unwrap_or_else(|_| source.to_path_buf())
            .display()
            .to_string();
        match service {
            ManagedService::Monitoring => {
                run(
                    &self.monitoring_push,
                    &[("src", &src), ("dest", &self.monitoring_dest)],
                )
                .await
            }
            ManagedService::LoadBalancer => {
                run(&self.lb_push, &[("src", &src), ("host", &self.lb_host)]).await
            }
        }
    }
}

#[async_trait]
impl ServiceReloader for ProcessTools {
    async fn reload(&self, service: ManagedService) -> Result<(), ToolError> {
        match service {
            ManagedService::Monitoring => run(&self.monitoring_restart, &[]).await,
            ManagedService::LoadBalancer => {
                run(&self.lb_reload, &[("host", &self.lb_host)]).await
            }
        }
    }
}

/// Run a command to completion. Succeeds iff it exits zero. Output is
/// inherited so tool logs land next to ours.
pub async fn run(command: &CommandConfig, vars: &[(&str, &str)]) -> Result<(), ToolError> {
    let args = command.render_args(vars);
    let mut cmd = Command::new(&command.program);
    cmd.args(&args);
    if let Some(dir) = &command.workdir {
        cmd.current_dir(dir);
    }

    debug!(program = %command.program, ?args, workdir = ?command.workdir, "running external command");

    let status = cmd.status().await.map_err(|source| ToolError::Spawn {
        program: command.program.clone(),
        source,
    })?;

    if status.success() {
        Ok(())
    } else {
        Err(ToolError::Exit {
            program: command.program.clone(),
            status: status.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_exit_is_success() {
        let command = CommandConfig::new("true", &[]);
        run(&command, &[]).await.unwrap();
    }

    #[tokio::test]
    async fn non_zero_exit_is_failure() {
        let command = CommandConfig::new("false", &[]);
        let err = run(&command, &[]).await.unwrap_err();
        assert!(matches!(err, ToolError::Exit { ref program, .. } if program == "false"));
    }

    #[tokio::test]
    async fn missing_program_is_spawn_failure() {
        let command = CommandConfig::new("fleetscale-no-such-tool", &[]);
        let err = run(&command, &[]).await.unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }

    #[tokio::test]
    async fn placeholders_and_workdir_reach_the_process() {
        let dir = tempfile::tempdir().unwrap();
        let command = CommandConfig::new("sh", &["-c", "printf %s {host} > out.txt"])
            .in_dir(dir.path());

        run(&command, &[("host", "10.2.22.20")]).await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(written, "10.2.22.20");
    }

    #[tokio::test]
    async fn monitoring_push_copies_to_configured_destination() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("staged.yml");
        let dest = dir.path().join("live.yml");
        std::fs::write(&src, "scrape_configs:\n").unwrap();

        let mut config = ScalerConfig::default();
        config.monitoring.config_path = dest.clone();
        config.monitoring.push = CommandConfig::new("cp", &["{src}", "{dest}"]);
        let tools = ProcessTools::new(&config);

        tools.push(ManagedService::Monitoring, &src).await.unwrap();
        assert_eq!(std::fs::read_to_string(dest).unwrap(), "scrape_configs:\n");
    }
}
