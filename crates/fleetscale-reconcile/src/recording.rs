//! Recording stand-in for the external tools.
//!
//! Records every call in order and can be told to fail a specific one.
//! Pushed files are read at push time so callers can inspect exactly what
//! would have been installed.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ToolError;
use crate::tools::{ConfigPusher, InfrastructureApplier, ManagedService, ServiceReloader};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    Apply,
    Push {
        service: ManagedService,
        content: String,
    },
    Reload(ManagedService),
}

#[derive(Debug, Default)]
pub struct RecordingTools {
    calls: Mutex<Vec<ToolCall>>,
    fail_apply: bool,
    fail_push: Option<ManagedService>,
    fail_reload: Option<ManagedService>,
}

impl RecordingTools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_apply(mut self) -> Self {
        self.fail_apply = true;
        self
    }

    pub fn failing_push(mut self, service: ManagedService) -> Self {
        self.fail_push = Some(service);
        self
    }

    pub fn failing_reload(mut self, service: ManagedService) -> Self {
        self.fail_reload = Some(service);
        self
    }

    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: ToolCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn refuse(program: &str) -> ToolError {
        ToolError::Exit {
            program: program.to_string(),
            status: "exit status: 1".to_string(),
        }
    }
}

#[async_trait]
impl InfrastructureApplier for RecordingTools {
    async fn apply(&self) -> Result<(), ToolError> {
        self.record(ToolCall::Apply);
        if self.fail_apply {
            return Err(Self::refuse("terraform"));
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigPusher for RecordingTools {
    async fn push(&self, service: ManagedService, source: &Path) -> Result<(), ToolError> {
        let content = std::fs::read_to_string(source).unwrap_or_default();
        self.record(ToolCall::Push { service, content });
        if self.fail_push == Some(service) {
            return Err(Self::refuse("push"));
        }
        Ok(())
    }
}

#[async_trait]
impl ServiceReloader for RecordingTools {
    async fn reload(&self, service: ManagedService) -> Result<(), ToolError> {
        self.record(ToolCall::Reload(service));
        if self.fail_reload == Some(service) {
            return Err(Self::refuse("reload"));
        }
        Ok(())
    }
}
