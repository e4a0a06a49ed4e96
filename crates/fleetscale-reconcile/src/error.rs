//! Reconciliation error types.

use std::path::PathBuf;

use thiserror::Error;

/// An external command could not run or did not succeed.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}")]
    Exit { program: String, status: String },
}

/// Why a reconciliation step failed.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("state store error: {0}")]
    State(#[from] fleetscale_state::StateError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("scrape_configs: not found in {0}")]
    MissingMarker(PathBuf),
}

impl StepError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> StepError {
        let path = path.into();
        move |source| StepError::Io { path, source }
    }
}
