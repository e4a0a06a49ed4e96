//! FleetStateStore — membership persistence inside the Terraform variables file.
//!
//! Reads and writes are whole-file: the file is read in full, the
//! membership line is replaced (or appended), and the result is written
//! back in one call.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use fleetscale_core::{FleetConfig, StateConfig};

use crate::error::{StateError, StateResult};

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Ordered fleet membership. The last entry is the one removed on scale-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetState {
    pub members: Vec<String>,
}

impl FleetState {
    /// Wrap `members` as-is; order is kept.
    pub fn new(members: Vec<String>) -> Self {
        Self { members }
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True when there are no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member count as the decision engine sees it.
    pub fn count(&self) -> u32 {
        u32::try_from(self.members.len()).unwrap_or(u32::MAX)
    }
}

/// Reads and writes the membership line of the Terraform variables file.
#[derive(Debug, Clone)]
pub struct FleetStateStore {
    path: PathBuf,
    key: String,
    fleet: FleetConfig,
}

impl FleetStateStore {
    /// Store over `state.tfvars_path`; `fleet` supplies the fallback block
    /// and the bounds checked on load.
    pub fn new(state: &StateConfig, fleet: &FleetConfig) -> Self {
        Self {
            path: state.tfvars_path.clone(),
            key: state.key.clone(),
            fleet: fleet.clone(),
        }
    }

    /// The variables file this store reads and rewrites.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The membership assumed when nothing usable is persisted.
    pub fn default_state(&self) -> FleetState {
        FleetState::new(self.fleet.canonical_block(self.fleet.min_instances))
    }

    /// Load the membership, falling back to the minimum-size block when the
    /// file or line is missing or malformed.
    pub fn load(&self) -> FleetState {
        match self.try_load() {
            Ok(state) => {
                debug!(path = ?self.path, members = state.len(), "fleet state loaded");
                state
            }
            Err(StateError::NotFound(what)) => {
                debug!(path = ?self.path, %what, "no persisted fleet state, using default block");
                self.default_state()
            }
            Err(e) => {
                warn!(path = ?self.path, error = %e, "unusable fleet state, using default block");
                self.default_state()
            }
        }
    }

    /// Load the membership, surfacing why it could not be read.
    pub fn try_load(&self) -> StateResult<FleetState> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StateError::NotFound(self.path.display().to_string()));
            }
            Err(e) => return Err(StateError::Read(e.to_string())),
        };

        let line = content
            .lines()
            .find(|line| self.is_membership_line(line))
            .ok_or_else(|| StateError::NotFound(format!("{} in {}", self.key, self.path.display())))?;

        let (_, value) = line
            .split_once('=')
            .ok_or_else(|| StateError::Malformed(format!("no '=' in line: {line}")))?;
        let members: Vec<String> =
            serde_json::from_str(value.trim()).map_err(map_err!(Malformed))?;

        if members.is_empty() {
            return Err(StateError::Malformed(format!("{} is empty", self.key)));
        }

        let state = FleetState::new(members);
        let count = state.count();
        if count < self.fleet.min_instances || count > self.fleet.max_instances {
            warn!(
                count,
                min = self.fleet.min_instances,
                max = self.fleet.max_instances,
                "persisted fleet size outside bounds"
            );
        }

        Ok(state)
    }

    /// Overwrite the membership line, preserving every other line verbatim.
    pub fn store(&self, state: &FleetState) -> StateResult<()> {
        let existing = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(StateError::Read(e.to_string())),
        };

        let rendered = self.render_line(&state.members)?;
        let mut out = String::with_capacity(existing.len() + rendered.len());
        let mut replaced = false;

        for line in existing.split_inclusive('\n') {
            if self.is_membership_line(line) {
                out.push_str(&rendered);
                replaced = true;
            } else {
                out.push_str(line);
            }
        }
        if !replaced {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&rendered);
        }

        std::fs::write(&self.path, out).map_err(map_err!(Write))?;
        debug!(path = ?self.path, members = ?state.members, "fleet state stored");
        Ok(())
    }

    fn is_membership_line(&self, line: &str) -> bool {
        line.trim_start()
            .strip_prefix(self.key.as_str())
            .is_some_and(|rest| rest.trim_start().starts_with('='))
    }

    /// Members are quoted as JSON strings so `try_load` reads them back
    /// unchanged.
    fn render_line(&self, members: &[String]) -> StateResult<String> {
        let quoted = members
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_err!(Malformed))?;
        Ok(format!("{} = [{}]\n", self.key, quoted.join(", ")))
    }
}
