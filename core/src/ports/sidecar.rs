//! Sidecar execution port (interface).

use std::path::Path;

use tokio::process::Command;

use crate::domain::SidecarOpts;

/// Port for running helper commands inside a target's isolation context.
pub trait SidecarPort: Send + Sync {
    /// Build a command that runs `program args...` inside `sidecar`.
    ///
    /// The returned command has not been spawned; callers configure stdio.
    fn command(&self, sidecar: &SidecarOpts, program: &Path, args: &[String]) -> Command;
}
