//! Sidecar execution through `nsenter`.

use std::path::{Path, PathBuf};

use tokio::process::Command;

use crate::domain::SidecarOpts;
use crate::ports::SidecarPort;

/// Runs helper commands inside a target's namespaces with `nsenter`.
#[derive(Debug, Clone)]
pub struct NsenterSidecar {
    nsenter: PathBuf,
}

impl NsenterSidecar {
    pub fn new(nsenter: impl Into<PathBuf>) -> Self {
        Self {
            nsenter: nsenter.into(),
        }
    }

    /// Arguments passed to `nsenter` for `program args...`.
    pub fn nsenter_args(sidecar: &SidecarOpts, program: &Path, args: &[String]) -> Vec<String> {
        let mut out = vec!["--target".to_string(), sidecar.target_pid.to_string()];
        out.extend(sidecar.namespaces.iter().map(|ns| ns.nsenter_flag().to_string()));
        out.push("--".to_string());
        out.push(program.display().to_string());
        out.extend(args.iter().cloned());
        out
    }
}

impl Default for NsenterSidecar {
    fn default() -> Self {
        Self::new("nsenter")
    }
}

impl SidecarPort for NsenterSidecar {
    fn command(&self, sidecar: &SidecarOpts, program: &Path, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.nsenter);
        cmd.args(Self::nsenter_args(sidecar, program, args));
        cmd
    }
}
