//! Stress (load generation) domain models.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::SidecarOpts;

/// Exit code of a process killed by SIGKILL, as reported by a shell (128 + 9).
pub const OOM_KILLED_EXIT_CODE: i32 = 137;

// ============================================================================
// StressOptions
// ============================================================================

/// Declarative description of the load to generate.
///
/// A worker count of `None` leaves that resource dimension alone. A CPU
/// worker count of `Some(0)` means "every CPU the target may use".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StressOptions {
    pub cpu_workers: Option<u32>,
    pub cpu_load: u8,
    pub hdd_workers: Option<u32>,
    pub hdd_bytes: Option<String>,
    pub io_workers: Option<u32>,
    pub temp_path: Option<PathBuf>,
    pub timeout: Duration,
    pub vm_workers: Option<u32>,
    pub vm_bytes: Option<String>,
}

impl StressOptions {
    /// Replace the "all CPUs" sentinel with the number of CPUs the target is
    /// allowed to run on.
    ///
    /// The load generator would otherwise count every configured processor,
    /// which differs from the usable set under cgroup or VM limits.
    pub fn apply_cpu_allowance(&mut self, allowed_cpus: u32) {
        if self.cpu_workers == Some(0) && allowed_cpus > 0 {
            self.cpu_workers = Some(allowed_cpus);
        }
    }

    /// Command-line arguments for the load generator.
    pub fn args(&self, verbose: bool) -> Vec<String> {
        let mut args = vec!["--timeout".to_string(), self.timeout.as_secs().to_string()];

        if let Some(workers) = self.cpu_workers {
            args.extend([
                "--cpu".to_string(),
                workers.to_string(),
                "--cpu-load".to_string(),
                self.cpu_load.to_string(),
            ]);
        }
        if let Some(workers) = self.hdd_workers {
            args.extend(["--hdd".to_string(), workers.to_string()]);
        }
        if let Some(bytes) = &self.hdd_bytes {
            args.extend(["--hdd-bytes".to_string(), bytes.clone()]);
        }
        if let Some(workers) = self.io_workers {
            args.extend(["--io".to_string(), workers.to_string()]);
        }
        if let Some(path) = &self.temp_path {
            args.extend(["--temp-path".to_string(), path.display().to_string()]);
        }
        if let Some(workers) = self.vm_workers {
            args.extend([
                "--vm".to_string(),
                workers.to_string(),
                "--vm-bytes".to_string(),
                self.vm_bytes.clone().unwrap_or_default(),
                "--vm-hang".to_string(),
                "0".to_string(),
            ]);
        }
        if verbose {
            args.push("-v".to_string());
        }
        args
    }
}

/// What the IO stress exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IoMode {
    #[default]
    ReadWriteAndFlush,
    ReadWrite,
    Flush,
}

impl IoMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "" | "read_write_and_flush" => Some(IoMode::ReadWriteAndFlush),
            "read_write" => Some(IoMode::ReadWrite),
            "flush" => Some(IoMode::Flush),
            _ => None,
        }
    }

    pub fn reads_and_writes(&self) -> bool {
        matches!(self, IoMode::ReadWriteAndFlush | IoMode::ReadWrite)
    }

    pub fn flushes(&self) -> bool {
        matches!(self, IoMode::ReadWriteAndFlush | IoMode::Flush)
    }
}

// ============================================================================
// Tolerated exits
// ============================================================================

/// A subprocess outcome that counts as acceptable rather than a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ToleratedExit {
    /// Killed by the kernel OOM killer.
    OomKilled,
    /// A specific exit code.
    Code(i32),
}

impl ToleratedExit {
    pub fn covers(&self, exit_code: i32) -> bool {
        match self {
            ToleratedExit::OomKilled => exit_code == OOM_KILLED_EXIT_CODE,
            ToleratedExit::Code(code) => *code == exit_code,
        }
    }
}

/// Set of tolerated outcomes for one execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToleratedExits(BTreeSet<ToleratedExit>);

impl ToleratedExits {
    /// Tolerate nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// Tolerate the OOM-kill outcome only.
    pub fn oom_killed() -> Self {
        Self::none().with(ToleratedExit::OomKilled)
    }

    pub fn with(mut self, exit: ToleratedExit) -> Self {
        self.0.insert(exit);
        self
    }

    pub fn tolerates(&self, exit_code: i32) -> bool {
        self.0.iter().any(|t| t.covers(exit_code))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// StressJob
// ============================================================================

/// Where the load generator runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StressBackend {
    /// A direct child process of the agent.
    Local,
    /// Inside the target's isolation context.
    Sidecar(SidecarOpts),
}

/// Everything needed to launch and judge one load-generator run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StressJob {
    pub args: Vec<String>,
    pub tolerated: ToleratedExits,
    pub backend: StressBackend,
}

/// How a load-generator process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StressExit {
    /// Exit code; termination by signal `n` is reported as `128 + n`.
    /// `None` when the process could not be waited on at all.
    pub code: Option<i32>,
    /// Human-readable description of the termination.
    pub description: String,
    /// Captured standard error output.
    pub stderr: String,
}

impl StressExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Description followed by captured stderr, if any.
    pub fn error_message(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.description.clone()
        } else {
            format!("{}\n{}", self.description, stderr)
        }
    }
}
