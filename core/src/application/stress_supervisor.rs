//! Load-generator subprocess supervision.
//!
//! Starts one `stress-ng` process per execution, watches it on a monitor task
//! and classifies how it ended when polled.

use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStderr, Command};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Level};
use uuid::Uuid;

use crate::domain::{
    ActionError, ActionMessage, StatusResult, StressBackend, StressExit, StressJob,
    StressOptions, ToleratedExits,
};
use crate::error::{Error, Result};
use crate::ports::SidecarPort;

use super::registry::{ExecutionHandle, ExecutionRegistry};

/// Captured stderr beyond this many bytes is dropped.
const MAX_STDERR_BYTES: u64 = 64 * 1024;

/// Live load-generator process of one execution.
pub struct StressProcess {
    token: CancellationToken,
    outcome: Arc<Mutex<Option<StressExit>>>,
    pid: Option<u32>,
}

impl StressProcess {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// How the process ended, or `None` while it is still running.
    pub fn outcome(&self) -> Option<StressExit> {
        self.outcome.lock().clone()
    }
}

impl ExecutionHandle for StressProcess {
    fn cancel(&self) {
        self.token.cancel();
    }
}

/// Supervises load-generator processes, one per execution ID.
pub struct StressSupervisor<S> {
    program: PathBuf,
    sidecar: S,
    preflight_timeout: Duration,
    registry: ExecutionRegistry<StressProcess>,
}

impl<S: SidecarPort> StressSupervisor<S> {
    pub fn new(program: impl Into<PathBuf>, sidecar: S, preflight_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            sidecar,
            preflight_timeout,
            registry: ExecutionRegistry::new(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Verify the load generator is installed by asking for its version.
    ///
    /// Absence or a hanging binary is a precondition failure.
    pub async fn check_installed(&self) -> Result<()> {
        let not_installed =
            || Error::Precondition(format!("{} is not installed!", self.tool_name()));

        let mut cmd = Command::new(&self.program);
        cmd.arg("-V")
            .current_dir(std::env::temp_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match timeout(self.preflight_timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                error!(program = %self.program.display(), error = %e, "Failed to run load generator");
                return Err(not_installed());
            }
            Err(_) => {
                error!(program = %self.program.display(), "Load generator version check timed out");
                return Err(not_installed());
            }
        };

        if !output.status.success() {
            error!(
                program = %self.program.display(),
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Load generator version check failed"
            );
            return Err(not_installed());
        }

        debug!(
            version = %String::from_utf8_lossy(&output.stdout).trim(),
            "Load generator available"
        );
        Ok(())
    }

    /// Build the job for `options`.
    ///
    /// `allowed_cpus` replaces the "all CPUs" worker sentinel when known.
    pub fn prepare(
        &self,
        mut options: StressOptions,
        allowed_cpus: Option<u32>,
        tolerated: ToleratedExits,
        backend: StressBackend,
    ) -> StressJob {
        if let Some(cpus) = allowed_cpus {
            options.apply_cpu_allowance(cpus);
        }
        StressJob {
            args: options.args(tracing::enabled!(Level::TRACE)),
            tolerated,
            backend,
        }
    }

    /// Launch the load generator for `execution_id`.
    ///
    /// A process already registered under the same ID is terminated first.
    pub fn start(&self, execution_id: Uuid, job: &StressJob) -> Result<()> {
        let mut cmd = match &job.backend {
            StressBackend::Local => {
                let mut cmd = Command::new(&self.program);
                cmd.args(&job.args);
                cmd
            }
            StressBackend::Sidecar(opts) => self.sidecar.command(opts, &self.program, &job.args),
        };
        cmd.current_dir(std::env::temp_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            Error::Execution(format!("failed to start {}: {}", self.program.display(), e))
        })?;
        let pid = child.id();
        info!(execution_id = %execution_id, pid = ?pid, args = ?job.args, "Started load generator");

        let token = CancellationToken::new();
        let outcome = Arc::new(Mutex::new(None));
        let stderr = child.stderr.take();
        tokio::spawn(monitor(
            execution_id,
            child,
            stderr,
            token.clone(),
            Arc::clone(&outcome),
        ));

        self.registry
            .install(execution_id, StressProcess { token, outcome, pid });
        Ok(())
    }

    /// Non-blocking status of `execution_id`.
    pub fn status(&self, execution_id: Uuid, tolerated: &ToleratedExits) -> StatusResult {
        match self.registry.with(execution_id, StressProcess::outcome) {
            Some(None) => StatusResult::running(),
            Some(Some(exit)) => classify(&exit, tolerated),
            // Stopped, or never started by this agent.
            None => StatusResult::completed(ActionMessage::info("Stress host stopped")),
        }
    }

    /// Terminate and forget the process of `execution_id`.
    ///
    /// Returns true only if a still-running process was stopped.
    pub fn stop(&self, execution_id: Uuid) -> bool {
        let Some(process) = self.registry.remove(execution_id) else {
            debug!(execution_id = %execution_id, "No load generator to stop");
            return false;
        };

        let live = process.outcome().is_none();
        process.cancel();
        if live {
            info!(execution_id = %execution_id, pid = ?process.pid, "Stopping load generator");
        }
        live
    }

    pub fn is_registered(&self, execution_id: Uuid) -> bool {
        self.registry.contains(execution_id)
    }

    /// Number of registered processes, exited or not.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Number of processes that have not exited yet.
    pub fn active(&self) -> usize {
        self.registry.count(|p| p.outcome().is_none())
    }

    /// Terminate every process.
    pub fn shutdown(&self) {
        self.registry.cancel_all();
    }

    fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}

/// Judge a finished run.
pub fn classify(exit: &StressExit, tolerated: &ToleratedExits) -> StatusResult {
    if exit.success() {
        return StatusResult::completed(ActionMessage::info("Stress host stopped"));
    }

    let message = exit.error_message();
    match exit.code {
        Some(code) if tolerated.tolerates(code) => StatusResult::completed(ActionMessage::warn(
            format!("stress-ng exited unexpectedly: {}", message),
        )),
        _ => StatusResult::failed(ActionError::new("Failed to stress host").with_detail(message)),
    }
}

async fn monitor(
    execution_id: Uuid,
    mut child: Child,
    stderr: Option<ChildStderr>,
    token: CancellationToken,
    outcome: Arc<Mutex<Option<StressExit>>>,
) {
    let (status, stderr) = tokio::join!(wait_or_kill(&mut child, &token), read_capped(stderr));

    let exit = match status {
        Ok(status) => StressExit {
            code: exit_code(status),
            description: status.to_string(),
            stderr,
        },
        Err(e) => StressExit {
            code: None,
            description: format!("failed to wait for load generator: {}", e),
            stderr,
        },
    };

    if token.is_cancelled() {
        debug!(execution_id = %execution_id, "Load generator terminated on request");
    } else if exit.success() {
        info!(execution_id = %execution_id, "Load generator finished");
    } else {
        warn!(execution_id = %execution_id, status = %exit.description, "Load generator exited with error");
    }

    *outcome.lock() = Some(exit);
}

async fn wait_or_kill(child: &mut Child, token: &CancellationToken) -> std::io::Result<ExitStatus> {
    tokio::select! {
        status = child.wait() => status,
        () = token.cancelled() => {
            // The generator forks workers into its process group.
            match child.id().and_then(|pid| i32::try_from(pid).ok()) {
                Some(pgid) => {
                    if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
                        debug!(pgid, error = %e, "killpg failed, killing child only");
                        child.start_kill()?;
                    }
                }
                None => child.start_kill()?,
            }
            child.wait().await
        }
    }
}

async fn read_capped<R: AsyncRead + Unpin>(reader: Option<R>) -> String {
    let Some(reader) = reader else {
        return String::new();
    };
    let mut buf = Vec::new();
    let mut limited = reader.take(MAX_STDERR_BYTES);
    if let Err(e) = limited.read_to_end(&mut buf).await {
        debug!(error = %e, "Failed to read load generator stderr");
    }
    // Drain the rest so the child never blocks on a full pipe.
    let mut rest = limited.into_inner();
    let _ = tokio::io::copy(&mut rest, &mut tokio::io::sink()).await;
    String::from_utf8_lossy(&buf).into_owned()
}

/// Exit code, or `128 + n` for termination by signal `n`.
fn exit_code(status: ExitStatus) -> Option<i32> {
    status.code().or_else(|| status.signal().map(|s| 128 + s))
}
