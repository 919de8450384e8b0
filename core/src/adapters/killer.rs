//! Signal-based process killer.
//!
//! - SIGTERM (15): graceful termination request
//! - SIGKILL (9): immediate forced termination
//! - signal 0: liveness probe

use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::ports::ProcessKillerPort;

/// Default grace period between SIGTERM and SIGKILL.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(500);

/// Kills processes by sending Unix signals directly.
#[derive(Debug, Clone)]
pub struct SignalKiller {
    grace_period: Duration,
}

impl SignalKiller {
    pub fn new(grace_period: Duration) -> Self {
        Self { grace_period }
    }

    /// Send `signal` to `pid`.
    ///
    /// Returns `Ok(false)` if the process no longer exists.
    fn send_signal(&self, pid: u32, signal: Signal) -> Result<bool> {
        let target = Pid::from_raw(to_raw_pid(pid)?);
        debug!(pid, ?signal, "Sending signal to process");

        match kill(target, signal) {
            Ok(()) => Ok(true),
            Err(Errno::ESRCH) => {
                debug!(pid, "Process not found");
                Ok(false)
            }
            Err(Errno::EPERM) => {
                warn!(pid, "Permission denied to kill process");
                Err(Error::PermissionDenied(format!("cannot signal process {}", pid)))
            }
            Err(errno) => Err(Error::KillFailed {
                pid,
                reason: errno.desc().to_string(),
            }),
        }
    }
}

impl Default for SignalKiller {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_PERIOD)
    }
}

impl ProcessKillerPort for SignalKiller {
    async fn kill(&self, pid: u32, force: bool) -> Result<bool> {
        if force {
            // A vanished process counts as killed.
            self.send_signal(pid, Signal::SIGKILL)?;
            Ok(true)
        } else {
            self.kill_gracefully(pid).await
        }
    }

    /// SIGTERM, wait for the grace period, then SIGKILL if still alive.
    async fn kill_gracefully(&self, pid: u32) -> Result<bool> {
        self.kill_all_gracefully(&[pid])
            .await
            .pop()
            .unwrap_or(Ok(true))
    }

    async fn kill_all_gracefully(&self, pids: &[u32]) -> Vec<Result<bool>> {
        debug!(count = pids.len(), "Attempting graceful kill");

        let mut results = Vec::with_capacity(pids.len());
        let mut pending = Vec::new();
        for (i, &pid) in pids.iter().enumerate() {
            match self.send_signal(pid, Signal::SIGTERM) {
                Ok(true) => pending.push(i),
                Ok(false) => {}
                Err(e) => {
                    results.push(Err(e));
                    continue;
                }
            }
            results.push(Ok(true));
        }

        if pending.is_empty() {
            return results;
        }
        sleep(self.grace_period).await;

        for i in pending {
            let pid = pids[i];
            if !self.is_running(pid) {
                debug!(pid, "Process terminated after SIGTERM");
                continue;
            }
            debug!(pid, "Process still running, sending SIGKILL");
            if let Err(e) = self.send_signal(pid, Signal::SIGKILL) {
                results[i] = Err(e);
            }
        }
        results
    }

    fn is_running(&self, pid: u32) -> bool {
        match to_raw_pid(pid) {
            // EPERM still means the process exists.
            Ok(raw) => !matches!(kill(Pid::from_raw(raw), None), Err(Errno::ESRCH)),
            Err(_) => false,
        }
    }
}

/// PIDs 0 and those outside `i32` would address process groups or fail.
fn to_raw_pid(pid: u32) -> Result<i32> {
    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => Ok(raw),
        _ => Err(Error::KillFailed {
            pid,
            reason: "invalid pid".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Stdio;

    #[test]
    fn test_is_running_current_process() {
        let killer = SignalKiller::default();
        assert!(killer.is_running(std::process::id()));
    }

    #[test]
    fn test_is_running_nonexistent() {
        let killer = SignalKiller::default();
        assert!(!killer.is_running(999_999_999));
        assert!(!killer.is_running(0));
    }

    #[tokio::test]
    async fn test_kill_nonexistent_is_success() {
        let killer = SignalKiller::default();
        // 999_999_999 exceeds any pid_max, so the kernel reports ESRCH.
        assert!(killer.kill(999_999_999, true).await.unwrap());
    }

    #[tokio::test]
    async fn test_graceful_kill_of_child() {
        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .stdout(Stdio::null())
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();

        let killer = SignalKiller::new(Duration::from_millis(50));
        assert!(killer.kill_gracefully(pid).await.unwrap());

        let status = child.wait().await.unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    async fn test_kill_all_gracefully_shares_one_grace_period() {
        let mut children = Vec::new();
        for _ in 0..5 {
            children.push(
                tokio::process::Command::new("sleep")
                    .arg("30")
                    .stdout(Stdio::null())
                    .kill_on_drop(true)
                    .spawn()
                    .unwrap(),
            );
        }
        let mut pids: Vec<u32> = children.iter().map(|c| c.id().unwrap()).collect();
        pids.push(999_999_999);
        pids.push(0);

        let grace = Duration::from_millis(400);
        let killer = SignalKiller::new(grace);
        let started = std::time::Instant::now();
        let results = killer.kill_all_gracefully(&pids).await;
        let elapsed = started.elapsed();

        // One grace period for the batch, not one per process.
        assert!(elapsed >= grace);
        assert!(elapsed < grace * 3, "batch took {:?}", elapsed);

        assert_eq!(results.len(), 7);
        assert!(results[..6].iter().all(|r| matches!(r, Ok(true))));
        assert!(results[6].is_err());

        for child in &mut children {
            let status = child.wait().await.unwrap();
            assert!(!status.success());
        }
    }
}
