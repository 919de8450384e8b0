//! Host shutdown through the `reboot(2)` syscall.

use std::convert::Infallible;
use std::thread;
use std::time::Duration;

use nix::sys::reboot::RebootMode;
use tracing::error;

use crate::error::{Error, Result};
use crate::ports::ShutdownPort;

/// Delay before the syscall so the start result can reach the caller.
pub const SHUTDOWN_DELAY: Duration = Duration::from_secs(3);

type RebootFn = fn(RebootMode) -> nix::Result<Infallible>;

/// Reboots or powers off the host with `reboot(2)`.
#[derive(Debug, Clone)]
pub struct SyscallShutdown {
    reboot: RebootFn,
    delay: Duration,
}

impl SyscallShutdown {
    pub fn new() -> Self {
        Self {
            reboot: nix::sys::reboot::reboot,
            delay: SHUTDOWN_DELAY,
        }
    }

    #[cfg(test)]
    fn with_syscall(reboot: RebootFn, delay: Duration) -> Self {
        Self { reboot, delay }
    }

    fn schedule(&self, mode: RebootMode) -> Result<()> {
        let reboot = self.reboot;
        let delay = self.delay;
        thread::Builder::new()
            .name("host-shutdown".to_string())
            .spawn(move || {
                thread::sleep(delay);
                if let Err(e) = reboot(mode) {
                    error!(?mode, error = %e, "reboot syscall failed");
                }
            })
            .map(|_| ())
            .map_err(|e| Error::Execution(format!("failed to schedule {:?}: {}", mode, e)))
    }
}

impl Default for SyscallShutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownPort for SyscallShutdown {
    fn name(&self) -> &'static str {
        "syscall_linux"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn reboot(&self) -> Result<()> {
        self.schedule(RebootMode::RB_AUTOBOOT)
    }

    fn shutdown(&self) -> Result<()> {
        self.schedule(RebootMode::RB_POWER_OFF)
    }
}
