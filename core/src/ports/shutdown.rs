//! Host shutdown port (interface).

use crate::error::Result;

/// Port for powering off or rebooting the host.
pub trait ShutdownPort: Send + Sync {
    /// Name of the mechanism, for logs.
    fn name(&self) -> &'static str;

    fn is_available(&self) -> bool;

    /// Schedule a reboot. Returns once scheduled, not once rebooted.
    fn reboot(&self) -> Result<()>;

    /// Schedule a power-off. Returns once scheduled.
    fn shutdown(&self) -> Result<()>;
}
