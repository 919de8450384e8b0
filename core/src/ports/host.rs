//! Host information port (interface).

use std::net::IpAddr;

use crate::error::Result;

/// Port for facts about the host the agent runs on.
pub trait HostInfoPort: Send + Sync {
    /// The host's name.
    fn hostname(&self) -> Result<String>;

    /// Number of CPUs the target (PID 1) is allowed to run on.
    fn allowed_cpus(&self) -> Result<u32>;

    /// Addresses assigned to the host's interfaces.
    fn own_ips(&self) -> impl std::future::Future<Output = Result<Vec<IpAddr>>> + Send;
}
