//! Process table port (interface).

use crate::domain::ProcessInfo;
use crate::error::Result;

/// Port for enumerating live processes.
pub trait ProcessTablePort: Send + Sync {
    /// Snapshot of every process currently visible to the agent.
    fn scan(&self) -> impl std::future::Future<Output = Result<Vec<ProcessInfo>>> + Send;
}
