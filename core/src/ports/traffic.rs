//! Traffic control port (interface).

use crate::domain::{Filter, SidecarOpts};
use crate::error::Result;

/// Port for the engine that enforces compiled network filters.
///
/// Implementations must let exclude entries win over include entries.
pub trait TrafficControlPort: Send + Sync {
    /// Install rules dropping traffic selected by `filter`.
    fn apply(
        &self,
        sidecar: &SidecarOpts,
        filter: &Filter,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Remove the rules installed by `apply`.
    fn revert(
        &self,
        sidecar: &SidecarOpts,
        filter: &Filter,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
