//! Hostname resolver port (interface).

use std::net::IpAddr;

use crate::error::Result;

/// Port for resolving hostnames.
///
/// Implementations decide which network context the lookup runs in; for
/// faults this must be the target's, not the agent's.
pub trait HostnameResolver: Send + Sync {
    /// Resolve every hostname. Any unresolvable name fails the whole call.
    fn resolve(
        &self,
        hostnames: &[String],
    ) -> impl std::future::Future<Output = Result<Vec<IpAddr>>> + Send;
}
