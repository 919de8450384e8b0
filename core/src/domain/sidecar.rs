//! Sidecar execution context.

use serde::{Deserialize, Serialize};

/// A Linux namespace a sidecar command joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Net,
    Pid,
    Mount,
    Cgroup,
    Uts,
}

impl Namespace {
    /// The `nsenter` flag for this namespace.
    pub fn nsenter_flag(&self) -> &'static str {
        match self {
            Namespace::Net => "--net",
            Namespace::Pid => "--pid",
            Namespace::Mount => "--mount",
            Namespace::Cgroup => "--cgroup",
            Namespace::Uts => "--uts",
        }
    }
}

/// Identifies the isolation context a helper command runs in: the namespaces
/// of `target_pid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidecarOpts {
    pub target_pid: u32,
    pub namespaces: Vec<Namespace>,
    /// Suffix for names of resources the sidecar creates.
    pub id_suffix: String,
}

impl SidecarOpts {
    /// Network context of `target_pid`, used for hostname lookups.
    pub fn network(target_pid: u32) -> Self {
        Self {
            target_pid,
            namespaces: vec![Namespace::Net, Namespace::Mount, Namespace::Uts],
            id_suffix: "host".to_string(),
        }
    }

    /// Process and cgroup context of `target_pid`, used for load generation.
    pub fn stress(target_pid: u32) -> Self {
        Self {
            target_pid,
            namespaces: vec![Namespace::Pid, Namespace::Cgroup],
            id_suffix: "host".to_string(),
        }
    }
}
