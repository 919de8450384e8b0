//! Domain layer - Pure data models for fault injection.
//!
//! This module contains value types describing faults and their outcomes.
//! These types have no I/O dependencies and can be tested in isolation.

mod action;
mod network;
mod process;
mod sidecar;
mod stress;

pub use action::{
    ActionError, ActionMessage, MessageLevel, StartResult, StatusResult, StopResult,
};
pub use network::{
    host_nets, net_any, parse_net, Filter, NetWithPortRange, PortRange, RestrictedEndpoint,
};
pub use process::{lineage, ProcessInfo, ProcessMatcher};
pub use sidecar::{Namespace, SidecarOpts};
pub use stress::{
    IoMode, StressBackend, StressExit, StressJob, StressOptions, ToleratedExit, ToleratedExits,
    OOM_KILLED_EXIT_CODE,
};
