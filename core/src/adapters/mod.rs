//! Adapters layer - External system implementations.
//!
//! This module contains implementations of the port traits defined in `ports`.
//! Each adapter handles communication with one Linux facility.

mod host;
mod killer;
mod process_table;
mod resolver;
mod shutdown;
mod sidecar;

pub use host::{count_cpu_list, LinuxHost};
pub use killer::{SignalKiller, DEFAULT_GRACE_PERIOD};
pub use process_table::ProcfsProcessTable;
pub use resolver::{AgentResolver, DigResolver, SystemResolver};
pub use shutdown::{SyscallShutdown, SHUTDOWN_DELAY};
pub use sidecar::NsenterSidecar;
