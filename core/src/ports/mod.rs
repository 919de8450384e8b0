//! Ports layer - Trait definitions (interfaces).
//!
//! This module defines the interfaces that the application layer uses
//! to interact with external systems. Implementations live in `adapters`.

mod host;
mod killer;
mod process_table;
mod resolver;
mod shutdown;
mod sidecar;
mod traffic;

pub use host::HostInfoPort;
pub use killer::ProcessKillerPort;
pub use process_table::ProcessTablePort;
pub use resolver::HostnameResolver;
pub use shutdown::ShutdownPort;
pub use sidecar::SidecarPort;
pub use traffic::TrafficControlPort;
