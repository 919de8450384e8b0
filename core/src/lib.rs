//! HostFault Core Library
//!
//! Host-level fault injection for Linux hosts. Provides functionality to:
//! - Compile network blackhole filters from IPs, CIDRs, hostnames and ports
//! - Repeatedly kill processes matching a PID or name for a bounded time
//! - Supervise `stress-ng` runs generating CPU, IO or memory load
//! - Reboot or power off the host
//!
//! Every fault follows a Prepare / Start / Status / Stop lifecycle keyed by
//! an execution ID.
//!
//! # Architecture
//! This library follows hexagonal architecture (ports & adapters):
//! - `domain`: Pure value types (filters, matchers, stress options, results)
//! - `ports`: Trait definitions (interfaces)
//! - `adapters`: Linux implementations (`/proc`, signals, `nsenter`, `dig`)
//! - `application`: Engine components (registry, filter compiler, kill
//!   scheduler, stress supervisor)
//! - `actions`: Per-fault lifecycles built on the application layer
//! - `engine`: Composition root
//!
//! # Platform Support
//! - Linux only. Sidecar commands join the namespaces of a target process
//!   through `nsenter`.

// Hexagonal architecture layers
pub mod domain;
pub mod ports;
pub mod adapters;
pub mod application;
pub mod actions;

pub mod config;
pub mod engine;
pub mod error;

// Re-export domain types (primary API)
pub use domain::{
    ActionError, ActionMessage, Filter, NetWithPortRange, PortRange, ProcessMatcher,
    RestrictedEndpoint, SidecarOpts, StartResult, StatusResult, StopResult,
};

// Re-export other commonly used types
pub use actions::{ActionParams, PrepareRequest, StressKind, Target};
pub use config::{AgentConfig, ConfigStore};
pub use engine::HostFaultEngine;
pub use error::{Error, Result};
