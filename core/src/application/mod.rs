//! Application layer - Fault engine components.
//!
//! These services orchestrate domain logic and adapter interactions:
//! - Accept domain types as inputs
//! - Use ports (traits) for external dependencies
//! - Return domain types as outputs
//!
//! The kill scheduler and the stress supervisor each own an
//! [`ExecutionRegistry`] of the executions they started.

mod kill_scheduler;
mod network_filter;
mod registry;
mod stress_supervisor;

pub use kill_scheduler::{KillLoop, KillPlan, KillScheduler, MIN_SWEEP_INTERVAL};
pub use network_filter::{FilterParams, NetworkFilterCompiler, OwnEndpoint};
pub use registry::{ExecutionHandle, ExecutionRegistry};
pub use stress_supervisor::{classify, StressProcess, StressSupervisor};
