//! Actions layer - Prepare / Start / Status / Stop lifecycles.
//!
//! Each action validates its parameters at prepare time without side
//! effects, and returns a serializable state that the remaining calls
//! receive back. Failures surface as [`ActionError`] title/detail pairs.

mod network;
mod params;
mod shutdown;
mod stop_process;
mod stress;
mod target;

use crate::domain::ActionError;

pub use network::{filter_params, NetworkBlackholeAction, NetworkState};
pub use params::ActionParams;
pub use shutdown::{ShutdownAction, ShutdownState};
pub use stop_process::{StopProcessAction, StopProcessState};
pub use stress::{StressAction, StressKind, StressState};
pub use target::{check_target_hostname, PrepareRequest, Target, HOSTNAME_ATTRIBUTE};

/// Result of an action call, as reported to the caller.
pub type ActionResult<T> = std::result::Result<T, ActionError>;
