//! Prepare requests and the target they address.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::RestrictedEndpoint;
use crate::error::{Error, Result};
use crate::ports::HostInfoPort;

use super::ActionParams;

/// Target attribute carrying the host name.
pub const HOSTNAME_ATTRIBUTE: &str = "host.hostname";

/// The host a fault is addressed to, as discovered by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub attributes: HashMap<String, Vec<String>>,
}

impl Target {
    /// Target addressed by host name only.
    pub fn host(hostname: impl Into<String>) -> Self {
        let mut attributes = HashMap::new();
        attributes.insert(HOSTNAME_ATTRIBUTE.to_string(), vec![hostname.into()]);
        Self {
            name: String::new(),
            attributes,
        }
    }

    pub fn hostname(&self) -> Option<&str> {
        self.attributes
            .get(HOSTNAME_ATTRIBUTE)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// Everything a prepare call receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareRequest {
    pub execution_id: Uuid,
    #[serde(default)]
    pub config: ActionParams,
    #[serde(default)]
    pub target: Target,
    #[serde(default)]
    pub restricted_endpoints: Vec<RestrictedEndpoint>,
}

impl PrepareRequest {
    pub fn new(execution_id: Uuid, target: Target, config: ActionParams) -> Self {
        Self {
            execution_id,
            config,
            target,
            restricted_endpoints: Vec::new(),
        }
    }
}

/// Refuse targets that name a different host than the one the agent runs on.
///
/// Returns the agent's host name.
pub fn check_target_hostname<H: HostInfoPort>(host: &H, target: &Target) -> Result<String> {
    let own = host.hostname()?;
    match target.hostname() {
        Some(wanted) if wanted == own => Ok(own),
        Some(wanted) => Err(Error::Validation(format!(
            "Target hostname mismatch: target is '{}', agent runs on '{}'",
            wanted, own
        ))),
        None => Err(Error::Validation(format!(
            "Target is missing the {} attribute",
            HOSTNAME_ATTRIBUTE
        ))),
    }
}
