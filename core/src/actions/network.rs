//! Network blackhole action: drop traffic selected by a compiled filter.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::{FilterParams, NetworkFilterCompiler, OwnEndpoint};
use crate::domain::{ActionMessage, Filter, SidecarOpts, StartResult, StopResult};
use crate::error::Error;
use crate::ports::{HostInfoPort, HostnameResolver, TrafficControlPort};

use super::{check_target_hostname, ActionParams, ActionResult, PrepareRequest};

/// State carried from prepare to start and stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkState {
    pub execution_id: Uuid,
    pub sidecar: SidecarOpts,
    pub filter: Filter,
}

/// Parameters `ip` and `hostname` select targets, `port` selects ports.
pub fn filter_params(params: &ActionParams) -> FilterParams {
    let mut hosts = params.string_array("ip");
    hosts.extend(params.string_array("hostname"));
    FilterParams {
        hosts,
        ports: params.string_array("port"),
    }
}

pub struct NetworkBlackholeAction<R, C, H> {
    compiler: NetworkFilterCompiler<R>,
    traffic: Arc<C>,
    host: Arc<H>,
    sidecar: SidecarOpts,
    port: u16,
    health_port: Option<u16>,
}

impl<R, C, H> NetworkBlackholeAction<R, C, H>
where
    R: HostnameResolver,
    C: TrafficControlPort,
    H: HostInfoPort,
{
    pub fn new(
        compiler: NetworkFilterCompiler<R>,
        traffic: Arc<C>,
        host: Arc<H>,
        sidecar: SidecarOpts,
        port: u16,
        health_port: Option<u16>,
    ) -> Self {
        Self {
            compiler,
            traffic,
            host,
            sidecar,
            port,
            health_port,
        }
    }

    pub async fn prepare(&self, request: &PrepareRequest) -> ActionResult<NetworkState> {
        check_target_hostname(&*self.host, &request.target)?;

        let wrap = |e: Error| e.into_action_error("Failed to prepare network settings.");

        let own = OwnEndpoint {
            ips: self.host.own_ips().await.map_err(wrap)?,
            port: self.port,
            health_port: self.health_port,
        };
        debug!(
            ips = ?own.ips,
            port = own.port,
            health_port = ?own.health_port,
            "Excluding own endpoint"
        );

        let filter = self
            .compiler
            .compile(
                &filter_params(&request.config),
                &request.restricted_endpoints,
                &own,
            )
            .await
            .map_err(wrap)?;

        Ok(NetworkState {
            execution_id: request.execution_id,
            sidecar: self.sidecar.clone(),
            filter,
        })
    }

    pub async fn start(&self, state: &NetworkState) -> ActionResult<StartResult> {
        self.traffic
            .apply(&state.sidecar, &state.filter)
            .await
            .map_err(|e| e.into_action_error("Failed to apply network settings."))?;

        info!(execution_id = %state.execution_id, "Applied network blackhole");
        Ok(StartResult::with_message(ActionMessage::info(
            state.filter.to_string(),
        )))
    }

    pub async fn stop(&self, state: &NetworkState) -> ActionResult<StopResult> {
        self.traffic
            .revert(&state.sidecar, &state.filter)
            .await
            .map_err(|e| e.into_action_error("Failed to revert network settings."))?;

        info!(execution_id = %state.execution_id, "Reverted network blackhole");
        Ok(StopResult::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_params_merge_ip_and_hostname() {
        let params: ActionParams = serde_json::from_value(json!({
            "ip": ["10.0.0.1", "192.168.0.0/16"],
            "hostname": "db.internal",
            "port": ["5432"]
        }))
        .unwrap();

        let fp = filter_params(&params);
        assert_eq!(fp.hosts, vec!["10.0.0.1", "192.168.0.0/16", "db.internal"]);
        assert_eq!(fp.ports, vec!["5432"]);
    }

    #[test]
    fn test_filter_params_empty() {
        assert_eq!(filter_params(&ActionParams::new()), FilterParams::default());
    }
}
