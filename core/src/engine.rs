//! HostFault Engine - Composition root.
//!
//! Wires the Linux adapters into the fault actions according to an
//! [`AgentConfig`]. The engine owns the components holding live
//! executions (the kill scheduler and the stress supervisor), so actions
//! built from the same engine share their execution registries.

use std::sync::Arc;

use tracing::info;

use crate::actions::{
    NetworkBlackholeAction, ShutdownAction, StopProcessAction, StressAction, StressKind,
};
use crate::adapters::{
    AgentResolver, DigResolver, LinuxHost, NsenterSidecar, ProcfsProcessTable, SignalKiller,
    SyscallShutdown, SystemResolver,
};
use crate::application::{KillScheduler, NetworkFilterCompiler, StressSupervisor};
use crate::config::AgentConfig;
use crate::domain::SidecarOpts;
use crate::error::Result;
use crate::ports::TrafficControlPort;

pub type HostKillScheduler = KillScheduler<ProcfsProcessTable, SignalKiller>;
pub type HostStopProcessAction = StopProcessAction<ProcfsProcessTable, SignalKiller, LinuxHost>;
pub type HostStressAction = StressAction<NsenterSidecar, LinuxHost>;
pub type HostShutdownAction = ShutdownAction<SyscallShutdown, LinuxHost>;
pub type HostResolver = AgentResolver<NsenterSidecar>;

/// The main HostFault engine.
pub struct HostFaultEngine {
    config: AgentConfig,
    host: Arc<LinuxHost>,
    sidecar: NsenterSidecar,
    scheduler: Arc<HostKillScheduler>,
    supervisor: Arc<StressSupervisor<NsenterSidecar>>,
}

impl HostFaultEngine {
    pub fn new(config: AgentConfig) -> Self {
        let sidecar = NsenterSidecar::new(&config.nsenter_path);
        let scheduler = KillScheduler::new(
            ProcfsProcessTable::new(),
            SignalKiller::new(config.kill_grace_period()),
        );
        let supervisor = StressSupervisor::new(
            &config.stress_ng_path,
            sidecar.clone(),
            config.preflight_timeout(),
        );

        info!(
            port = config.port,
            health_port = ?config.health_port(),
            sidecar = !config.disable_sidecar,
            "HostFault engine ready"
        );

        Self {
            config,
            host: Arc::new(LinuxHost::new()),
            sidecar,
            scheduler: Arc::new(scheduler),
            supervisor: Arc::new(supervisor),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn host(&self) -> Arc<LinuxHost> {
        Arc::clone(&self.host)
    }

    pub fn stop_process(&self) -> HostStopProcessAction {
        StopProcessAction::new(Arc::clone(&self.scheduler), self.host())
    }

    pub fn stress(&self, kind: StressKind) -> HostStressAction {
        let sidecar = (!self.config.disable_sidecar)
            .then(|| SidecarOpts::stress(self.config.sidecar_target_pid));
        StressAction::new(kind, Arc::clone(&self.supervisor), self.host(), sidecar)
    }

    /// Run the load generator pre-flight check.
    pub async fn check_stress_tool(&self) -> Result<()> {
        self.supervisor.check_installed().await
    }

    pub fn shutdown_action(&self) -> HostShutdownAction {
        ShutdownAction::new(Arc::new(SyscallShutdown::new()), self.host())
    }

    /// Hostname resolver running in the target's network context, or in the
    /// agent's own when the sidecar is disabled.
    pub fn resolver(&self) -> HostResolver {
        if self.config.disable_sidecar {
            AgentResolver::System(SystemResolver)
        } else {
            AgentResolver::Sidecar(DigResolver::new(
                self.sidecar.clone(),
                SidecarOpts::network(self.config.sidecar_target_pid),
                &self.config.dig_path,
            ))
        }
    }

    pub fn filter_compiler(&self) -> NetworkFilterCompiler<HostResolver> {
        NetworkFilterCompiler::new(self.resolver())
    }

    /// Network blackhole enforced by `traffic`.
    pub fn network_blackhole<C: TrafficControlPort>(
        &self,
        traffic: Arc<C>,
    ) -> NetworkBlackholeAction<HostResolver, C, LinuxHost> {
        NetworkBlackholeAction::new(
            self.filter_compiler(),
            traffic,
            self.host(),
            SidecarOpts::network(self.config.sidecar_target_pid),
            self.config.port,
            self.config.health_port(),
        )
    }

    /// Number of kill loops and load generators still running. Finished
    /// executions stay registered until stopped but are not counted.
    pub fn active_executions(&self) -> usize {
        self.scheduler.active() + self.supervisor.active()
    }

    /// Cancel every live execution.
    pub fn shutdown(&self) {
        info!(active = self.active_executions(), "Stopping all executions");
        self.scheduler.shutdown();
        self.supervisor.shutdown();
    }
}

impl Drop for HostFaultEngine {
    fn drop(&mut self) {
        self.scheduler.shutdown();
        self.supervisor.shutdown();
    }
}
