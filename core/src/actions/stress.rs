//! Stress actions: CPU, IO and memory load via `stress-ng`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::StressSupervisor;
use crate::domain::{
    ActionMessage, IoMode, SidecarOpts, StartResult, StatusResult, StopResult, StressBackend,
    StressJob, StressOptions, ToleratedExits,
};
use crate::error::{Error, Result};
use crate::ports::{HostInfoPort, SidecarPort};

use super::{check_target_hostname, ActionParams, ActionResult, PrepareRequest};

const DEFAULT_IO_PATH: &str = "/";
const DEFAULT_MBYTES_PER_WORKER: u64 = 1024;

/// Which resource a stress action loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StressKind {
    Cpu,
    Io,
    Memory,
}

impl StressKind {
    pub fn action_id(&self) -> &'static str {
        match self {
            StressKind::Cpu => "stress-cpu",
            StressKind::Io => "stress-io",
            StressKind::Memory => "stress-mem",
        }
    }

    /// Decode and validate the load options for this kind.
    pub fn options(&self, params: &ActionParams) -> Result<StressOptions> {
        let timeout = params.duration_ms("duration");
        if timeout < Duration::from_secs(1) {
            return Err(Error::Validation(
                "Duration must be greater / equal than 1s".to_string(),
            ));
        }

        match self {
            StressKind::Cpu => {
                let load = percentage(params, "cpuLoad", Some(100))?;
                let workers = u32_param(params, "workers", 0)?;
                Ok(StressOptions {
                    cpu_workers: Some(workers),
                    cpu_load: load,
                    timeout,
                    ..Default::default()
                })
            }
            StressKind::Io => {
                let raw_mode = params.string("mode");
                let mode = IoMode::parse(&raw_mode)
                    .ok_or_else(|| Error::Validation(format!("Invalid IO mode '{}'", raw_mode)))?;
                let workers = u32_param(params, "workers", 0)?;
                let path = match params.string("path") {
                    p if p.trim().is_empty() => DEFAULT_IO_PATH.to_string(),
                    p => p,
                };
                let mbytes = params.u64_or("mbytes_per_worker", DEFAULT_MBYTES_PER_WORKER);

                let mut options = StressOptions {
                    temp_path: Some(PathBuf::from(path)),
                    timeout,
                    ..Default::default()
                };
                if mode.reads_and_writes() {
                    options.hdd_workers = Some(workers);
                    options.hdd_bytes = Some(format!("{}m", mbytes));
                }
                if mode.flushes() {
                    options.io_workers = Some(workers);
                }
                Ok(options)
            }
            StressKind::Memory => {
                let pct = percentage(params, "percentage", None)?;
                Ok(StressOptions {
                    vm_workers: Some(1),
                    vm_bytes: Some(format!("{}%", pct)),
                    timeout,
                    ..Default::default()
                })
            }
        }
    }
}

fn percentage(params: &ActionParams, key: &str, default: Option<u64>) -> Result<u8> {
    let value = params
        .u64(key)
        .or(default)
        .ok_or_else(|| Error::Validation(format!("{} is required", key)))?;
    match u8::try_from(value) {
        Ok(pct) if (1..=100).contains(&pct) => Ok(pct),
        _ => Err(Error::Validation(format!(
            "{} must be between 1 and 100, got {}",
            key, value
        ))),
    }
}

fn u32_param(params: &ActionParams, key: &str, default: u32) -> Result<u32> {
    match params.u64(key) {
        Some(value) => u32::try_from(value)
            .map_err(|_| Error::Validation(format!("{} is out of range: {}", key, value))),
        None => Ok(default),
    }
}

/// State carried from prepare to start, status and stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StressState {
    pub execution_id: Uuid,
    pub job: StressJob,
}

pub struct StressAction<S, H> {
    kind: StressKind,
    supervisor: Arc<StressSupervisor<S>>,
    host: Arc<H>,
    /// `None` runs the load generator as a direct child of the agent.
    sidecar: Option<SidecarOpts>,
}

impl<S: SidecarPort, H: HostInfoPort> StressAction<S, H> {
    pub fn new(
        kind: StressKind,
        supervisor: Arc<StressSupervisor<S>>,
        host: Arc<H>,
        sidecar: Option<SidecarOpts>,
    ) -> Self {
        Self {
            kind,
            supervisor,
            host,
            sidecar,
        }
    }

    pub fn kind(&self) -> StressKind {
        self.kind
    }

    /// Validate parameters, check the load generator is installed and build
    /// its arguments. Causes no load.
    ///
    /// All kinds accept `failOnOomKill` (default false); when false an
    /// OOM-killed load generator counts as a warning, not a failure.
    pub async fn prepare(&self, request: &PrepareRequest) -> ActionResult<StressState> {
        check_target_hostname(&*self.host, &request.target)?;

        let options = self.kind.options(&request.config)?;
        self.supervisor.check_installed().await?;

        let allowed_cpus = if options.cpu_workers == Some(0) {
            match self.host.allowed_cpus() {
                Ok(cpus) => Some(cpus),
                Err(e) => {
                    warn!(error = %e, "Could not read CPU allowance, using every CPU");
                    None
                }
            }
        } else {
            None
        };

        let tolerated = if request.config.bool("failOnOomKill", false) {
            ToleratedExits::none()
        } else {
            ToleratedExits::oom_killed()
        };

        let backend = match &self.sidecar {
            Some(opts) => StressBackend::Sidecar(opts.clone()),
            None => StressBackend::Local,
        };

        let job = self.supervisor.prepare(options, allowed_cpus, tolerated, backend);
        debug!(kind = ?self.kind, args = ?job.args, "Prepared stress");
        Ok(StressState {
            execution_id: request.execution_id,
            job,
        })
    }

    pub fn start(&self, state: &StressState) -> ActionResult<StartResult> {
        self.supervisor
            .start(state.execution_id, &state.job)
            .map_err(|e| e.into_action_error("Failed to stress host"))?;

        let args = state.job.args.join(" ");
        info!(execution_id = %state.execution_id, args = %args, "Starting stress host");
        Ok(StartResult::with_message(ActionMessage::info(format!(
            "Starting stress host with args {}",
            args
        ))))
    }

    pub fn status(&self, state: &StressState) -> StatusResult {
        self.supervisor.status(state.execution_id, &state.job.tolerated)
    }

    pub fn stop(&self, state: &StressState) -> StopResult {
        let message = if self.supervisor.stop(state.execution_id) {
            "Canceled stress host"
        } else {
            "Stress host already stopped"
        };
        StopResult {
            messages: vec![ActionMessage::info(message)],
        }
    }
}
