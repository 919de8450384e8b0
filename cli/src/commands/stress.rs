//! Stress command - run stress-ng until it exits or Ctrl-C.

use anyhow::Result;
use hostfault_core::{ActionParams, AgentConfig, HostFaultEngine, StressKind};

use super::{local_request, print_messages, supervise};

pub fn cpu_params(load: u8, workers: u32) -> ActionParams {
    ActionParams::new()
        .with("cpuLoad", load)
        .with("workers", workers)
}

pub fn io_params(mode: String, workers: u32, path: String, mbytes_per_worker: u64) -> ActionParams {
    ActionParams::new()
        .with("mode", mode)
        .with("workers", workers)
        .with("path", path)
        .with("mbytes_per_worker", mbytes_per_worker)
}

pub fn memory_params(percentage: u8) -> ActionParams {
    ActionParams::new().with("percentage", percentage)
}

pub async fn run(
    config: AgentConfig,
    kind: StressKind,
    params: ActionParams,
    duration_secs: u64,
    fail_on_oom_kill: bool,
    json: bool,
) -> Result<()> {
    let engine = HostFaultEngine::new(config);
    let action = engine.stress(kind);

    let params = params
        .with("duration", duration_secs.saturating_mul(1000))
        .with("failOnOomKill", fail_on_oom_kill);

    let state = action.prepare(&local_request(&engine, params)?).await?;

    let started = action.start(&state)?;
    print_messages(&started.messages, json)?;

    supervise(|| action.status(&state), || action.stop(&state), json).await
}
