//! Stop-process command - kill matching processes until the duration ends.

use anyhow::Result;
use hostfault_core::{ActionParams, AgentConfig, HostFaultEngine};

use super::{local_request, print_messages, supervise};

pub async fn run(
    config: AgentConfig,
    process: String,
    duration_secs: u64,
    delay_ms: u64,
    force: bool,
    json: bool,
) -> Result<()> {
    let engine = HostFaultEngine::new(config);
    let action = engine.stop_process();

    let params = ActionParams::new()
        .with("process", process)
        .with("duration", duration_secs.saturating_mul(1000))
        .with("delay", delay_ms)
        .with("graceful", !force);

    let state = action.prepare(&local_request(&engine, params)?)?;

    let started = action.start(&state);
    print_messages(&started.messages, json)?;
    if let Some(error) = started.error {
        return Err(error.into());
    }

    supervise(|| action.status(&state), || action.stop(&state), json).await
}
