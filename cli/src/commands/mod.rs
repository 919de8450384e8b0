//! CLI subcommands.

pub mod check;
pub mod config;
pub mod filter;
pub mod stop_process;
pub mod stress;

use std::time::Duration;

use anyhow::Result;
use hostfault_core::domain::MessageLevel;
use hostfault_core::ports::HostInfoPort;
use hostfault_core::{
    ActionMessage, ActionParams, HostFaultEngine, PrepareRequest, StatusResult, StopResult, Target,
};
use uuid::Uuid;

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const STOP_SETTLE: Duration = Duration::from_millis(500);

/// Prepare request addressed to this host.
pub fn local_request(engine: &HostFaultEngine, config: ActionParams) -> Result<PrepareRequest> {
    let hostname = engine.host().hostname()?;
    Ok(PrepareRequest::new(
        Uuid::new_v4(),
        Target::host(hostname),
        config,
    ))
}

pub fn print_messages(messages: &[ActionMessage], json: bool) -> Result<()> {
    for message in messages {
        if json {
            println!("{}", serde_json::to_string(message)?);
            continue;
        }
        let level = match message.level {
            MessageLevel::Debug => "debug",
            MessageLevel::Info => "info",
            MessageLevel::Warn => "warn",
            MessageLevel::Error => "error",
        };
        println!("[{}] {}", level, message.message);
    }
    Ok(())
}

/// Poll `status` every second until completion or Ctrl-C, which calls `stop`.
pub async fn supervise<S, T>(status: S, stop: T, json: bool) -> Result<()>
where
    S: Fn() -> StatusResult,
    T: Fn() -> StopResult,
{
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    ticker.tick().await;

    loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                signal?;
                print_messages(&stop().messages, json)?;
                // Background tasks reap their children before the runtime exits.
                tokio::time::sleep(STOP_SETTLE).await;
                return Ok(());
            }
            _ = ticker.tick() => {
                let result = status();
                print_messages(&result.messages, json)?;
                if let Some(error) = result.error {
                    return Err(error.into());
                }
                if result.completed {
                    return Ok(());
                }
            }
        }
    }
}
