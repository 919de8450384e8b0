//! Stop-process action: repeatedly kill matching processes for a while.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::{KillPlan, KillScheduler};
use crate::domain::{ActionMessage, ProcessMatcher, StartResult, StatusResult, StopResult};
use crate::error::Error;
use crate::ports::{HostInfoPort, ProcessKillerPort, ProcessTablePort};

use super::{check_target_hostname, ActionResult, PrepareRequest};

/// State carried from prepare to start, status and stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopProcessState {
    pub execution_id: Uuid,
    pub matcher: ProcessMatcher,
    pub graceful: bool,
    pub delay: Duration,
    pub duration: Duration,
}

impl StopProcessState {
    fn plan(&self) -> KillPlan {
        KillPlan {
            matcher: self.matcher.clone(),
            graceful: self.graceful,
            delay: self.delay,
            duration: self.duration,
        }
    }
}

pub struct StopProcessAction<T, K, H> {
    scheduler: Arc<KillScheduler<T, K>>,
    host: Arc<H>,
}

impl<T, K, H> StopProcessAction<T, K, H>
where
    T: ProcessTablePort + 'static,
    K: ProcessKillerPort + 'static,
    H: HostInfoPort,
{
    pub fn new(scheduler: Arc<KillScheduler<T, K>>, host: Arc<H>) -> Self {
        Self { scheduler, host }
    }

    /// Parameters: `process` (PID or name substring), `duration` (ms, > 0),
    /// `delay` (ms), `graceful` (default true).
    pub fn prepare(&self, request: &PrepareRequest) -> ActionResult<StopProcessState> {
        check_target_hostname(&*self.host, &request.target)?;

        let params = &request.config;
        let matcher = ProcessMatcher::parse(&params.string("process"))?;

        let duration = params.duration_ms("duration");
        if duration.is_zero() {
            return Err(Error::Validation("Duration is required".to_string()).into());
        }

        Ok(StopProcessState {
            execution_id: request.execution_id,
            matcher,
            graceful: params.bool("graceful", true),
            delay: params.duration_ms("delay"),
            duration,
        })
    }

    pub fn start(&self, state: &StopProcessState) -> StartResult {
        self.scheduler.start(state.execution_id, state.plan());
        info!(execution_id = %state.execution_id, matcher = %state.matcher, "Starting stop processes");
        StartResult::with_message(ActionMessage::info(format!(
            "Starting stop processes {}",
            state.matcher
        )))
    }

    pub fn status(&self, state: &StopProcessState) -> StatusResult {
        if self.scheduler.is_running(state.execution_id) {
            StatusResult::running()
        } else {
            StatusResult::completed(ActionMessage::info(format!(
                "Stop processes {} finished",
                state.matcher
            )))
        }
    }

    pub fn stop(&self, state: &StopProcessState) -> StopResult {
        if self.scheduler.stop(state.execution_id) {
            StopResult {
                messages: vec![ActionMessage::info(format!(
                    "Stopped stop processes {}",
                    state.matcher
                ))],
            }
        } else {
            debug!(execution_id = %state.execution_id, "Execution already stopped");
            StopResult {
                messages: vec![ActionMessage::info("Stop processes already stopped")],
            }
        }
    }
}
