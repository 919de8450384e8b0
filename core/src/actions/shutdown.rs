//! Shutdown action: reboot or power off the host.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::domain::{ActionError, StartResult};
use crate::error::Error;
use crate::ports::{HostInfoPort, ShutdownPort};

use super::{check_target_hostname, ActionResult, PrepareRequest};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShutdownState {
    pub execution_id: Uuid,
    pub reboot: bool,
}

pub struct ShutdownAction<D, H> {
    shutdown: Arc<D>,
    host: Arc<H>,
}

impl<D: ShutdownPort, H: HostInfoPort> ShutdownAction<D, H> {
    pub fn new(shutdown: Arc<D>, host: Arc<H>) -> Self {
        Self { shutdown, host }
    }

    /// Parameter `reboot` (default true) chooses reboot over power-off.
    pub fn prepare(&self, request: &PrepareRequest) -> ActionResult<ShutdownState> {
        check_target_hostname(&*self.host, &request.target)?;

        if !self.shutdown.is_available() {
            return Err(Error::Precondition("no shutdown method available".to_string()).into());
        }

        Ok(ShutdownState {
            execution_id: request.execution_id,
            reboot: request.config.bool("reboot", true),
        })
    }

    pub fn start(&self, state: &ShutdownState) -> StartResult {
        let action = if state.reboot { "Reboot" } else { "Shutdown" };
        info!("{} host via {}", action, self.shutdown.name());

        let result = if state.reboot {
            self.shutdown.reboot()
        } else {
            self.shutdown.shutdown()
        };

        match result {
            Ok(()) => StartResult::default(),
            Err(e) => {
                error!(error = %e, "{} host via {} failed", action, self.shutdown.name());
                StartResult::failed(
                    ActionError::new(format!("{} failed", action)).with_detail(e.to_string()),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ActionParams, Target};
    use crate::error::Result;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::net::IpAddr;

    #[derive(Default)]
    struct Recorder {
        available: bool,
        fail: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    impl ShutdownPort for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn reboot(&self) -> Result<()> {
            self.calls.lock().push("reboot");
            if self.fail {
                return Err(Error::Execution("EPERM".into()));
            }
            Ok(())
        }

        fn shutdown(&self) -> Result<()> {
            self.calls.lock().push("shutdown");
            Ok(())
        }
    }

    struct Host;

    impl HostInfoPort for Host {
        fn hostname(&self) -> Result<String> {
            Ok("worker-1".into())
        }

        fn allowed_cpus(&self) -> Result<u32> {
            Ok(1)
        }

        async fn own_ips(&self) -> Result<Vec<IpAddr>> {
            Ok(Vec::new())
        }
    }

    fn request(config: serde_json::Value) -> PrepareRequest {
        let config: ActionParams = serde_json::from_value(config).unwrap();
        PrepareRequest::new(Uuid::new_v4(), Target::host("worker-1"), config)
    }

    #[test]
    fn test_prepare_reads_reboot_flag() {
        let action = ShutdownAction::new(
            Arc::new(Recorder {
                available: true,
                ..Default::default()
            }),
            Arc::new(Host),
        );

        assert!(action.prepare(&request(json!({}))).unwrap().reboot);
        assert!(action.prepare(&request(json!({"reboot": "true"}))).unwrap().reboot);
        assert!(!action.prepare(&request(json!({"reboot": false}))).unwrap().reboot);
    }

    #[test]
    fn test_prepare_without_method_fails() {
        let action = ShutdownAction::new(Arc::new(Recorder::default()), Arc::new(Host));
        let err = action.prepare(&request(json!({}))).unwrap_err();
        assert_eq!(err.title, "no shutdown method available");
    }

    #[test]
    fn test_start_dispatches() {
        let recorder = Arc::new(Recorder {
            available: true,
            ..Default::default()
        });
        let action = ShutdownAction::new(Arc::clone(&recorder), Arc::new(Host));

        let state = action.prepare(&request(json!({"reboot": false}))).unwrap();
        assert!(action.start(&state).error.is_none());
        assert_eq!(*recorder.calls.lock(), vec!["shutdown"]);
    }

    #[test]
    fn test_start_failure_is_reported() {
        let recorder = Arc::new(Recorder {
            available: true,
            fail: true,
            ..Default::default()
        });
        let action = ShutdownAction::new(recorder, Arc::new(Host));

        let state = action.prepare(&request(json!({}))).unwrap();
        let error = action.start(&state).error.unwrap();
        assert_eq!(error.title, "Reboot failed");
        assert!(error.detail.unwrap().contains("EPERM"));
    }
}
