//! Results returned to the lifecycle transport.

use serde::{Deserialize, Serialize};

/// Severity of an action message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// A message surfaced to the operator alongside an action result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionMessage {
    pub level: MessageLevel,
    pub message: String,
}

impl ActionMessage {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            message: message.into(),
        }
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warn,
            message: message.into(),
        }
    }
}

/// Failure reported to the caller as a title plus optional detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionError {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ActionError {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl std::fmt::Display for ActionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {}", self.title, detail),
            None => write!(f, "{}", self.title),
        }
    }
}

impl std::error::Error for ActionError {}

/// Result of `start`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartResult {
    #[serde(default)]
    pub messages: Vec<ActionMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ActionError>,
}

impl StartResult {
    pub fn with_message(message: ActionMessage) -> Self {
        Self {
            messages: vec![message],
            error: None,
        }
    }

    pub fn failed(error: ActionError) -> Self {
        Self {
            messages: Vec::new(),
            error: Some(error),
        }
    }
}

/// Result of `status`. Callers poll until `completed` is true.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResult {
    pub completed: bool,
    #[serde(default)]
    pub messages: Vec<ActionMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ActionError>,
}

impl StatusResult {
    pub fn running() -> Self {
        Self::default()
    }

    pub fn completed(message: ActionMessage) -> Self {
        Self {
            completed: true,
            messages: vec![message],
            error: None,
        }
    }

    pub fn failed(error: ActionError) -> Self {
        Self {
            completed: true,
            messages: Vec::new(),
            error: Some(error),
        }
    }
}

/// Result of `stop`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopResult {
    #[serde(default)]
    pub messages: Vec<ActionMessage>,
}
