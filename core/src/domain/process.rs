//! Process domain models.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A process from the live process table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessInfo {
    /// Process ID.
    pub pid: u32,
    /// Short executable name (`/proc/<pid>/comm`).
    pub name: String,
    /// Full command line, arguments joined by spaces.
    pub command: String,
    /// Parent process ID; 0 when unknown.
    #[serde(default)]
    pub ppid: u32,
}

impl ProcessInfo {
    pub fn new(pid: u32, name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            pid,
            name: name.into(),
            command: command.into(),
            ppid: 0,
        }
    }

    pub fn with_parent(mut self, ppid: u32) -> Self {
        self.ppid = ppid;
        self
    }
}

/// `pid` and every ancestor of it present in `processes`. A parent missing
/// from the snapshot ends the walk.
pub fn lineage(processes: &[ProcessInfo], pid: u32) -> HashSet<u32> {
    let parents: HashMap<u32, u32> = processes.iter().map(|p| (p.pid, p.ppid)).collect();

    let mut chain = HashSet::new();
    let mut current = pid;
    while current != 0 && chain.insert(current) {
        current = parents.get(&current).copied().unwrap_or(0);
    }
    chain
}

/// Selects which processes a stop-process fault terminates.
///
/// The variant is decided once, when the fault is prepared, and never
/// re-inferred from the raw string afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum ProcessMatcher {
    /// Exactly this process ID.
    ByPid(u32),
    /// Any process whose name or command line contains this string.
    ByNameSubstring(String),
}

impl ProcessMatcher {
    /// Decide the matcher from the raw `process` parameter.
    ///
    /// A string of digits that fits a PID selects `ByPid`; anything else is a
    /// name substring.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::Validation("Process is required".to_string()));
        }

        match raw.parse::<u32>() {
            Ok(pid) if raw.bytes().all(|b| b.is_ascii_digit()) => Ok(ProcessMatcher::ByPid(pid)),
            _ => Ok(ProcessMatcher::ByNameSubstring(raw.to_string())),
        }
    }

    pub fn matches(&self, process: &ProcessInfo) -> bool {
        match self {
            ProcessMatcher::ByPid(pid) => process.pid == *pid,
            ProcessMatcher::ByNameSubstring(needle) => {
                process.name.contains(needle.as_str()) || process.command.contains(needle.as_str())
            }
        }
    }

    /// Select the matching processes, never including a `protected` one.
    pub fn select(&self, processes: &[ProcessInfo], protected: &HashSet<u32>) -> Vec<u32> {
        processes
            .iter()
            .filter(|p| !protected.contains(&p.pid) && self.matches(p))
            .map(|p| p.pid)
            .collect()
    }
}

impl fmt::Display for ProcessMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessMatcher::ByPid(pid) => write!(f, "pid {}", pid),
            ProcessMatcher::ByNameSubstring(name) => write!(f, "'{}'", name),
        }
    }
}
