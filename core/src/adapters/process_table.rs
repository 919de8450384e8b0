//! Process table backed by procfs.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::trace;

use crate::domain::ProcessInfo;
use crate::error::{Error, Result};
use crate::ports::ProcessTablePort;

/// Commands longer than this are truncated in logs and matching output.
const MAX_COMMAND_LEN: usize = 4096;

/// Enumerates processes by walking `/proc`.
#[derive(Debug, Clone)]
pub struct ProcfsProcessTable {
    root: PathBuf,
}

impl ProcfsProcessTable {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    /// Use a different procfs mount point.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn read_process(&self, pid: u32, dir: &Path) -> Option<ProcessInfo> {
        // Processes can exit between listing and reading; skip those.
        let name = fs::read_to_string(dir.join("comm")).await.ok()?;
        let cmdline = fs::read(dir.join("cmdline")).await.unwrap_or_default();
        let ppid = fs::read_to_string(dir.join("stat"))
            .await
            .ok()
            .and_then(|stat| parse_ppid(&stat))
            .unwrap_or(0);
        Some(ProcessInfo::new(pid, name.trim_end(), parse_cmdline(&cmdline)).with_parent(ppid))
    }
}

impl Default for ProcfsProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTablePort for ProcfsProcessTable {
    async fn scan(&self) -> Result<Vec<ProcessInfo>> {
        let mut entries = fs::read_dir(&self.root).await.map_err(|e| {
            Error::CommandFailed(format!("Failed to list {}: {}", self.root.display(), e))
        })?;

        let mut processes = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Some(pid) = entry.file_name().to_str().and_then(|n| n.parse::<u32>().ok()) else {
                continue;
            };
            if let Some(info) = self.read_process(pid, &entry.path()).await {
                processes.push(info);
            }
        }

        processes.sort_by_key(|p| p.pid);
        trace!(count = processes.len(), "Scanned process table");
        Ok(processes)
    }
}

/// Parent PID from `/proc/<pid>/stat`. The command name in parentheses may
/// itself contain spaces and parentheses, so fields are counted after the last `)`.
fn parse_ppid(stat: &str) -> Option<u32> {
    let (_, fields) = stat.rsplit_once(')')?;
    fields.split_whitespace().nth(1)?.parse().ok()
}

/// Join NUL-separated `cmdline` arguments with spaces.
fn parse_cmdline(raw: &[u8]) -> String {
    let command = raw
        .split(|b| *b == 0)
        .filter(|arg| !arg.is_empty())
        .map(String::from_utf8_lossy)
        .collect::<Vec<_>>()
        .join(" ");

    if command.len() > MAX_COMMAND_LEN {
        let mut end = MAX_COMMAND_LEN;
        while !command.is_char_boundary(end) {
            end -= 1;
        }
        command[..end].to_string()
    } else {
        command
    }
}
