//! Hostname resolvers.
//!
//! Fault targets must be resolved from the target's network context. When a
//! sidecar is available the lookup runs `dig` inside it; otherwise the agent's
//! own resolver is used.

use std::net::IpAddr;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::domain::SidecarOpts;
use crate::error::{Error, Result};
use crate::ports::{HostnameResolver, SidecarPort};

/// Upper bound for one `dig` invocation.
const DIG_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Dig via sidecar
// ============================================================================

/// Resolves hostnames by running `dig` inside a sidecar.
pub struct DigResolver<S> {
    sidecar: S,
    opts: SidecarOpts,
    dig: PathBuf,
}

impl<S: SidecarPort> DigResolver<S> {
    pub fn new(sidecar: S, opts: SidecarOpts, dig: impl Into<PathBuf>) -> Self {
        Self {
            sidecar,
            opts,
            dig: dig.into(),
        }
    }

    async fn lookup(&self, hostname: &str) -> Result<Vec<IpAddr>> {
        let args = dig_args(hostname);
        let mut cmd = self.sidecar.command(&self.opts, &self.dig, &args);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);

        let output = timeout(DIG_TIMEOUT, cmd.output())
            .await
            .map_err(|_| Error::Resolution(format!("lookup of '{}' timed out", hostname)))?
            .map_err(|e| Error::Resolution(format!("failed to run dig for '{}': {}", hostname, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Resolution(format!(
                "dig for '{}' failed: {}",
                hostname,
                stderr.trim()
            )));
        }

        Ok(parse_dig_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl<S: SidecarPort> HostnameResolver for DigResolver<S> {
    async fn resolve(&self, hostnames: &[String]) -> Result<Vec<IpAddr>> {
        let mut ips = Vec::new();
        for hostname in hostnames {
            let resolved = self.lookup(hostname).await?;
            if resolved.is_empty() {
                return Err(Error::Resolution(format!(
                    "could not resolve hostname '{}'",
                    hostname
                )));
            }
            debug!(hostname = %hostname, ips = ?resolved, "Resolved hostname");
            ips.extend(resolved);
        }
        Ok(ips)
    }
}

fn dig_args(hostname: &str) -> Vec<String> {
    vec![
        "+short".to_string(),
        "+timeout=2".to_string(),
        "+tries=1".to_string(),
        hostname.to_string(),
        "A".to_string(),
        hostname.to_string(),
        "AAAA".to_string(),
    ]
}

/// Keep the lines of `dig +short` output that are addresses.
///
/// CNAME targets and comments are skipped.
fn parse_dig_output(stdout: &str) -> Vec<IpAddr> {
    let mut ips: Vec<IpAddr> = Vec::new();
    for line in stdout.lines() {
        if let Ok(ip) = line.trim().parse::<IpAddr>() {
            if !ips.contains(&ip) {
                ips.push(ip);
            }
        }
    }
    ips
}

// ============================================================================
// System resolver
// ============================================================================

/// Resolves hostnames with the agent's own resolver configuration.
#[derive(Debug, Clone, Default)]
pub struct SystemResolver;

impl HostnameResolver for SystemResolver {
    async fn resolve(&self, hostnames: &[String]) -> Result<Vec<IpAddr>> {
        let mut ips: Vec<IpAddr> = Vec::new();
        for hostname in hostnames {
            let addrs = tokio::net::lookup_host((hostname.as_str(), 0))
                .await
                .map_err(|e| {
                    Error::Resolution(format!("could not resolve hostname '{}': {}", hostname, e))
                })?;

            let resolved: Vec<IpAddr> = addrs.map(|addr| addr.ip()).collect();
            if resolved.is_empty() {
                return Err(Error::Resolution(format!(
                    "could not resolve hostname '{}'",
                    hostname
                )));
            }
            for ip in resolved {
                if !ips.contains(&ip) {
                    ips.push(ip);
                }
            }
        }
        Ok(ips)
    }
}

// ============================================================================
// Selection
// ============================================================================

/// The resolver selected by agent configuration.
pub enum AgentResolver<S> {
    Sidecar(DigResolver<S>),
    System(SystemResolver),
}

impl<S: SidecarPort> HostnameResolver for AgentResolver<S> {
    async fn resolve(&self, hostnames: &[String]) -> Result<Vec<IpAddr>> {
        match self {
            AgentResolver::Sidecar(dig) => dig.resolve(hostnames).await,
            AgentResolver::System(system) => {
                warn!("Sidecar disabled, resolving hostnames in the agent's network context");
                system.resolve(hostnames).await
            }
        }
    }
}
