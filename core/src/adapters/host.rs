//! Linux host facts: hostname, CPU allowance, interface addresses.

use std::net::IpAddr;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::OnceLock;

use regex::Regex;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};
use crate::ports::HostInfoPort;

/// Reads host facts from procfs and the `ip` tool.
#[derive(Debug, Clone)]
pub struct LinuxHost {
    init_status: PathBuf,
    ip: PathBuf,
}

impl LinuxHost {
    pub fn new() -> Self {
        Self {
            init_status: PathBuf::from("/proc/1/status"),
            ip: PathBuf::from("ip"),
        }
    }

    /// Read the CPU allowance from a different status file.
    pub fn with_init_status(mut self, path: impl Into<PathBuf>) -> Self {
        self.init_status = path.into();
        self
    }
}

impl Default for LinuxHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostInfoPort for LinuxHost {
    fn hostname(&self) -> Result<String> {
        let name = nix::unistd::gethostname()
            .map_err(|e| Error::CommandFailed(format!("Failed to read hostname: {}", e)))?;
        name.into_string()
            .map_err(|_| Error::ParseError("Hostname is not valid UTF-8".to_string()))
    }

    fn allowed_cpus(&self) -> Result<u32> {
        let status = std::fs::read_to_string(&self.init_status)?;
        let list = status
            .lines()
            .find_map(|line| line.strip_prefix("Cpus_allowed_list:"))
            .ok_or_else(|| {
                Error::ParseError(format!(
                    "No Cpus_allowed_list in {}",
                    self.init_status.display()
                ))
            })?;
        let count = count_cpu_list(list)?;
        debug!(count, "Read allowed CPUs of PID 1");
        Ok(count)
    }

    async fn own_ips(&self) -> Result<Vec<IpAddr>> {
        let output = Command::new(&self.ip)
            .args(["-o", "addr", "show"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::CommandFailed(format!("Failed to run ip: {}", e)))?;

        if !output.status.success() {
            return Err(Error::CommandFailed(format!(
                "ip addr show exited with {}",
                output.status
            )));
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| Error::ParseError(format!("Invalid UTF-8 in ip output: {}", e)))?;
        Ok(parse_ip_addr_output(&stdout))
    }
}

/// Count CPUs in a kernel CPU list such as `0-3,8,10-11`.
pub fn count_cpu_list(list: &str) -> Result<u32> {
    let mut count = 0u32;
    for part in list.trim().split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let invalid = || Error::ParseError(format!("Invalid CPU list entry '{}'", part));
        match part.split_once('-') {
            Some((from, to)) => {
                let from: u32 = from.parse().map_err(|_| invalid())?;
                let to: u32 = to.parse().map_err(|_| invalid())?;
                if to < from {
                    return Err(invalid());
                }
                count += to - from + 1;
            }
            None => {
                part.parse::<u32>().map_err(|_| invalid())?;
                count += 1;
            }
        }
    }
    Ok(count)
}

/// Extract interface addresses from `ip -o addr show` output.
fn parse_ip_addr_output(output: &str) -> Vec<IpAddr> {
    static INET: OnceLock<Regex> = OnceLock::new();
    let regex = INET.get_or_init(|| {
        Regex::new(r"\binet6?\s+([0-9a-fA-F:.]+)/\d+").expect("static regex is valid")
    });

    let mut ips: Vec<IpAddr> = Vec::new();
    for caps in output.lines().filter_map(|line| regex.captures(line)) {
        if let Ok(ip) = caps[1].parse::<IpAddr>() {
            if !ips.contains(&ip) {
                ips.push(ip);
            }
        }
    }
    ips
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_cpu_list() {
        assert_eq!(count_cpu_list("0-3,5").unwrap(), 5);
        assert_eq!(count_cpu_list("0").unwrap(), 1);
        assert_eq!(count_cpu_list(" 0-1, 4-5 \n").unwrap(), 4);
        assert!(count_cpu_list("3-1").is_err());
        assert!(count_cpu_list("a-b").is_err());
    }

    #[test]
    fn test_allowed_cpus_from_status_file() {
        let dir = tempfile::tempdir().unwrap();
        let status = dir.path().join("status");
        std::fs::write(
            &status,
            "Name:\tinit\nCpus_allowed:\t0f\nCpus_allowed_list:\t0-2,7\nMems_allowed_list:\t0\n",
        )
        .unwrap();

        let host = LinuxHost::new().with_init_status(&status);
        assert_eq!(host.allowed_cpus().unwrap(), 4);
    }

    #[test]
    fn test_allowed_cpus_missing_line() {
        let dir = tempfile::tempdir().unwrap();
        let status = dir.path().join("status");
        std::fs::write(&status, "Name:\tinit\n").unwrap();

        let host = LinuxHost::new().with_init_status(&status);
        assert!(matches!(host.allowed_cpus(), Err(Error::ParseError(_))));
    }

    #[test]
    fn test_parse_ip_addr_output() {
        let output = "\
1: lo    inet 127.0.0.1/8 scope host lo\\       valid_lft forever preferred_lft forever
1: lo    inet6 ::1/128 scope host \\       valid_lft forever preferred_lft forever
2: eth0    inet 10.1.2.3/24 brd 10.1.2.255 scope global eth0\\       valid_lft forever preferred_lft forever
2: eth0    inet6 fe80::1/64 scope link \\       valid_lft forever preferred_lft forever
";
        let ips = parse_ip_addr_output(output);
        assert_eq!(
            ips,
            vec![
                "127.0.0.1".parse::<IpAddr>().unwrap(),
                "::1".parse::<IpAddr>().unwrap(),
                "10.1.2.3".parse::<IpAddr>().unwrap(),
                "fe80::1".parse::<IpAddr>().unwrap(),
            ]
        );
    }

    #[test]
    fn test_hostname_is_not_empty() {
        assert!(!LinuxHost::new().hostname().unwrap().is_empty());
    }
}
