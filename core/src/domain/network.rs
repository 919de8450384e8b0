//! Network filter domain models.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// PortRange
// ============================================================================

/// Inclusive range of ports. `from` is never greater than `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawPortRange")]
pub struct PortRange {
    from: u16,
    to: u16,
}

#[derive(Deserialize)]
struct RawPortRange {
    from: u16,
    to: u16,
}

impl TryFrom<RawPortRange> for PortRange {
    type Error = Error;

    fn try_from(raw: RawPortRange) -> Result<Self> {
        PortRange::new(raw.from, raw.to)
    }
}

impl PortRange {
    /// Covers every port.
    pub const ANY: PortRange = PortRange {
        from: 0,
        to: u16::MAX,
    };

    /// Create a range, rejecting `from > to`.
    pub fn new(from: u16, to: u16) -> Result<Self> {
        if from > to {
            return Err(Error::Validation(format!(
                "invalid port range {}-{}: upper bound is below lower bound",
                from, to
            )));
        }
        Ok(Self { from, to })
    }

    /// Range containing exactly one port.
    pub fn single(port: u16) -> Self {
        Self { from: port, to: port }
    }

    /// Parse `"x"` or `"x-y"`.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let (low, high) = match trimmed.split_once('-') {
            Some((low, high)) => (low.trim(), high.trim()),
            None => (trimmed, trimmed),
        };

        let from = parse_port(low, raw)?;
        let to = parse_port(high, raw)?;
        Self::new(from, to)
    }

    /// Parse a list of port strings, skipping empty entries.
    ///
    /// An empty (or all-blank) list yields `[PortRange::ANY]`.
    pub fn parse_all<S: AsRef<str>>(raw: &[S]) -> Result<Vec<Self>> {
        let mut ranges = Vec::new();
        for r in raw {
            let r = r.as_ref();
            if r.trim().is_empty() {
                continue;
            }
            ranges.push(Self::parse(r)?);
        }

        if ranges.is_empty() {
            ranges.push(Self::ANY);
        }
        Ok(ranges)
    }

    pub fn from(&self) -> u16 {
        self.from
    }

    pub fn to(&self) -> u16 {
        self.to
    }

    pub fn is_any(&self) -> bool {
        *self == Self::ANY
    }
}

fn parse_port(part: &str, raw: &str) -> Result<u16> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::Validation(format!(
            "invalid port range '{}': '{}' is not a port number",
            raw, part
        )));
    }
    part.parse::<u16>().map_err(|_| {
        Error::Validation(format!(
            "invalid port range '{}': '{}' is outside 0-65535",
            raw, part
        ))
    })
}

impl FromStr for PortRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.from == self.to {
            write!(f, "{}", self.from)
        } else {
            write!(f, "{}-{}", self.from, self.to)
        }
    }
}

// ============================================================================
// Network blocks
// ============================================================================

/// The "any address" sentinel: every IPv4 and every IPv6 address.
pub fn net_any() -> Vec<IpNet> {
    [
        Ipv4Net::new(Ipv4Addr::UNSPECIFIED, 0).map(IpNet::V4),
        Ipv6Net::new(Ipv6Addr::UNSPECIFIED, 0).map(IpNet::V6),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Parse a literal IP address or CIDR block.
///
/// Host bits in a CIDR are cleared (`10.1.2.3/8` becomes `10.0.0.0/8`); a bare
/// address becomes a single-host block. Returns `None` for anything else,
/// which callers treat as a hostname.
pub fn parse_net(raw: &str) -> Option<IpNet> {
    let raw = raw.trim();
    if let Ok(net) = IpNet::from_str(raw) {
        return Some(net.trunc());
    }
    IpAddr::from_str(raw).ok().map(IpNet::from)
}

/// Convert addresses into single-host blocks.
pub fn host_nets(ips: &[IpAddr]) -> Vec<IpNet> {
    ips.iter().copied().map(IpNet::from).collect()
}

// ============================================================================
// NetWithPortRange
// ============================================================================

/// A network block restricted to a port range.
///
/// `comment` records where the entry came from. It is informational and never
/// consulted when a filter is enforced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetWithPortRange {
    pub net: IpNet,
    pub ports: PortRange,
    #[serde(default)]
    pub comment: String,
}

impl NetWithPortRange {
    pub fn new(net: IpNet, ports: PortRange, comment: impl Into<String>) -> Self {
        Self {
            net,
            ports,
            comment: comment.into(),
        }
    }

    /// Cross product of networks and port ranges, all tagged with `comment`.
    pub fn cross(nets: &[IpNet], ports: &[PortRange], comment: &str) -> Vec<Self> {
        nets.iter()
            .flat_map(|net| ports.iter().map(move |p| Self::new(*net, *p, comment)))
            .collect()
    }
}

impl fmt::Display for NetWithPortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} port {}", self.net, self.ports)?;
        if !self.comment.is_empty() {
            write!(f, " ({})", self.comment)?;
        }
        Ok(())
    }
}

// ============================================================================
// Filter
// ============================================================================

/// Scope of a network fault: traffic matching `include` is affected unless it
/// also matches `exclude`.
///
/// Both lists are unions and their order carries no meaning. Engines
/// enforcing a filter must give every exclude entry precedence over every
/// include entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub include: Vec<NetWithPortRange>,
    pub exclude: Vec<NetWithPortRange>,
}

impl Filter {
    /// Copy with both lists sorted, for order-insensitive comparison.
    pub fn normalized(&self) -> Filter {
        let mut include = self.include.clone();
        let mut exclude = self.exclude.clone();
        include.sort();
        exclude.sort();
        Filter { include, exclude }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Include:")?;
        for entry in &self.include {
            writeln!(f, "  {}", entry)?;
        }
        writeln!(f, "Exclude:")?;
        for entry in &self.exclude {
            writeln!(f, "  {}", entry)?;
        }
        Ok(())
    }
}

// ============================================================================
// RestrictedEndpoint
// ============================================================================

/// A platform endpoint that a network fault must never affect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestrictedEndpoint {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    pub cidr: String,
    pub port_min: u32,
    pub port_max: u32,
}

impl RestrictedEndpoint {
    /// Exclude entries for this endpoint.
    ///
    /// An unparsable CIDR or port range is an error; the endpoint is never
    /// silently dropped.
    pub fn to_excludes(&self) -> Result<Vec<NetWithPortRange>> {
        let net = IpNet::from_str(self.cidr.trim())
            .map_err(|e| Error::Resolution(format!("invalid cidr {}: {}", self.cidr, e)))?
            .trunc();

        let ports = self.port_range().map_err(|e| {
            Error::Resolution(format!(
                "invalid port range for restricted endpoint {}: {}",
                self.cidr, e
            ))
        })?;

        Ok(NetWithPortRange::cross(&[net], &[ports], &self.comment()))
    }

    fn port_range(&self) -> Result<PortRange> {
        let from = u16::try_from(self.port_min)
            .map_err(|_| Error::Validation(format!("port {} out of range", self.port_min)))?;
        let to = u16::try_from(self.port_max)
            .map_err(|_| Error::Validation(format!("port {} out of range", self.port_max)))?;
        PortRange::new(from, to)
    }

    fn comment(&self) -> String {
        let mut comment = String::from("restricted-endpoint");
        for part in [&self.name, &self.url] {
            if !part.is_empty() {
                comment.push(' ');
                comment.push_str(part);
            }
        }
        comment
    }
}
