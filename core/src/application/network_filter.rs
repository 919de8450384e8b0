//! Network filter compilation.
//!
//! Turns raw fault parameters into a [`Filter`]: which traffic a network fault
//! affects, and which it must leave alone no matter what.

use std::net::IpAddr;

use ipnet::IpNet;
use tracing::{debug, warn};

use crate::domain::{
    host_nets, net_any, parse_net, Filter, NetWithPortRange, PortRange, RestrictedEndpoint,
};
use crate::error::Result;
use crate::ports::HostnameResolver;

const PARAMETERS_COMMENT: &str = "parameters";
const OWN_PORT_COMMENT: &str = "agent own-port";
const HEALTH_PORT_COMMENT: &str = "agent health-port";

/// Where the agent itself can be reached. Never affected by a network fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnEndpoint {
    pub ips: Vec<IpAddr>,
    pub port: u16,
    pub health_port: Option<u16>,
}

impl OwnEndpoint {
    fn excludes(&self) -> Vec<NetWithPortRange> {
        let nets = host_nets(&self.ips);
        let mut excludes =
            NetWithPortRange::cross(&nets, &[PortRange::single(self.port)], OWN_PORT_COMMENT);

        if let Some(health) = self.health_port.filter(|p| *p != self.port) {
            excludes.extend(NetWithPortRange::cross(
                &nets,
                &[PortRange::single(health)],
                HEALTH_PORT_COMMENT,
            ));
        }
        excludes
    }
}

/// Raw network fault parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterParams {
    /// Literal IPs, CIDRs and hostnames.
    pub hosts: Vec<String>,
    /// `"port"` or `"low-high"` strings.
    pub ports: Vec<String>,
}

/// Compiles network fault parameters into a [`Filter`].
pub struct NetworkFilterCompiler<R> {
    resolver: R,
}

impl<R: HostnameResolver> NetworkFilterCompiler<R> {
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }

    /// Resolve literal IPs, CIDRs and hostnames into network blocks.
    ///
    /// Literals are parsed locally. Everything else is handed to the resolver
    /// in a single call; one unresolvable name fails the whole call.
    pub async fn resolve_nets<S: AsRef<str>>(&self, entries: &[S]) -> Result<Vec<IpNet>> {
        let mut nets = Vec::new();
        let mut hostnames = Vec::new();

        for entry in entries.iter().map(|e| e.as_ref().trim()).filter(|e| !e.is_empty()) {
            match parse_net(entry) {
                Some(net) => nets.push(net),
                None => hostnames.push(entry.to_string()),
            }
        }

        if !hostnames.is_empty() {
            let ips = self.resolver.resolve(&hostnames).await?;
            debug!(hostnames = ?hostnames, resolved = ips.len(), "Resolved fault targets");
            nets.extend(host_nets(&ips));
        }

        Ok(nets)
    }

    /// Compile a filter.
    ///
    /// Fails on malformed port strings, unresolvable hostnames and restricted
    /// endpoints that cannot be parsed. Identical inputs give equal filters up
    /// to ordering.
    pub async fn compile(
        &self,
        params: &FilterParams,
        restricted: &[RestrictedEndpoint],
        own: &OwnEndpoint,
    ) -> Result<Filter> {
        let ports = PortRange::parse_all(params.ports.as_slice())?;

        let mut nets = self.resolve_nets(params.hosts.as_slice()).await?;
        if nets.is_empty() {
            nets = net_any();
        }

        let include = NetWithPortRange::cross(&nets, &ports, PARAMETERS_COMMENT);

        let mut exclude = Vec::new();
        for endpoint in restricted {
            exclude.extend(endpoint.to_excludes()?);
        }

        if own.ips.is_empty() {
            warn!("No own addresses known, the agent may become unreachable");
        }
        exclude.extend(own.excludes());

        Ok(Filter { include, exclude })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::collections::HashMap;

    /// Resolver backed by a fixed table.
    struct StaticResolver(HashMap<&'static str, Vec<IpAddr>>);

    impl HostnameResolver for StaticResolver {
        async fn resolve(&self, hostnames: &[String]) -> Result<Vec<IpAddr>> {
            let mut ips = Vec::new();
            for hostname in hostnames {
                match self.0.get(hostname.as_str()) {
                    Some(found) => ips.extend(found.iter().copied()),
                    None => {
                        return Err(Error::Resolution(format!(
                            "could not resolve hostname '{}'",
                            hostname
                        )))
                    }
                }
            }
            Ok(ips)
        }
    }

    fn compiler() -> NetworkFilterCompiler<StaticResolver> {
        let mut table = HashMap::new();
        table.insert("db.internal", vec!["10.0.0.7".parse().unwrap()]);
        NetworkFilterCompiler::new(StaticResolver(table))
    }

    fn own(port: u16, health_port: Option<u16>) -> OwnEndpoint {
        OwnEndpoint {
            ips: vec!["192.168.1.10".parse().unwrap()],
            port,
            health_port,
        }
    }

    fn net(raw: &str) -> IpNet {
        raw.parse().unwrap()
    }

    #[tokio::test]
    async fn test_empty_params_target_everything() {
        let filter = compiler()
            .compile(&FilterParams::default(), &[], &own(8085, None))
            .await
            .unwrap();

        assert_eq!(
            filter.include,
            vec![
                NetWithPortRange::new(net("0.0.0.0/0"), PortRange::ANY, "parameters"),
                NetWithPortRange::new(net("::/0"), PortRange::ANY, "parameters"),
            ]
        );
    }

    #[tokio::test]
    async fn test_include_is_cross_product() {
        let params = FilterParams {
            hosts: vec!["db.internal".into(), "172.16.0.0/12".into()],
            ports: vec!["5432".into(), "8000-8080".into()],
        };
        let filter = compiler().compile(&params, &[], &own(8085, None)).await.unwrap();

        assert_eq!(filter.include.len(), 4);
        assert!(filter.include.contains(&NetWithPortRange::new(
            net("10.0.0.7/32"),
            PortRange::single(5432),
            "parameters"
        )));
        assert!(filter.include.contains(&NetWithPortRange::new(
            net("172.16.0.0/12"),
            PortRange::new(8000, 8080).unwrap(),
            "parameters"
        )));
    }

    #[tokio::test]
    async fn test_same_health_port_excluded_once() {
        let filter = compiler()
            .compile(&FilterParams::default(), &[], &own(8080, Some(8080)))
            .await
            .unwrap();
        assert_eq!(filter.exclude.len(), 1);
        assert_eq!(filter.exclude[0].ports, PortRange::single(8080));
        assert_eq!(filter.exclude[0].comment, "agent own-port");
    }

    #[tokio::test]
    async fn test_distinct_health_port_excluded() {
        let filter = compiler()
            .compile(&FilterParams::default(), &[], &own(8080, Some(8081)))
            .await
            .unwrap();
        let ports: Vec<_> = filter.exclude.iter().map(|e| e.ports).collect();
        assert_eq!(ports, vec![PortRange::single(8080), PortRange::single(8081)]);
    }

    #[tokio::test]
    async fn test_restricted_endpoints_are_excluded() {
        let restricted = vec![RestrictedEndpoint {
            name: "platform".into(),
            url: "https://platform.example.com".into(),
            cidr: "10.9.0.0/16".into(),
            port_min: 443,
            port_max: 443,
        }];
        let filter = compiler()
            .compile(&FilterParams::default(), &restricted, &own(8085, None))
            .await
            .unwrap();

        assert_eq!(filter.exclude.len(), 2);
        assert_eq!(filter.exclude[0].net, net("10.9.0.0/16"));
        assert_eq!(
            filter.exclude[0].comment,
            "restricted-endpoint platform https://platform.example.com"
        );
    }

    #[tokio::test]
    async fn test_invalid_restricted_cidr_fails() {
        let restricted = vec![RestrictedEndpoint {
            name: "broken".into(),
            url: String::new(),
            cidr: "not-a-cidr".into(),
            port_min: 0,
            port_max: 0,
        }];
        let result = compiler()
            .compile(&FilterParams::default(), &restricted, &own(8085, None))
            .await;
        assert!(matches!(result, Err(Error::Resolution(_))));
    }

    #[tokio::test]
    async fn test_malformed_port_fails() {
        for bad in ["80-70", "http", "70000"] {
            let params = FilterParams {
                hosts: vec![],
                ports: vec![bad.into()],
            };
            let result = compiler().compile(&params, &[], &own(8085, None)).await;
            assert!(result.is_err(), "{} should not compile", bad);
        }
    }

    #[tokio::test]
    async fn test_unresolvable_hostname_fails_whole_compile() {
        let params = FilterParams {
            hosts: vec!["db.internal".into(), "nope.internal".into()],
            ports: vec![],
        };
        let result = compiler().compile(&params, &[], &own(8085, None)).await;
        assert!(matches!(result, Err(Error::Resolution(msg)) if msg.contains("nope.internal")));
    }

    #[tokio::test]
    async fn test_compile_is_deterministic() {
        let params = FilterParams {
            hosts: vec!["db.internal".into(), "10.1.2.3/8".into()],
            ports: vec!["80".into(), "443".into()],
        };
        let c = compiler();
        let a = c.compile(&params, &[], &own(8085, Some(8081))).await.unwrap();
        let b = c.compile(&params, &[], &own(8085, Some(8081))).await.unwrap();
        assert_eq!(a.normalized(), b.normalized());
        assert!(a.include.iter().any(|e| e.net == net("10.0.0.0/8")));
    }
}
