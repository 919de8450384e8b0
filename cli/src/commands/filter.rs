//! Filter command - compile a network blackhole filter without applying it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use hostfault_core::application::{FilterParams, OwnEndpoint};
use hostfault_core::ports::HostInfoPort;
use hostfault_core::{AgentConfig, HostFaultEngine, RestrictedEndpoint};

pub async fn run(
    config: AgentConfig,
    ip: Vec<String>,
    hostname: Vec<String>,
    port: Vec<String>,
    restricted: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let restricted: Vec<RestrictedEndpoint> = match restricted {
        Some(path) => {
            let content = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid restricted endpoints in {}", path.display()))?
        }
        None => Vec::new(),
    };

    let engine = HostFaultEngine::new(config);
    let own = OwnEndpoint {
        ips: engine.host().own_ips().await?,
        port: engine.config().port,
        health_port: engine.config().health_port(),
    };

    let mut hosts = ip;
    hosts.extend(hostname);
    let params = FilterParams { hosts, ports: port };

    let filter = engine
        .filter_compiler()
        .compile(&params, &restricted, &own)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&filter)?);
    } else {
        print!("{}", filter);
        println!(
            "\nTotal: {} include, {} exclude",
            filter.include.len(),
            filter.exclude.len()
        );
    }
    Ok(())
}
