//! Config command - show the effective configuration.

use anyhow::Result;
use hostfault_core::{AgentConfig, ConfigStore};

pub fn show(store: &ConfigStore, config: &AgentConfig, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    let health_port = config
        .health_port()
        .map(|p| p.to_string())
        .unwrap_or_else(|| "-".to_string());

    println!("Config file:      {}", store.path().display());
    println!("Port:             {}", config.port);
    println!("Health port:      {}", health_port);
    println!("Sidecar:          {}", if config.disable_sidecar { "disabled" } else { "enabled" });
    println!("Sidecar target:   {}", config.sidecar_target_pid);
    println!("stress-ng:        {}", config.stress_ng_path.display());
    println!("dig:              {}", config.dig_path.display());
    println!("nsenter:          {}", config.nsenter_path.display());
    println!("Kill grace:       {}ms", config.kill_grace_period_ms);
    println!("Preflight:        {}ms", config.preflight_timeout_ms);
    Ok(())
}
