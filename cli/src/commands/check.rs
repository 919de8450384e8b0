//! Check command - verify the load generator is usable.

use anyhow::Result;
use hostfault_core::{AgentConfig, HostFaultEngine};
use serde_json::json;

pub async fn run(config: AgentConfig, json: bool) -> Result<()> {
    let program = config.stress_ng_path.display().to_string();
    let engine = HostFaultEngine::new(config);
    let result = engine.check_stress_tool().await;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "program": program,
                "installed": result.is_ok(),
                "error": result.as_ref().err().map(|e| e.to_string()),
            }))?
        );
        return Ok(());
    }

    match result {
        Ok(()) => println!("{} is installed", program),
        Err(e) => println!("{}", e),
    }
    Ok(())
}
