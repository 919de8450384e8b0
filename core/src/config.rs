//! Agent configuration.
//!
//! Stored as JSON at `~/.hostfault/config.json`. Environment variables
//! override file values:
//!
//! | Variable                    | Field            |
//! |-----------------------------|------------------|
//! | `HOSTFAULT_PORT`            | `port`           |
//! | `HOSTFAULT_HEALTH_PORT`     | `healthPort`     |
//! | `HOSTFAULT_DISABLE_SIDECAR` | `disableSidecar` |
//! | `HOSTFAULT_STRESSNG_PATH`   | `stressNgPath`   |

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{Error, Result};

pub const ENV_PORT: &str = "HOSTFAULT_PORT";
pub const ENV_HEALTH_PORT: &str = "HOSTFAULT_HEALTH_PORT";
pub const ENV_DISABLE_SIDECAR: &str = "HOSTFAULT_DISABLE_SIDECAR";
pub const ENV_STRESSNG_PATH: &str = "HOSTFAULT_STRESSNG_PATH";

/// Agent settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// Port the agent listens on. Always excluded from network faults.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Health endpoint port; 0 means none.
    #[serde(default = "default_health_port")]
    pub health_port: u16,

    /// Run helpers directly instead of inside the target's namespaces.
    #[serde(default)]
    pub disable_sidecar: bool,

    #[serde(default = "default_stress_ng_path")]
    pub stress_ng_path: PathBuf,

    #[serde(default = "default_dig_path")]
    pub dig_path: PathBuf,

    #[serde(default = "default_nsenter_path")]
    pub nsenter_path: PathBuf,

    /// Process whose namespaces sidecar commands join.
    #[serde(default = "default_sidecar_target_pid")]
    pub sidecar_target_pid: u32,

    /// Delay between SIGTERM and SIGKILL for graceful kills.
    #[serde(default = "default_kill_grace_period_ms")]
    pub kill_grace_period_ms: u64,

    /// Timeout of the load generator version probe.
    #[serde(default = "default_preflight_timeout_ms")]
    pub preflight_timeout_ms: u64,
}

fn default_port() -> u16 {
    8085
}

fn default_health_port() -> u16 {
    8081
}

fn default_stress_ng_path() -> PathBuf {
    PathBuf::from("stress-ng")
}

fn default_dig_path() -> PathBuf {
    PathBuf::from("dig")
}

fn default_nsenter_path() -> PathBuf {
    PathBuf::from("nsenter")
}

fn default_sidecar_target_pid() -> u32 {
    1
}

fn default_kill_grace_period_ms() -> u64 {
    500
}

fn default_preflight_timeout_ms() -> u64 {
    1000
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            health_port: default_health_port(),
            disable_sidecar: false,
            stress_ng_path: default_stress_ng_path(),
            dig_path: default_dig_path(),
            nsenter_path: default_nsenter_path(),
            sidecar_target_pid: default_sidecar_target_pid(),
            kill_grace_period_ms: default_kill_grace_period_ms(),
            preflight_timeout_ms: default_preflight_timeout_ms(),
        }
    }
}

impl AgentConfig {
    /// Health port, unless unset.
    pub fn health_port(&self) -> Option<u16> {
        (self.health_port != 0).then_some(self.health_port)
    }

    pub fn kill_grace_period(&self) -> Duration {
        Duration::from_millis(self.kill_grace_period_ms)
    }

    pub fn preflight_timeout(&self) -> Duration {
        Duration::from_millis(self.preflight_timeout_ms)
    }

    /// Apply overrides from `lookup`, usually the process environment.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(ENV_PORT) {
            self.port = parse_env(ENV_PORT, &port)?;
        }
        if let Some(port) = lookup(ENV_HEALTH_PORT) {
            self.health_port = parse_env(ENV_HEALTH_PORT, &port)?;
        }
        if let Some(flag) = lookup(ENV_DISABLE_SIDECAR) {
            self.disable_sidecar = parse_env(ENV_DISABLE_SIDECAR, &flag)?;
        }
        if let Some(path) = lookup(ENV_STRESSNG_PATH).filter(|p| !p.trim().is_empty()) {
            self.stress_ng_path = PathBuf::from(path);
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid {}='{}': {}", name, raw, e)))
}

/// Configuration store.
///
/// Handles reading and writing configuration to `~/.hostfault/config.json`.
pub struct ConfigStore {
    /// Path to the configuration file.
    config_path: PathBuf,
}

impl ConfigStore {
    /// Create a new config store with the default path.
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

        Ok(Self {
            config_path: home.join(".hostfault").join("config.json"),
        })
    }

    /// Create a config store with a custom path.
    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Load the file only. Returns defaults if it doesn't exist.
    pub async fn load_file(&self) -> Result<AgentConfig> {
        if !fs::try_exists(&self.config_path).await.unwrap_or(false) {
            debug!(path = %self.config_path.display(), "No config file, using defaults");
            return Ok(AgentConfig::default());
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load the file and apply environment overrides.
    pub async fn load(&self) -> Result<AgentConfig> {
        let mut config = self.load_file().await?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub async fn save(&self, config: &AgentConfig) -> Result<()> {
        if let Some(config_dir) = self.config_path.parent() {
            fs::create_dir_all(config_dir)
                .await
                .map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let content = serde_json::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        // Write atomically by writing to temp file then renaming
        let temp_path = self.config_path.with_extension("json.tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to create temp config file: {}", e)))?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))?;

        file.sync_all()
            .await
            .map_err(|e| Error::Config(format!("Failed to sync config: {}", e)))?;

        fs::rename(&temp_path, &self.config_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to rename config file: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[tokio::test]
    async fn test_load_nonexistent() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::with_path(dir.path().join("config.json"));
        let config = store.load_file().await.unwrap();
        assert_eq!(config, AgentConfig::default());
        assert_eq!(config.port, 8085);
        assert_eq!(config.health_port(), Some(8081));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::with_path(dir.path().join("nested").join("config.json"));

        let config = AgentConfig {
            port: 9000,
            health_port: 0,
            disable_sidecar: true,
            ..Default::default()
        };
        store.save(&config).await.unwrap();

        let loaded = store.load_file().await.unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.health_port(), None);
        assert!(!dir.path().join("nested").join("config.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"port": 7000, "stressNgPath": "/opt/bin/stress-ng"}"#).unwrap();

        let config = ConfigStore::with_path(&path).load_file().await.unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.stress_ng_path, PathBuf::from("/opt/bin/stress-ng"));
        assert_eq!(config.kill_grace_period(), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_invalid_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = ConfigStore::with_path(&path).load_file().await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AgentConfig::default();
        config
            .apply_overrides(env(&[
                (ENV_PORT, "9090"),
                (ENV_HEALTH_PORT, "0"),
                (ENV_DISABLE_SIDECAR, "true"),
                (ENV_STRESSNG_PATH, "/usr/local/bin/stress-ng"),
            ]))
            .unwrap();

        assert_eq!(config.port, 9090);
        assert_eq!(config.health_port(), None);
        assert!(config.disable_sidecar);
        assert_eq!(config.stress_ng_path, PathBuf::from("/usr/local/bin/stress-ng"));
    }

    #[test]
    fn test_invalid_env_override() {
        let mut config = AgentConfig::default();
        let err = config.apply_overrides(env(&[(ENV_PORT, "http")])).unwrap_err();
        assert!(err.to_string().contains(ENV_PORT));
    }
}
