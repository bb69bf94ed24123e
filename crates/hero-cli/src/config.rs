use hero_bridge::{default_known_agents, KnownAgent};
use hero_coordinator::CoordinatorConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Contents of `hero.toml`. Every section is optional.
#[derive(Debug, Deserialize)]
pub struct HeroConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub trace: TraceConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct SecurityConfig {
    #[serde(default)]
    pub api_keys: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct TraceConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Defaults to `<data_dir>/trace/events.jsonl`.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_known_agents")]
    pub known_agents: Vec<KnownAgent>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            channel_capacity: default_channel_capacity(),
            known_agents: default_known_agents(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_true() -> bool {
    true
}
fn default_channel_capacity() -> usize {
    256
}

impl HeroConfig {
    /// Read `path`, falling back to defaults when the file does not exist.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        if !tokio::fs::try_exists(path).await? {
            info!(path = %path.display(), "No config file; using defaults");
            return Ok(toml::from_str("")?);
        }
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;
        Ok(toml::from_str(&raw)?)
    }

    pub fn trace_file(&self) -> PathBuf {
        self.trace
            .file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("trace").join("events.jsonl"))
    }
}
