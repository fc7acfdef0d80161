///! CLI configuration management
///!
///! Settings live in `~/.config/kubeswitch/cli.toml`. `KUBESWITCH_CONFIG`
///! points at another file and `KUBESWITCH_SERVER` overrides the server URL.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "KUBESWITCH_CONFIG";
pub const SERVER_ENV: &str = "KUBESWITCH_SERVER";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server_url: String,
    pub output: String,
    pub timeout_secs: u64,
    pub log_level: String,
    /// `text` or `json`
    pub log_format: String,
    /// Where `ks select` writes kubeconfig files; defaults to `~/.kube/ks-cache`
    pub kube_cache_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8080".to_string(),
            output: "table".to_string(),
            timeout_secs: 10,
            log_level: "warn".to_string(),
            log_format: "text".to_string(),
            kube_cache_dir: None,
        }
    }
}

impl Config {
    /// Load from the default location with environment overrides applied
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        if let Ok(server) = std::env::var(SERVER_ENV) {
            if !server.trim().is_empty() {
                config.server_url = server;
            }
        }
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("parsing {}", path.display()))?;

        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        Ok(home_dir()?.join(".config/kubeswitch/cli.toml"))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn log_json(&self) -> bool {
        self.log_format.trim().eq_ignore_ascii_case("json")
    }

    pub fn kube_cache_dir(&self) -> Result<PathBuf> {
        match &self.kube_cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(home_dir()?.join(".kube/ks-cache")),
        }
    }
}

fn home_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home))
}
