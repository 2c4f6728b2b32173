//! Process settings from the environment, log network from a TOML file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use decider::DeciderConfig;
use serde::Deserialize;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub config_path: PathBuf,
    pub state_dir: PathBuf,
    /// Submit is disabled when unset.
    pub submit_secret: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("TLOGD_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8420".to_string());
        let config_path = PathBuf::from(get("TLOGD_CONFIG")?);
        let state_dir = PathBuf::from(std::env::var("TLOGD_STATE_DIR").unwrap_or_else(|_| "./state".to_string()));
        let submit_secret = std::env::var("TLOGD_SUBMIT_SECRET").ok().filter(|s| !s.is_empty());

        Ok(Self { bind_addr, config_path, state_dir, submit_secret })
    }
}

fn get(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Missing required env var: {key}"))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogMode {
    /// Served and written by this process.
    Local,
    /// A peer reached over HTTP.
    Remote,
}

/// `[[log]]` entry.
#[derive(Clone, Debug, Deserialize)]
pub struct LogConfig {
    pub name: String,
    pub mode: LogMode,
    #[serde(default)]
    pub url: Option<String>,
    /// Hex ed25519 public key of a remote log.
    #[serde(default)]
    pub public_key: Option<String>,
    /// File holding the hex seed of a local log's signing key.
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
}

/// `[cache]` section.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub refresh_secs: u64,
    pub call_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { refresh_secs: 10, call_timeout_secs: 5 }
    }
}

impl CacheConfig {
    pub fn refresh(&self) -> Duration {
        Duration::from_secs(self.refresh_secs.max(1))
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs.max(1))
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct FileConfig {
    #[serde(rename = "log", default)]
    pub logs: Vec<LogConfig>,
    #[serde(rename = "decider", default)]
    pub deciders: Vec<DeciderConfig>,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let cfg: FileConfig = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.logs.is_empty() {
            bail!("at least one [[log]] is required");
        }
        if self.deciders.is_empty() {
            bail!("at least one [[decider]] is required");
        }

        let mut names = std::collections::BTreeSet::new();
        for log in &self.logs {
            if !names.insert(log.name.as_str()) {
                bail!("duplicate log name {}", log.name);
            }
            match log.mode {
                LogMode::Local => {
                    if log.private_key_path.is_none() {
                        bail!("local log {} needs private_key_path", log.name);
                    }
                }
                LogMode::Remote => {
                    let Some(url) = &log.url else {
                        bail!("remote log {} needs url", log.name);
                    };
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        bail!("url of log {} must start with http:// or https://", log.name);
                    }
                    if log.public_key.is_none() {
                        bail!("remote log {} needs public_key", log.name);
                    }
                }
            }
        }

        if self.logs.iter().filter(|l| l.mode == LogMode::Local).count() > 1 {
            bail!("at most one local log may be served");
        }
        Ok(())
    }

    pub fn local(&self) -> Option<&LogConfig> {
        self.logs.iter().find(|l| l.mode == LogMode::Local)
    }
}
