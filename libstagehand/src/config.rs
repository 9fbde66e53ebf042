//! Console configuration: an optional YAML file in the user's config
//! directory, overridden by the environment and then by explicit flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::eyre::{Result, WrapErr};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::log::*;

pub const API_URL_ENV: &str = "STAGEHAND_API_URL";
pub const CONFIG_FILE_ENV: &str = "STAGEHAND_CONFIG";

pub fn default_api_url() -> String {
    "http://localhost:8000/api/v1".into()
}

pub fn default_detail_poll_secs() -> u64 {
    5
}

pub fn default_list_poll_secs() -> u64 {
    15
}

#[derive(Getters, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default = "self::default_api_url")]
    api_url: String,
    #[serde(default = "self::default_detail_poll_secs")]
    detail_poll_secs: u64,
    #[serde(default = "self::default_list_poll_secs")]
    list_poll_secs: u64,
    #[serde(default)]
    token_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            detail_poll_secs: default_detail_poll_secs(),
            list_poll_secs: default_list_poll_secs(),
            token_file: None,
        }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("io", "stagehand", "stagehand")
}

impl Config {
    /// The config file used when none is given explicitly.
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            return Some(PathBuf::from(path));
        }
        project_dirs().map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Load the config file if it exists, then apply the environment.
    #[tracing::instrument]
    pub async fn load(path: Option<&Path>) -> Result<Config> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);
        let config = match path {
            Some(path) if path.exists() => {
                debug!("reading config from {}", path.display());
                let raw = fs::read_to_string(&path)
                    .await
                    .wrap_err_with(|| format!("Failed reading config file {}", path.display()))?;
                Self::parse(&raw)
                    .wrap_err_with(|| format!("Failed parsing config file {}", path.display()))?
            }
            _ => Config::default(),
        };
        Ok(config.with_env())
    }

    pub fn parse(raw: &str) -> Result<Config> {
        if raw.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(raw).wrap_err("deserializing config")
    }

    fn with_env(self) -> Self {
        match std::env::var(API_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => self.with_api_url(url),
            _ => self,
        }
    }

    pub fn with_api_url<S: Into<String>>(mut self, url: S) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn detail_poll_interval(&self) -> Duration {
        Duration::from_secs(self.detail_poll_secs.max(1))
    }

    pub fn list_poll_interval(&self) -> Duration {
        Duration::from_secs(self.list_poll_secs.max(1))
    }

    /// Where tokens are persisted between runs.
    pub fn token_path(&self) -> PathBuf {
        match &self.token_file {
            Some(path) => path.clone(),
            None => project_dirs()
                .map(|dirs| dirs.config_dir().join("tokens.json"))
                .unwrap_or_else(|| PathBuf::from(".stagehand-tokens.json")),
        }
    }
}
