// ABOUTME: Configuration loading for the Rancher endpoint and API credentials
// Merges a config file, RANCHERSSH_* environment variables and command-line flags

use crate::rancher::Credentials;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

const CONFIG_DIR_NAME: &str = ".rancherssh";
const SYSTEM_CONFIG_DIR: &str = "/etc/rancherssh";
const CONFIG_FILES: [&str; 4] = ["config.toml", "config.json", "config.yml", "config.yaml"];
const ENV_PREFIX: &str = "RANCHERSSH_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Missing required setting: {0}")]
    Missing(&'static str),
}

/// A partial set of settings from one source. Empty strings count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    pub endpoint: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl ConfigOverrides {
    /// Values set in `other` win over values in `self`.
    fn merge(self, other: Self) -> Self {
        Self {
            endpoint: pick(self.endpoint, other.endpoint),
            user: pick(self.user, other.user),
            password: pick(self.password, other.password),
        }
    }
}

fn pick(current: Option<String>, newer: Option<String>) -> Option<String> {
    match newer {
        Some(value) if !value.is_empty() => Some(value),
        _ => current,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub endpoint: String,
    pub user: String,
    pub password: String,
}

impl AppConfig {
    /// Loads from the default search path and the process environment, with
    /// `cli` applied last.
    pub fn load(cli: ConfigOverrides) -> Result<Self, ConfigError> {
        ConfigLoader::system().load(cli)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.endpoint, &self.user, &self.password)
    }

    fn from_layer(layer: ConfigOverrides) -> Result<Self, ConfigError> {
        let required = |value: Option<String>, name: &'static str| match value {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(ConfigError::Missing(name)),
        };

        Ok(Self {
            endpoint: required(layer.endpoint, "endpoint")?,
            user: required(layer.user, "user")?,
            password: required(layer.password, "password")?,
        })
    }
}

pub type EnvLookup = fn(&str) -> Option<String>;

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Layered config resolution with injectable search path and environment.
pub struct ConfigLoader<E = EnvLookup> {
    search_dirs: Vec<PathBuf>,
    env: E,
}

impl ConfigLoader {
    /// `./`, `~/.rancherssh/` and `/etc/rancherssh/`, in that order.
    pub fn system() -> Self {
        let mut search_dirs = vec![PathBuf::from(".")];
        if let Some(home) = dirs::home_dir() {
            search_dirs.push(home.join(CONFIG_DIR_NAME));
        }
        search_dirs.push(PathBuf::from(SYSTEM_CONFIG_DIR));
        Self::new(search_dirs, process_env)
    }
}

impl<E> ConfigLoader<E>
where
    E: Fn(&str) -> Option<String>,
{
    pub fn new(search_dirs: Vec<PathBuf>, env: E) -> Self {
        Self { search_dirs, env }
    }

    pub fn load(&self, cli: ConfigOverrides) -> Result<AppConfig, ConfigError> {
        let merged = self
            .file_layer()?
            .unwrap_or_default()
            .merge(self.env_layer())
            .merge(cli);
        AppConfig::from_layer(merged)
    }

    /// Settings from the first config file found on the search path.
    fn file_layer(&self) -> Result<Option<ConfigOverrides>, ConfigError> {
        for dir in &self.search_dirs {
            for name in CONFIG_FILES {
                let path = dir.join(name);
                if path.is_file() {
                    info!("Using config file {}", path.display());
                    return read_config_file(&path).map(Some);
                }
            }
        }
        debug!("No config file found on the search path");
        Ok(None)
    }

    fn env_layer(&self) -> ConfigOverrides {
        let var = |name: &str| (self.env)(&format!("{ENV_PREFIX}{name}"));
        ConfigOverrides {
            endpoint: var("ENDPOINT"),
            user: var("USER"),
            password: var("PASSWORD"),
        }
    }
}

fn read_config_file(path: &Path) -> Result<ConfigOverrides, ConfigError> {
    let parse_error = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let contents = std::fs::read_to_string(path).map_err(|e| parse_error(e.to_string()))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&contents).map_err(|e| parse_error(e.to_string())),
        Some("yml" | "yaml") => {
            serde_yaml::from_str(&contents).map_err(|e| parse_error(e.to_string()))
        }
        _ => toml::from_str(&contents).map_err(|e| parse_error(e.to_string())),
    }
}
