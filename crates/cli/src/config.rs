//! Service configuration: an optional TOML file, then `SHELTER_*`
//! environment overrides, then command-line flags.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shelter_adoption::WorkflowConfig;
use shelter_core::Animal;

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid value '{value}' for {var}: {reason}")]
    Env {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid seed file {path}: {source}")]
    Seed {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ServiceConfig {
    pub(crate) port: u16,
    /// When set, every route except `/health` requires this key.
    pub(crate) api_key: Option<String>,
    /// Fallback filter when `RUST_LOG` is not set.
    pub(crate) log_level: String,
    /// JSON array of animals loaded into the store at startup.
    pub(crate) seed_animals: Option<PathBuf>,
    pub(crate) workflow: WorkflowConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            api_key: None,
            log_level: "info".to_string(),
            seed_animals: None,
            workflow: WorkflowConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Read `path` if given, then apply the process environment.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `SHELTER_*` overrides read through `lookup`. Empty values are
    /// ignored.
    pub(crate) fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(value) = get("SHELTER_PORT") {
            self.port = value.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::Env {
                    var: "SHELTER_PORT",
                    value: value.clone(),
                    reason: e.to_string(),
                }
            })?;
        }
        if let Some(value) = get("SHELTER_API_KEY") {
            self.api_key = Some(value);
        }
        if let Some(value) = get("SHELTER_LOG_LEVEL") {
            self.log_level = value;
        }
        if let Some(value) = get("SHELTER_TRANSITION_POLICY") {
            self.workflow.transition_policy =
                value.parse().map_err(|reason| ConfigError::Env {
                    var: "SHELTER_TRANSITION_POLICY",
                    value: value.clone(),
                    reason,
                })?;
        }
        Ok(())
    }

    pub(crate) fn load_seed_animals(&self) -> Result<Vec<Animal>, ConfigError> {
        let Some(path) = &self.seed_animals else {
            return Ok(Vec::new());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Seed {
            path: path.clone(),
            source,
        })
    }
}
