//! Configuration loading for the demo.
//!
//! The config path comes from `--config` or `RONDO_DEMO_CONFIG`; without
//! either, the bundled translation demo is used.

use rondo_core::{ConfigError, RunConfiguration};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const BUNDLED: &str = include_str!("../demos/translation.toml");

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DemoConfig {
    /// Task seeded as the first "user" message
    pub task: String,
    /// Emit logs and events as JSON lines
    #[serde(default)]
    pub json_logs: bool,
    /// Canned replies per agent, used in order
    #[serde(default)]
    pub script: HashMap<String, Vec<String>>,
    /// The team to run
    pub team: RunConfiguration,
}

impl DemoConfig {
    pub fn load() -> Result<Self, ConfigError> {
        match config_path_from_args().or_else(config_path_from_env) {
            Some(path) => Self::from_path(&path),
            None => {
                let config = Self::from_toml_str(BUNDLED)?;
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config = Self::from_toml_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseFailed {
            reason: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.task.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "task".to_string(),
                value: self.task.clone(),
                reason: "must not be empty".to_string(),
            });
        }
        if let Some(name) = self
            .script
            .keys()
            .find(|name| !self.team.agents.iter().any(|a| &a.name == *name))
        {
            return Err(ConfigError::UnknownReference {
                kind: "agent".to_string(),
                agent: "script".to_string(),
                name: name.clone(),
            });
        }
        self.team.validate()
    }

    /// Whether any participant reads from the terminal.
    pub fn needs_input(&self) -> bool {
        self.team.agents.iter().any(|a| a.is_user_proxy())
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("RONDO_DEMO_CONFIG").ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}
