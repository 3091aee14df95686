pub mod error;

pub use error::{ConfigError, ConfigResult};

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::agent::DEFAULT_MAX_AGENT_DEPTH;
use crate::clients::{ClientState, ExecutionConfig, StaticClientRegistry};
use crate::console::VerbosityLevel;

/// Seconds a single tool execution may run before the executor gives up.
pub const DEFAULT_TOOL_EXECUTION_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClientConfig {
    pub name: String,
    #[serde(default)]
    pub code_mode: bool,
    #[serde(default)]
    pub tools_to_execute: Vec<String>,
    #[serde(default)]
    pub tools_to_auto_execute: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GatewayConfig {
    #[serde(default = "default_max_agent_depth")]
    pub max_agent_depth: usize,
    #[serde(default = "default_tool_execution_timeout_secs")]
    pub tool_execution_timeout_secs: u64,
    #[serde(default)]
    pub verbosity: Option<String>,
    #[serde(default)]
    pub clients: Vec<ClientConfig>,
}

fn default_max_agent_depth() -> usize {
    DEFAULT_MAX_AGENT_DEPTH
}

fn default_tool_execution_timeout_secs() -> u64 {
    DEFAULT_TOOL_EXECUTION_TIMEOUT_SECS
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_agent_depth: default_max_agent_depth(),
            tool_execution_timeout_secs: default_tool_execution_timeout_secs(),
            verbosity: None,
            clients: Vec::new(),
        }
    }
}

impl GatewayConfig {
    /// Load from the default location, falling back to defaults when no
    /// file exists yet.
    pub fn load() -> ConfigResult<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        if let Some(verbosity) = &self.verbosity {
            verbosity
                .parse::<VerbosityLevel>()
                .map_err(|_| ConfigError::InvalidValue {
                    field: "verbosity".to_string(),
                    value: verbosity.clone(),
                })?;
        }

        let mut seen: Vec<&str> = Vec::new();
        for client in &self.clients {
            if client.name.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    field: "clients.name".to_string(),
                });
            }
            if seen.contains(&client.name.as_str()) {
                return Err(ConfigError::DuplicateClient {
                    name: client.name.clone(),
                });
            }
            seen.push(&client.name);
        }
        Ok(())
    }

    /// Console level this configuration asks for, to feed `init_console`.
    /// An absent field means the default level.
    pub fn verbosity_level(&self) -> VerbosityLevel {
        self.verbosity
            .as_deref()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }

    /// Effective iteration budget; a zero in the file means "use the
    /// default", never "no iterations".
    pub fn effective_max_depth(&self) -> usize {
        if self.max_agent_depth == 0 {
            DEFAULT_MAX_AGENT_DEPTH
        } else {
            self.max_agent_depth
        }
    }

    /// Build the client registry this configuration describes. Tool
    /// schemas are attached later, as clients connect.
    pub fn build_registry(&self) -> StaticClientRegistry {
        let mut registry = StaticClientRegistry::new();
        for client in &self.clients {
            registry = registry.with_client(ClientState::new(
                &client.name,
                ExecutionConfig {
                    is_code_mode_client: client.code_mode,
                    tools_to_execute: client.tools_to_execute.clone(),
                    tools_to_auto_execute: client.tools_to_auto_execute.clone(),
                },
            ));
        }
        registry
    }

    fn config_path() -> ConfigResult<PathBuf> {
        let mut path = dirs::home_dir().ok_or(ConfigError::NoHomeDirectory)?;
        path.push(".config");
        path.push("toolgate");
        path.push("config.toml");
        Ok(path)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
