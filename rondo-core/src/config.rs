//! Run configuration
//!
//! A [`RunConfiguration`] is built once, validated, and passed by reference to
//! the team that executes it. Nothing here reads ambient state; loading from a
//! TOML file is an explicit call.

use crate::error::ConfigError;
use crate::termination::TerminationCondition;
use crate::usage::UsageLimits;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Tool round-trips an agent may chain within one turn unless configured.
pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 1;

fn default_max_tool_rounds() -> u32 {
    DEFAULT_MAX_TOOL_ROUNDS
}

/// How a participant produces its message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantKind {
    /// Calls a model gateway, optionally with tools
    #[default]
    Assistant,
    /// Reads its message from a human input source
    UserProxy,
}

/// One participant in a round-robin team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentSpec {
    /// Unique name within the run; becomes the `source` of its messages
    pub name: String,
    /// Assistant or user proxy
    #[serde(default)]
    pub kind: ParticipantKind,
    /// Static instruction text passed to every model call
    #[serde(default)]
    pub directive: String,
    /// Names of tools from the registry this agent may call
    #[serde(default)]
    pub tools: Vec<String>,
    /// Name of the gateway handle this agent calls (assistants only)
    #[serde(default)]
    pub gateway: String,
    /// Maximum tool round-trips within a single turn
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,
}

impl AgentSpec {
    pub fn new(
        name: impl Into<String>,
        directive: impl Into<String>,
        gateway: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ParticipantKind::Assistant,
            directive: directive.into(),
            tools: Vec::new(),
            gateway: gateway.into(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    /// A participant whose messages are typed by a human.
    pub fn user_proxy(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParticipantKind::UserProxy,
            directive: String::new(),
            tools: Vec::new(),
            gateway: String::new(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn is_user_proxy(&self) -> bool {
        self.kind == ParticipantKind::UserProxy
    }

    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = rounds;
        self
    }
}

/// Everything a team needs to start a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfiguration {
    /// Participants in turn order
    pub agents: Vec<AgentSpec>,
    /// Usage ceilings for the run
    #[serde(default)]
    pub limits: UsageLimits,
    /// Conditions that end the run (logical OR)
    #[serde(default)]
    pub termination: Vec<TerminationCondition>,
    /// Wall-clock budget for the whole run
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl RunConfiguration {
    pub fn new(agents: Vec<AgentSpec>) -> Self {
        Self {
            agents,
            limits: UsageLimits::unbounded(),
            termination: Vec::new(),
            timeout_ms: None,
        }
    }

    pub fn with_limits(mut self, limits: UsageLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_termination(mut self, condition: TerminationCondition) -> Self {
        self.termination.push(condition);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        // Round up so a positive sub-millisecond budget stays positive.
        let millis = timeout.as_nanos().div_ceil(1_000_000);
        self.timeout_ms = Some(u64::try_from(millis).unwrap_or(u64::MAX));
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Parse a configuration from TOML text. The result is not validated.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseFailed {
            reason: e.to_string(),
        })
    }

    /// Read, parse and validate a TOML configuration file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config = Self::from_toml_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - at least one agent, with unique non-empty names
    /// - each assistant names a gateway and allows at least one tool round
    /// - user proxies bind no tools
    /// - no tool is bound twice to the same agent
    /// - every configured limit is greater than 0
    /// - termination conditions are individually valid and not conflicting
    /// - the timeout, when given, is greater than 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agents.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "agents".to_string(),
            });
        }

        let mut names = HashSet::new();
        for agent in &self.agents {
            if agent.name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "agents.name".to_string(),
                    value: agent.name.clone(),
                    reason: "agent name must not be empty".to_string(),
                });
            }
            if !names.insert(agent.name.as_str()) {
                return Err(ConfigError::Duplicate {
                    field: "agent name".to_string(),
                    name: agent.name.clone(),
                });
            }
            match agent.kind {
                ParticipantKind::Assistant if agent.gateway.trim().is_empty() => {
                    return Err(ConfigError::MissingRequired {
                        field: format!("agents.{}.gateway", agent.name),
                    });
                }
                ParticipantKind::UserProxy if !agent.tools.is_empty() => {
                    return Err(ConfigError::IncompatibleOptions {
                        option_a: format!("agents.{}.kind = user_proxy", agent.name),
                        option_b: format!("agents.{}.tools", agent.name),
                    });
                }
                _ => {}
            }
            if agent.max_tool_rounds == 0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("agents.{}.max_tool_rounds", agent.name),
                    value: "0".to_string(),
                    reason: "max_tool_rounds must be greater than 0".to_string(),
                });
            }
            let mut tools = HashSet::new();
            for tool in &agent.tools {
                if !tools.insert(tool.as_str()) {
                    return Err(ConfigError::Duplicate {
                        field: format!("tool binding for agent {}", agent.name),
                        name: tool.clone(),
                    });
                }
            }
        }

        self.limits.validate()?;
        TerminationCondition::validate_all(&self.termination)?;

        if self.timeout_ms == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "timeout_ms".to_string(),
                value: "0".to_string(),
                reason: "timeout_ms must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
