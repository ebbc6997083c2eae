//! Error types for rondo operations

use crate::usage::LimitExceeded;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors, raised before any turn executes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Incompatible options: {option_a} and {option_b}")]
    IncompatibleOptions { option_a: String, option_b: String },

    #[error("Duplicate {field}: {name}")]
    Duplicate { field: String, name: String },

    #[error("Unknown {kind} referenced by agent {agent}: {name}")]
    UnknownReference {
        kind: String,
        agent: String,
        name: String,
    },

    #[error("Failed to read config file {path}: {reason}")]
    ReadFailed { path: String, reason: String },

    #[error("Failed to parse config: {reason}")]
    ParseFailed { reason: String },
}

/// Model Call Gateway errors. Always fatal to the run that observes them.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GatewayError {
    #[error("Request to {provider} failed: {reason}")]
    Transport { provider: String, reason: String },

    #[error("Authentication with {provider} failed: {reason}")]
    Authentication { provider: String, reason: String },

    #[error("Rate limited by {provider}, retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Tool faults. These are rendered as tool output text for the requesting
/// agent rather than propagated as run failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("Unknown tool: {tool}")]
    Unknown { tool: String },

    #[error("Tool {tool} is not available to agent {agent}")]
    NotBound { agent: String, tool: String },

    #[error("Tool {tool} failed: {reason}")]
    Failed { tool: String, reason: String },

    #[error("Tool {tool} exceeded max retries count of {max_retries}: {reason}")]
    RetriesExhausted {
        tool: String,
        max_retries: u32,
        reason: String,
    },
}

/// Master error type for all rondo errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RondoError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Usage limit exceeded: {0}")]
    Usage(#[from] LimitExceeded),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),
}

/// Result type alias for rondo operations.
pub type RondoResult<T> = Result<T, RondoError>;

// =============================================================================
// TESTS
// =============================================================================
