//! Rondo Core - Conversation Types
//!
//! Plain data types shared by every rondo crate: messages and the append-only
//! history, usage limits and the ledger that enforces them, termination
//! conditions, run status, run configuration and the error taxonomy.
//! Gateway and tool behavior lives in rondo-llm and rondo-agents.

pub mod config;
pub mod error;
pub mod identity;
pub mod message;
pub mod status;
pub mod termination;
pub mod usage;

pub use config::{AgentSpec, ParticipantKind, RunConfiguration, DEFAULT_MAX_TOOL_ROUNDS};
pub use error::{ConfigError, GatewayError, RondoError, RondoResult, ToolError};
pub use identity::{new_run_id, RunId, SequenceNumber, Timestamp};
pub use message::{History, Message, MessageKind, USER_SOURCE};
pub use status::{RunStatus, StopReason};
pub use termination::TerminationCondition;
pub use usage::{LimitExceeded, UsageDimension, UsageLedger, UsageLimits, UsageSnapshot};
