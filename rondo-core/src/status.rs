//! Run lifecycle status and the reason a run stopped.

use crate::error::GatewayError;
use crate::termination::TerminationCondition;
use crate::usage::LimitExceeded;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a conversation run.
///
/// `Running` is the only non-terminal state; there are no transitions out of
/// a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    /// A termination condition fired
    #[serde(rename = "completed_by_termination")]
    Completed,
    /// The wall-clock budget elapsed
    #[serde(rename = "completed_by_timeout")]
    TimedOut,
    /// A usage limit was hit, or the run was cancelled
    #[serde(rename = "aborted_by_usage_limit")]
    Aborted,
    /// The gateway reported an unrecoverable error
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed_by_termination",
            Self::TimedOut => "completed_by_timeout",
            Self::Aborted => "aborted_by_usage_limit",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a run reached its terminal status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// A termination condition was satisfied after a turn
    Termination { condition: TerminationCondition },
    /// A ledger reservation was refused
    UsageLimit { exceeded: LimitExceeded },
    /// The run's cancellation handle was triggered
    Cancelled,
    /// The configured wall-clock budget elapsed
    Timeout { timeout_ms: u64 },
    /// The gateway failed
    Gateway { error: GatewayError },
}

impl StopReason {
    /// Terminal status implied by this reason.
    pub fn status(&self) -> RunStatus {
        match self {
            Self::Termination { .. } => RunStatus::Completed,
            Self::UsageLimit { .. } | Self::Cancelled => RunStatus::Aborted,
            Self::Timeout { .. } => RunStatus::TimedOut,
            Self::Gateway { .. } => RunStatus::Failed,
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Termination { condition } => write!(f, "termination condition {} fired", condition),
            Self::UsageLimit { exceeded } => write!(f, "{}", exceeded),
            Self::Cancelled => f.write_str("run cancelled"),
            Self::Timeout { timeout_ms } => write!(f, "run timed out after {}ms", timeout_ms),
            Self::Gateway { error } => write!(f, "{}", error),
        }
    }
}
