//! Run results and the events a streamed run emits.

use rondo_agents::{ToolActivity, ToolOutcome};
use rondo_core::{History, Message, RunId, RunStatus, StopReason, UsageSnapshot};
use serde::{Deserialize, Serialize};

/// Everything a finished run hands back to its caller.
///
/// Produced for every run that started, whatever its outcome, so partial
/// history is never lost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: RunId,
    /// Terminal status
    pub status: RunStatus,
    /// The condition, limit or failure that ended the run
    pub stop_reason: StopReason,
    /// Full ordered history, including the seeded task
    pub history: History,
    /// Final ledger counters
    pub usage: UsageSnapshot,
}

impl RunResult {
    /// Messages produced by turns, excluding the seeded task.
    pub fn turn_messages(&self) -> impl Iterator<Item = &Message> {
        self.history
            .iter()
            .filter(|m| m.kind == rondo_core::MessageKind::Turn)
    }

    /// Content of the last appended message, if any.
    pub fn last_content(&self) -> Option<&str> {
        self.history.last().map(|m| m.content.as_str())
    }
}

/// Progress of a streamed run. The final event is always `Finished`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    /// The task was appended before the first turn
    TaskSeeded { message: Message },
    /// A participant is about to take its turn
    TurnStarted { turn: usize, participant: String },
    /// A turn produced its message
    MessageAppended { message: Message },
    /// A tool attempt finished
    ToolInvoked {
        agent: String,
        tool: String,
        attempt: u32,
        outcome: ToolOutcome,
    },
    /// A tool asked to be retried and its budget allowed it
    ToolRetried {
        agent: String,
        tool: String,
        retries_used: u32,
        max_retries: u32,
        reason: String,
    },
    /// The run reached a terminal status
    Finished { result: RunResult },
}

impl From<ToolActivity> for RunEvent {
    fn from(activity: ToolActivity) -> Self {
        match activity {
            ToolActivity::Invoked {
                agent,
                tool,
                attempt,
                outcome,
            } => Self::ToolInvoked {
                agent,
                tool,
                attempt,
                outcome,
            },
            ToolActivity::Retried {
                agent,
                tool,
                retries_used,
                max_retries,
                reason,
            } => Self::ToolRetried {
                agent,
                tool,
                retries_used,
                max_retries,
                reason,
            },
        }
    }
}
