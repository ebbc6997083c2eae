//! Rondo Agents - Team Participants and Tools
//!
//! Participants take turns against a shared history. An assistant calls its
//! model gateway and may run tools in between; a user proxy reads a line of
//! human input. Both borrow run state through [`TurnContext`] and never own
//! any of it.

mod agent;
mod guard;
mod tool;
mod user_proxy;

pub use agent::{ActivitySink, Agent, ToolActivity, TurnContext, TurnError};
pub use guard::{Interrupt, RunCancellationToken, RunGuard};
pub use tool::{FnTool, Tool, ToolDescriptor, ToolOutcome, ToolRegistry, ToolRetryState};
pub use user_proxy::{InputSource, Participant, ScriptedInput, UserProxy};
