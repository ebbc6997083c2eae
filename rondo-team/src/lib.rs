//! Rondo Team - Round-Robin Orchestration
//!
//! Runs a fixed, cyclic order of participants against one shared history,
//! under one usage ledger, until a termination condition fires, a usage
//! limit is hit, the run is cancelled or times out, or a gateway fails.
//!
//! # Example
//! ```ignore
//! let team = RoundRobinTeam::builder(config)
//!     .gateways(gateways)
//!     .tools(tools)
//!     .build()?;
//! let result = team.run(Some("Translate 'good morning'")).await;
//! println!("{} {}", result.status, result.usage);
//! ```

mod event;
mod team;
mod termination;

pub use event::{RunEvent, RunResult};
pub use team::{RoundRobinTeam, TeamBuilder};
pub use termination::TerminationEvaluator;

pub use rondo_agents::RunCancellationToken;
