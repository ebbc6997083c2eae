//! Renders run events to stdout.

use rondo_agents::ToolOutcome;
use rondo_team::{RunEvent, RunResult};
use std::io::{self, Write};

/// Write one event in the human-readable console layout.
pub fn render<W: Write>(out: &mut W, event: &RunEvent) -> io::Result<()> {
    match event {
        RunEvent::TaskSeeded { message } | RunEvent::MessageAppended { message } => {
            writeln!(out, "---------- {} ----------", message.source)?;
            writeln!(out, "{}", message.content)
        }
        RunEvent::TurnStarted { .. } => Ok(()),
        RunEvent::ToolInvoked {
            agent,
            tool,
            attempt,
            outcome,
        } => {
            let (label, text) = match outcome {
                ToolOutcome::Output(text) => ("ok", text),
                ToolOutcome::RetryRequested(text) => ("retry", text),
                ToolOutcome::Failed(text) => ("failed", text),
            };
            writeln!(out, "  [{} -> {} #{}: {}] {}", agent, tool, attempt, label, text)
        }
        RunEvent::ToolRetried {
            tool,
            retries_used,
            max_retries,
            ..
        } => writeln!(out, "  [retrying {} ({}/{})]", tool, retries_used, max_retries),
        RunEvent::Finished { result } => render_summary(out, result),
    }
}

/// Write the final status line and usage report.
pub fn render_summary<W: Write>(out: &mut W, result: &RunResult) -> io::Result<()> {
    writeln!(out, "---------- result ----------")?;
    writeln!(out, "status: {} ({})", result.status, result.stop_reason)?;
    writeln!(out, "{}", result.usage)
}

/// Write one event as a JSON line.
pub fn render_json<W: Write>(out: &mut W, event: &RunEvent) -> io::Result<()> {
    serde_json::to_writer(&mut *out, event)?;
    writeln!(out)
}
