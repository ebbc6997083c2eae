//! Rondo demo entry point.
//!
//! Runs a round-robin team from a TOML file (`--config <path>` or
//! `RONDO_DEMO_CONFIG`) against an offline gateway and streams the
//! conversation to stdout. Ctrl-C cancels the run.

mod config;
mod console;
mod error;
mod gateway;
mod input;
mod telemetry;

use crate::config::DemoConfig;
use crate::error::{DemoError, DemoResult};
use crate::gateway::DemoGateway;
use crate::input::StdinInput;
use futures_util::StreamExt;
use rondo_agents::{ToolDescriptor, ToolOutcome, ToolRegistry};
use rondo_core::RunStatus;
use rondo_llm::GatewayRegistry;
use rondo_team::{RoundRobinTeam, RunCancellationToken, RunEvent};
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

fn translation_tools() -> DemoResult<ToolRegistry> {
    let mut tools = ToolRegistry::new();
    for (name, language, greeting) in [
        ("spanish_tool", "Spanish", "Hola"),
        ("french_tool", "French", "Bonjour"),
        ("italian_tool", "Italian", "Ciao"),
    ] {
        tools.register(
            ToolDescriptor::from_fn(name, move |args| {
                let input = args["input"].as_str().unwrap_or_default();
                ToolOutcome::output(format!(
                    "[{}] {}! Translation of: '{}'",
                    language, greeting, input
                ))
            })
            .with_description(format!("Translate the input into {}", language)),
        )?;
    }
    Ok(tools)
}

#[tokio::main]
async fn main() -> Result<ExitCode, DemoError> {
    let config = DemoConfig::load()?;
    telemetry::init(config.json_logs)?;

    let gateways =
        GatewayRegistry::new().with("demo", Arc::new(DemoGateway::new(config.script.clone())));
    let cancellation = RunCancellationToken::new();
    let mut builder = RoundRobinTeam::builder(config.team.clone())
        .gateways(gateways)
        .tools(translation_tools()?)
        .cancellation(cancellation.clone());
    if config.needs_input() {
        builder = builder.input(Arc::new(StdinInput::new()));
    }
    let team = builder.build()?;

    let ctrl_c = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling run");
            ctrl_c.cancel();
        }
    });

    let mut events = team.run_stream(Some(&config.task));
    let mut stdout = std::io::stdout();
    let mut status = None;
    while let Some(event) = events.next().await {
        if config.json_logs {
            console::render_json(&mut stdout, &event)?;
        } else {
            console::render(&mut stdout, &event)?;
        }
        stdout.flush()?;
        if let RunEvent::Finished { result } = event {
            status = Some(result.status);
        }
    }

    Ok(match status.ok_or(DemoError::NoResult)? {
        RunStatus::Completed => ExitCode::SUCCESS,
        RunStatus::Failed => ExitCode::FAILURE,
        _ => ExitCode::from(2),
    })
}
