//! Round-robin orchestration.
//!
//! One run is a strictly sequential loop: pick the participant under the
//! cursor, let it take its turn against the shared history, append its
//! message, advance the cursor and evaluate termination. Every run ends with
//! a [`RunResult`]; nothing after construction returns an error.

use crate::event::{RunEvent, RunResult};
use crate::termination::TerminationEvaluator;
use async_trait::async_trait;
use rondo_agents::{
    ActivitySink, InputSource, Participant, RunCancellationToken, RunGuard, ToolActivity,
    ToolRegistry, ToolRetryState, TurnContext, TurnError,
};
use rondo_core::{
    new_run_id, History, RondoResult, RunConfiguration, RunStatus, StopReason, UsageLedger,
    UsageLimits,
};
use rondo_llm::GatewayRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Capacity of the event channel behind [`RoundRobinTeam::run_stream`].
const EVENT_BUFFER: usize = 64;

// ============================================================================
// BUILDER
// ============================================================================

/// Collects the collaborators a team needs before validation.
pub struct TeamBuilder {
    config: RunConfiguration,
    gateways: GatewayRegistry,
    tools: ToolRegistry,
    input: Option<Arc<dyn InputSource>>,
    cancellation: Option<RunCancellationToken>,
}

impl TeamBuilder {
    pub fn gateways(mut self, gateways: GatewayRegistry) -> Self {
        self.gateways = gateways;
        self
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Input source shared by every user proxy in the team.
    pub fn input(mut self, input: Arc<dyn InputSource>) -> Self {
        self.input = Some(input);
        self
    }

    /// Cancellation handle checked before every turn and governed call.
    pub fn cancellation(mut self, token: RunCancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Validate the configuration and resolve every participant.
    pub fn build(self) -> RondoResult<RoundRobinTeam> {
        self.config.validate()?;

        let participants = self
            .config
            .agents
            .iter()
            .map(|spec| Participant::from_spec(spec, &self.gateways, &self.tools, self.input.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let team = RoundRobinTeam {
            participants,
            tools: self.tools,
            limits: self.config.limits,
            evaluator: TerminationEvaluator::new(self.config.termination.clone()),
            timeout: self.config.timeout(),
            cancellation: self.cancellation,
        };
        if team.evaluator.is_empty()
            && team.limits == UsageLimits::unbounded()
            && team.timeout.is_none()
            && team.cancellation.is_none()
        {
            warn!("Team has no termination condition, usage limit, timeout or cancellation handle");
        }
        Ok(team)
    }
}

impl std::fmt::Debug for TeamBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeamBuilder")
            .field("config", &self.config)
            .field("gateways", &self.gateways)
            .field("tools", &self.tools)
            .field("has_input", &self.input.is_some())
            .finish()
    }
}

// ============================================================================
// TEAM
// ============================================================================

/// A fixed cyclic order of participants sharing one history per run.
///
/// The team itself holds no per-run state. Each call to [`run`] or
/// [`run_stream`] gets its own history, ledger and retry counters, so runs
/// on clones of the same team never interfere.
///
/// [`run`]: RoundRobinTeam::run
/// [`run_stream`]: RoundRobinTeam::run_stream
#[derive(Debug, Clone)]
pub struct RoundRobinTeam {
    participants: Vec<Participant>,
    tools: ToolRegistry,
    limits: UsageLimits,
    evaluator: TerminationEvaluator,
    timeout: Option<Duration>,
    cancellation: Option<RunCancellationToken>,
}

/// Per-run mutable state, owned by exactly one run.
struct RunState {
    history: History,
    ledger: UsageLedger,
    retries: ToolRetryState,
}

/// Forwards run events to a stream consumer, if there is one.
///
/// A send that finds the channel full waits for room only until the run is
/// cancelled or times out; the event is then dropped.
struct EventSink<'a> {
    events: Option<&'a mpsc::Sender<RunEvent>>,
    guard: &'a RunGuard,
}

impl EventSink<'_> {
    async fn emit(&self, event: RunEvent) {
        let Some(tx) = self.events else {
            return;
        };
        match tx.try_send(event) {
            // A closed channel only means nobody is watching.
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(event)) => {
                if self.guard.race(tx.send(event)).await.is_err() {
                    debug!("Run interrupted while the event stream was full, event dropped");
                }
            }
        }
    }
}

#[async_trait]
impl<'a> ActivitySink for EventSink<'a> {
    async fn record(&self, activity: ToolActivity) {
        self.emit(RunEvent::from(activity)).await;
    }
}

impl RoundRobinTeam {
    /// Start building a team from a configuration.
    pub fn builder(config: RunConfiguration) -> TeamBuilder {
        TeamBuilder {
            config,
            gateways: GatewayRegistry::new(),
            tools: ToolRegistry::new(),
            input: None,
            cancellation: None,
        }
    }

    /// Build a team with gateways and tools and no user proxies.
    pub fn new(
        config: RunConfiguration,
        gateways: GatewayRegistry,
        tools: ToolRegistry,
    ) -> RondoResult<Self> {
        Self::builder(config).gateways(gateways).tools(tools).build()
    }

    pub fn participants(&self) -> impl Iterator<Item = &str> {
        self.participants.iter().map(Participant::name)
    }

    pub fn evaluator(&self) -> &TerminationEvaluator {
        &self.evaluator
    }

    /// Run to a terminal status. `task`, when given, is seeded as a "user"
    /// message before the first turn.
    pub async fn run(&self, task: Option<&str>) -> RunResult {
        self.drive(task.map(str::to_string), None).await
    }

    /// Run on a spawned task and stream its progress.
    ///
    /// Must be called within a tokio runtime. Dropping the stream does not
    /// stop the run; use the cancellation handle for that. A consumer that
    /// stops polling holds the run back once the buffer fills, but never past
    /// its timeout or cancellation. Tool events are sent as the tools run.
    pub fn run_stream(&self, task: Option<&str>) -> ReceiverStream<RunEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let team = self.clone();
        let task = task.map(str::to_string);
        tokio::spawn(async move {
            let result = team.drive(task, Some(&tx)).await;
            let _ = tx.send(RunEvent::Finished { result }).await;
        });
        ReceiverStream::new(rx)
    }

    async fn drive(&self, task: Option<String>, events: Option<&mpsc::Sender<RunEvent>>) -> RunResult {
        let run_id = new_run_id();
        let span = info_span!("team_run", run_id = %run_id, participants = self.participants.len());

        async move {
            let mut state = RunState {
                history: History::new(),
                ledger: UsageLedger::new(self.limits),
                retries: ToolRetryState::new(),
            };
            let guard = RunGuard::new(self.cancellation.clone(), self.timeout);
            let sink = EventSink {
                events,
                guard: &guard,
            };

            if let Some(task) = task {
                let message = state.history.seed_task(task).clone();
                sink.emit(RunEvent::TaskSeeded { message }).await;
            }

            let stop_reason = self.turn_loop(&mut state, &guard, &sink).await;
            let result = RunResult {
                run_id,
                status: stop_reason.status(),
                usage: state.ledger.snapshot(),
                stop_reason,
                history: state.history,
            };
            log_outcome(&result);
            result
        }
        .instrument(span)
        .await
    }

    async fn turn_loop(
        &self,
        state: &mut RunState,
        guard: &RunGuard,
        sink: &EventSink<'_>,
    ) -> StopReason {
        let mut cursor = 0usize;
        loop {
            if let Err(interrupt) = guard.check() {
                return TurnError::from(interrupt).into_stop_reason();
            }

            let participant = &self.participants[cursor];
            let turn = state.history.turn_count();
            debug!(turn, participant = participant.name(), "Turn started");
            sink.emit(RunEvent::TurnStarted {
                turn,
                participant: participant.name().to_string(),
            })
            .await;

            let outcome = {
                let mut ctx = TurnContext {
                    history: &state.history,
                    ledger: &mut state.ledger,
                    tools: &self.tools,
                    retries: &mut state.retries,
                    guard,
                    activity: sink,
                };
                participant.take_turn(&mut ctx).await
            };

            match outcome {
                Ok(content) => {
                    let message = state.history.append_turn(participant.name(), content).clone();
                    sink.emit(RunEvent::MessageAppended { message }).await;
                    cursor = (cursor + 1) % self.participants.len();

                    if let Some(condition) = self.evaluator.should_stop(&state.history, &state.ledger) {
                        return StopReason::Termination {
                            condition: condition.clone(),
                        };
                    }
                }
                Err(err) => return err.into_stop_reason(),
            }
        }
    }
}

fn log_outcome(result: &RunResult) {
    let turns = result.history.turn_count();
    match result.status {
        RunStatus::Completed => info!(
            status = %result.status,
            reason = %result.stop_reason,
            turns,
            usage = %result.usage,
            "Run completed"
        ),
        RunStatus::Failed => error!(
            status = %result.status,
            reason = %result.stop_reason,
            turns,
            usage = %result.usage,
            "Run failed"
        ),
        _ => warn!(
            status = %result.status,
            reason = %result.stop_reason,
            turns,
            usage = %result.usage,
            "Run stopped early"
        ),
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
