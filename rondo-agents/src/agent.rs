//! Model-backed agents and the turn they take.
//!
//! A turn is one or more gateway calls, with at most `max_tool_rounds` tool
//! round-trips between them. Every call and every tool attempt is reserved
//! against the run's ledger before it is issued.

use crate::guard::{Interrupt, RunGuard};
use crate::tool::{ToolOutcome, ToolRegistry, ToolRetryState};
use rondo_core::{
    AgentSpec, ConfigError, GatewayError, History, LimitExceeded, StopReason, ToolError,
    UsageDimension, UsageLedger,
};
use rondo_llm::{
    GatewayRegistry, GatewayResponse, GenerateRequest, ModelGateway, ToolCallRequest, ToolExchange,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

// ============================================================================
// TURN CONTEXT
// ============================================================================

/// Tool activity recorded during a turn, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolActivity {
    /// One tool attempt finished
    Invoked {
        agent: String,
        tool: String,
        attempt: u32,
        outcome: ToolOutcome,
    },
    /// A retry was granted from the tool's budget
    Retried {
        agent: String,
        tool: String,
        retries_used: u32,
        max_retries: u32,
        reason: String,
    },
}

/// Receives tool activity while the turn is still in progress.
#[async_trait]
pub trait ActivitySink: Send + Sync {
    async fn record(&self, activity: ToolActivity);
}

/// Run state a participant borrows for the duration of one turn.
pub struct TurnContext<'a> {
    /// Shared history as of the start of the turn
    pub history: &'a History,
    /// The run's usage ledger
    pub ledger: &'a mut UsageLedger,
    /// Tools registered for the team
    pub tools: &'a ToolRegistry,
    /// Retry budget consumed so far in this run
    pub retries: &'a mut ToolRetryState,
    /// Cancellation and deadline for the run
    pub guard: &'a RunGuard,
    /// Where tool activity goes as it happens
    pub activity: &'a dyn ActivitySink,
}

/// Why a turn produced no message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error(transparent)]
    LimitExceeded(#[from] LimitExceeded),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Interrupted(#[from] Interrupt),
}

impl TurnError {
    /// The run-level stop reason this turn failure implies.
    pub fn into_stop_reason(self) -> StopReason {
        match self {
            Self::LimitExceeded(exceeded) => StopReason::UsageLimit { exceeded },
            Self::Gateway(error) => StopReason::Gateway { error },
            Self::Interrupted(Interrupt::Cancelled) => StopReason::Cancelled,
            Self::Interrupted(Interrupt::TimedOut { timeout_ms }) => {
                StopReason::Timeout { timeout_ms }
            }
        }
    }
}

// ============================================================================
// AGENT
// ============================================================================

/// An assistant participant: a directive, bound tools and a gateway.
///
/// Agents hold no state across turns. Everything that changes lives in the
/// run (history, ledger, retry counters).
#[derive(Clone)]
pub struct Agent {
    name: String,
    directive: String,
    tools: Vec<String>,
    gateway: Arc<dyn ModelGateway>,
    max_tool_rounds: u32,
}

impl Agent {
    /// Build an agent from its spec, resolving the gateway and checking that
    /// every bound tool is registered.
    pub fn from_spec(
        spec: &AgentSpec,
        gateways: &GatewayRegistry,
        tools: &ToolRegistry,
    ) -> Result<Self, ConfigError> {
        let gateway = gateways.resolve(&spec.name, &spec.gateway)?;
        if let Some(missing) = spec.tools.iter().find(|t| !tools.contains(t)) {
            return Err(ConfigError::UnknownReference {
                kind: "tool".to_string(),
                agent: spec.name.clone(),
                name: missing.clone(),
            });
        }
        Ok(Self {
            name: spec.name.clone(),
            directive: spec.directive.clone(),
            tools: spec.tools.clone(),
            gateway,
            max_tool_rounds: spec.max_tool_rounds.max(1),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn directive(&self) -> &str {
        &self.directive
    }

    pub fn tools(&self) -> &[String] {
        &self.tools
    }

    pub fn max_tool_rounds(&self) -> u32 {
        self.max_tool_rounds
    }

    /// Produce this agent's message for the current history.
    ///
    /// The caller appends the returned content. On error nothing from this
    /// turn is kept, although reservations already made stay counted.
    pub async fn take_turn(&self, ctx: &mut TurnContext<'_>) -> Result<String, TurnError> {
        let mut exchanges: Vec<ToolExchange> = Vec::new();
        let mut rounds = 0u32;

        loop {
            let response = self.call_gateway(ctx, &exchanges).await?;
            match response.requested_tool {
                Some(call) if rounds < self.max_tool_rounds => {
                    rounds += 1;
                    let exchange = self.run_tool(ctx, call).await?;
                    exchanges.push(exchange);
                }
                Some(call) => {
                    debug!(
                        agent = %self.name,
                        tool = %call.name,
                        rounds,
                        "Tool round limit reached, keeping response text"
                    );
                    return Ok(response.content);
                }
                None => return Ok(response.content),
            }
        }
    }

    async fn call_gateway(
        &self,
        ctx: &mut TurnContext<'_>,
        exchanges: &[ToolExchange],
    ) -> Result<GatewayResponse, TurnError> {
        ctx.guard.check()?;
        ctx.ledger.check_and_reserve(UsageDimension::Requests, 1)?;

        debug!(
            agent = %self.name,
            model = self.gateway.model_id(),
            history_len = ctx.history.len(),
            tool_results = exchanges.len(),
            "Calling gateway"
        );
        let request = GenerateRequest {
            agent: &self.name,
            directive: &self.directive,
            history: ctx.history.messages(),
            available_tools: &self.tools,
            tool_results: exchanges,
        };
        let response = ctx.guard.race(self.gateway.generate(request)).await??;

        ctx.ledger
            .check_and_reserve(UsageDimension::ResponseTokens, response.tokens_consumed)?;
        Ok(response)
    }

    async fn run_tool(
        &self,
        ctx: &mut TurnContext<'_>,
        call: ToolCallRequest,
    ) -> Result<ToolExchange, TurnError> {
        if !self.tools.iter().any(|t| *t == call.name) {
            let err = ToolError::NotBound {
                agent: self.name.clone(),
                tool: call.name.clone(),
            };
            warn!(agent = %self.name, tool = %call.name, "Model requested an unbound tool");
            return Ok(failure(call, &err));
        }
        let registry = ctx.tools;
        let Some(descriptor) = registry.get(&call.name) else {
            let err = ToolError::Unknown {
                tool: call.name.clone(),
            };
            return Ok(failure(call, &err));
        };

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            ctx.guard.check()?;
            ctx.ledger.check_and_reserve(UsageDimension::ToolCalls, 1)?;

            debug!(agent = %self.name, tool = %call.name, attempt, "Invoking tool");
            let outcome = ctx.guard.race(descriptor.invoke(&call.args)).await?;
            ctx.activity
                .record(ToolActivity::Invoked {
                    agent: self.name.clone(),
                    tool: call.name.clone(),
                    attempt,
                    outcome: outcome.clone(),
                })
                .await;

            match outcome {
                ToolOutcome::Output(output) => {
                    return Ok(ToolExchange {
                        call,
                        output,
                        is_error: false,
                    });
                }
                ToolOutcome::Failed(reason) => {
                    let err = ToolError::Failed {
                        tool: call.name.clone(),
                        reason,
                    };
                    return Ok(failure(call, &err));
                }
                ToolOutcome::RetryRequested(reason) => {
                    if ctx.retries.try_consume(descriptor) {
                        ctx.activity
                            .record(ToolActivity::Retried {
                                agent: self.name.clone(),
                                tool: call.name.clone(),
                                retries_used: ctx.retries.retries_used(&call.name),
                                max_retries: descriptor.max_retries(),
                                reason,
                            })
                            .await;
                        continue;
                    }
                    let err = ToolError::RetriesExhausted {
                        tool: call.name.clone(),
                        max_retries: descriptor.max_retries(),
                        reason,
                    };
                    warn!(agent = %self.name, error = %err, "Tool retry budget exhausted");
                    return Ok(failure(call, &err));
                }
            }
        }
    }
}

fn failure(call: ToolCallRequest, err: &ToolError) -> ToolExchange {
    ToolExchange {
        call,
        output: err.to_string(),
        is_error: true,
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("tools", &self.tools)
            .field("model", &self.gateway.model_id())
            .field("max_tool_rounds", &self.max_tool_rounds)
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod prop_tests {
    use super::tests::{agent, spanish_registry, Fixture};
    use super::*;
    use proptest::prelude::*;
    use rondo_core::UsageLimits;
    use rondo_llm::ScriptedGateway;
    use serde_json::json;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// With a retry budget of at least N, the tool_calls ceiling N is what
        /// stops an always-retrying tool, after exactly N attempts.
        #[test]
        fn prop_tool_calls_limit_caps_retry_loop(limit in 1u64..20, extra in 0u32..20) {
            let max_retries = limit as u32 + extra;
            let gateway = Arc::new(ScriptedGateway::new("mock"));
            gateway.push(GatewayResponse::tool_call("infinite_retry_tool", json!({}), 1));
            let tools = spanish_registry(max_retries);
            let agent = agent(gateway.clone(), &tools, &["infinite_retry_tool"]);
            let mut fx = Fixture::new(UsageLimits::unbounded().with_tool_calls_limit(limit), tools);

            let result = runtime().block_on(agent.take_turn(&mut fx.ctx()));

            let err = result.unwrap_err();
            prop_assert_eq!(err.clone().into_stop_reason().status(), rondo_core::RunStatus::Aborted);
            prop_assert!(matches!(
                err,
                TurnError::LimitExceeded(LimitExceeded { dimension: UsageDimension::ToolCalls, .. })
            ), "expected LimitExceeded on ToolCalls, got {:?}", err);
            prop_assert_eq!(fx.ledger.tool_calls_executed(), limit);
            prop_assert_eq!(gateway.calls(), 1);
        }

        /// With a retry budget K below the ceiling, the tool gives up after
        /// exactly K retries and the model sees the failure as text.
        #[test]
        fn prop_retry_budget_exhausts_before_ceiling(max_retries in 0u32..15, headroom in 1u64..15) {
            let limit = u64::from(max_retries) + headroom;
            let gateway = Arc::new(ScriptedGateway::new("mock"));
            gateway
                .push(GatewayResponse::tool_call("infinite_retry_tool", json!({}), 1))
                .push(GatewayResponse::text("The tool keeps failing.", 1));
            let tools = spanish_registry(max_retries);
            let agent = agent(gateway.clone(), &tools, &["infinite_retry_tool"]);
            let mut fx = Fixture::new(UsageLimits::unbounded().with_tool_calls_limit(limit), tools);

            let content = runtime().block_on(agent.take_turn(&mut fx.ctx())).unwrap();

            prop_assert_eq!(content, "The tool keeps failing.");
            prop_assert_eq!(fx.retries.retries_used("infinite_retry_tool"), max_retries);
            prop_assert_eq!(fx.ledger.tool_calls_executed(), u64::from(max_retries) + 1);
            let recorded = gateway.recorded();
            prop_assert_eq!(recorded.len(), 2);
            prop_assert!(recorded[1].tool_results[0].is_error);
        }
    }
}
