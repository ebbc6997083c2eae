//! Rondo Test Utilities
//!
//! Shared test infrastructure for the rondo workspace:
//! - Proptest generators for limits, names and message content
//! - Tool and gateway fixtures for common scenarios
//! - Assertions over run status and history

pub use rondo_agents::{ToolDescriptor, ToolOutcome, ToolRegistry};
pub use rondo_core::{
    AgentSpec, GatewayError, History, Message, RunConfiguration, RunStatus, StopReason,
    TerminationCondition, UsageDimension, UsageLimits, UsageSnapshot,
};
pub use rondo_llm::{GatewayRegistry, GatewayResponse, ScriptedGateway};

use async_trait::async_trait;
use rondo_llm::{GenerateRequest, ModelGateway};
use std::time::Duration;

// ============================================================================
// MOCK GATEWAYS
// ============================================================================

/// Gateway that never answers within any reasonable time.
///
/// Used to exercise wall-clock timeouts and cancellation of in-flight calls.
#[derive(Debug, Clone)]
pub struct StallingGateway {
    stall: Duration,
}

impl StallingGateway {
    pub fn new(stall: Duration) -> Self {
        Self { stall }
    }
}

#[async_trait]
impl ModelGateway for StallingGateway {
    async fn generate(
        &self,
        _request: GenerateRequest<'_>,
    ) -> Result<GatewayResponse, GatewayError> {
        tokio::time::sleep(self.stall).await;
        Ok(GatewayResponse::text("too late", 1))
    }

    fn model_id(&self) -> &str {
        "stalling"
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for rondo configuration and content.

    use super::*;
    use proptest::prelude::*;

    /// Generate usage limits with each dimension independently bounded or not.
    pub fn arb_usage_limits() -> impl Strategy<Value = UsageLimits> {
        (
            prop::option::of(1u64..50),
            prop::option::of(1u64..5000),
            prop::option::of(1u64..20),
        )
            .prop_map(|(request_limit, response_tokens_limit, tool_calls_limit)| UsageLimits {
                request_limit,
                response_tokens_limit,
                tool_calls_limit,
            })
    }

    /// Generate between 1 and `max` distinct agent names.
    pub fn arb_agent_names(max: usize) -> impl Strategy<Value = Vec<String>> {
        prop::collection::btree_set("[A-Z][a-z]{2,8}_Agent", 1..=max.max(1))
            .prop_map(|names| names.into_iter().collect())
    }

    /// Generate message text that never contains an upper-case marker.
    pub fn arb_message_content() -> impl Strategy<Value = String> {
        "[a-z ,.!?]{0,80}"
    }

    /// Generate a termination marker token.
    pub fn arb_marker() -> impl Strategy<Value = String> {
        "[A-Z]{3,8}(_[A-Z]{3,8})?"
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built tools, gateways and configurations.

    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    /// Name every fixture gateway is registered under.
    pub const GATEWAY: &str = "mock";

    /// A tool that asks to be retried on every invocation.
    pub fn always_retry_tool(max_retries: u32) -> ToolDescriptor {
        ToolDescriptor::from_fn("infinite_retry_tool", |_| {
            ToolOutcome::retry("Please try again.")
        })
        .with_max_retries(max_retries)
    }

    /// A tool that increments a shared counter and reports its new value.
    pub fn counter_tool() -> (ToolDescriptor, Arc<AtomicU64>) {
        let counter = Arc::new(AtomicU64::new(0));
        let shared = counter.clone();
        let tool = ToolDescriptor::from_fn("do_work", move |_| {
            let value = shared.fetch_add(1, Ordering::SeqCst) + 1;
            ToolOutcome::output(format!("Counter value is {}", value))
        });
        (tool, counter)
    }

    /// A translation tool that prefixes its input with `language`.
    pub fn translation_tool(name: &str, language: &'static str) -> ToolDescriptor {
        ToolDescriptor::from_fn(name, move |args| {
            let input = args["input"].as_str().unwrap_or_default();
            ToolOutcome::output(format!("[{}] Translation of: '{}'", language, input))
        })
    }

    /// A gateway registry holding `gateway` under [`GATEWAY`].
    pub fn registry_with(gateway: Arc<dyn ModelGateway>) -> GatewayRegistry {
        GatewayRegistry::new().with(GATEWAY, gateway)
    }

    /// Agent specs for `names`, all calling [`GATEWAY`].
    pub fn agents(names: &[&str]) -> Vec<AgentSpec> {
        names
            .iter()
            .map(|name| AgentSpec::new(*name, format!("You are {}.", name), GATEWAY))
            .collect()
    }

    /// The manager/specialist translation team.
    pub fn translation_config() -> RunConfiguration {
        RunConfiguration::new(agents(&["Manager", "Spanish_Agent", "French_Agent"]))
            .with_limits(UsageLimits::unbounded().with_request_limit(10))
            .with_termination(TerminationCondition::text_mention("ALL_DONE"))
    }

    /// A registry with one tool.
    pub fn tools_with(tool: ToolDescriptor) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        if let Err(e) = registry.register(tool) {
            panic!("fixture tool registration failed: {}", e);
        }
        registry
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over run outcomes.

    use super::*;

    /// Assert that turn messages came from `expected` sources, in order.
    #[track_caller]
    pub fn assert_turn_sources(history: &History, expected: &[&str]) {
        let sources: Vec<&str> = history
            .iter()
            .filter(|m| m.kind == rondo_core::MessageKind::Turn)
            .map(|m| m.source.as_str())
            .collect();
        assert_eq!(sources, expected, "Turn order mismatch");
    }

    /// Assert that sequence numbers are 0, 1, 2, ... in append order.
    #[track_caller]
    pub fn assert_sequence_contiguous(history: &History) {
        for (idx, message) in history.iter().enumerate() {
            assert_eq!(
                message.sequence_number, idx as u64,
                "Sequence gap at position {}",
                idx
            );
        }
    }

    /// Assert that a stop reason is a usage limit on `dimension`.
    #[track_caller]
    pub fn assert_usage_limit(reason: &StopReason, dimension: UsageDimension) {
        match reason {
            StopReason::UsageLimit { exceeded } => assert_eq!(
                exceeded.dimension, dimension,
                "Wrong dimension in usage limit: {}",
                exceeded
            ),
            other => panic!("Expected usage limit on {}, got: {:?}", dimension, other),
        }
    }

    /// Assert that counters stay within their configured ceilings.
    #[track_caller]
    pub fn assert_within_limits(usage: &UsageSnapshot, limits: &UsageLimits) {
        for (dimension, used) in [
            (UsageDimension::Requests, usage.requests),
            (UsageDimension::ResponseTokens, usage.response_tokens),
            (UsageDimension::ToolCalls, usage.tool_calls),
        ] {
            if let Some(limit) = limits.limit_for(dimension) {
                assert!(used <= limit, "{} = {} exceeds limit {}", dimension, used, limit);
            }
        }
    }
}
