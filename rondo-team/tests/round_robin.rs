//! End-to-end behavior of round-robin runs against scripted collaborators.

use rondo_agents::{InputSource, ScriptedInput, ToolRegistry};
use rondo_core::{
    AgentSpec, GatewayError, MessageKind, RondoError, RunConfiguration, RunStatus, StopReason,
    TerminationCondition, UsageDimension, UsageLimits,
};
use rondo_llm::{GatewayResponse, ScriptedGateway};
use rondo_team::{RoundRobinTeam, RunCancellationToken};
use rondo_test_utils::assertions::*;
use rondo_test_utils::fixtures::*;
use rondo_test_utils::StallingGateway;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn team(config: RunConfiguration, gateway: Arc<ScriptedGateway>, tools: ToolRegistry) -> RoundRobinTeam {
    RoundRobinTeam::new(config, registry_with(gateway), tools).unwrap()
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[tokio::test]
async fn test_manager_all_done_stops_after_one_turn() {
    let gateway = Arc::new(ScriptedGateway::new("gpt-4o"));
    gateway.push_for("Manager", GatewayResponse::text("ALL_DONE", 5));
    let team = team(translation_config(), gateway.clone(), ToolRegistry::new());

    let result = team.run(Some("Translate 'good morning'")).await;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(
        result.stop_reason,
        StopReason::Termination {
            condition: TerminationCondition::text_mention("ALL_DONE")
        }
    );
    assert_eq!(result.turn_messages().count(), 1);
    assert_eq!(result.usage.requests, 1);
    assert_eq!(gateway.calls(), 1);
    assert_eq!(result.history.messages()[0].kind, MessageKind::Task);
    assert_eq!(result.history.messages()[0].source, "user");
}

#[tokio::test]
async fn test_token_overrun_aborts_with_no_agent_message() {
    let gateway = Arc::new(ScriptedGateway::new("gpt-4o"));
    gateway.push(GatewayResponse::text("A very long poem", 60));
    let config = RunConfiguration::new(agents(&["assistant"]))
        .with_limits(UsageLimits::unbounded().with_response_tokens_limit(50));
    let team = team(config, gateway, ToolRegistry::new());

    let result = team.run(Some("Write a poem")).await;

    assert_eq!(result.status, RunStatus::Aborted);
    assert_usage_limit(&result.stop_reason, UsageDimension::ResponseTokens);
    assert_eq!(result.turn_messages().count(), 0);
    assert_eq!(result.usage.response_tokens, 0);
    assert_eq!(result.usage.requests, 1);
}

#[tokio::test]
async fn test_request_limit_caps_gateway_calls() {
    let gateway =
        Arc::new(ScriptedGateway::new("gpt-4o").with_fallback(GatewayResponse::text("more", 1)));
    let config = RunConfiguration::new(agents(&["A", "B"]))
        .with_limits(UsageLimits::unbounded().with_request_limit(3));
    let team = team(config, gateway.clone(), ToolRegistry::new());

    let result = team.run(None).await;

    assert_eq!(result.status, RunStatus::Aborted);
    assert_usage_limit(&result.stop_reason, UsageDimension::Requests);
    assert_eq!(gateway.calls(), 3);
    assert_eq!(result.usage.requests, 3);
    assert_turn_sources(&result.history, &["A", "B", "A"]);
    assert_eq!(
        result.stop_reason.to_string(),
        "The next request would exceed the request_limit of 3 (requests=4)"
    );
}

#[tokio::test]
async fn test_ledger_exceeded_condition_still_aborts() {
    let gateway =
        Arc::new(ScriptedGateway::new("gpt-4o").with_fallback(GatewayResponse::text("more", 1)));
    let config = RunConfiguration::new(agents(&["A", "B"]))
        .with_limits(UsageLimits::unbounded().with_request_limit(2))
        .with_termination(TerminationCondition::LedgerExceeded);
    let team = team(config, gateway.clone(), ToolRegistry::new());

    let result = team.run(Some("task")).await;

    assert_eq!(result.status, RunStatus::Aborted);
    assert_usage_limit(&result.stop_reason, UsageDimension::Requests);
    assert_eq!(result.history.turn_count(), 2);
    assert_eq!(gateway.calls(), 2);
}

#[tokio::test]
async fn test_round_robin_order_without_early_termination() {
    let gateway =
        Arc::new(ScriptedGateway::new("gpt-4o").with_fallback(GatewayResponse::text("ok", 1)));
    let config = RunConfiguration::new(agents(&["A", "B", "C"]))
        .with_termination(TerminationCondition::max_turns(7));
    let team = team(config, gateway, ToolRegistry::new());

    let result = team.run(Some("go")).await;

    assert_eq!(result.status, RunStatus::Completed);
    assert_turn_sources(&result.history, &["A", "B", "C", "A", "B", "C", "A"]);
    assert_sequence_contiguous(&result.history);
}

#[tokio::test]
async fn test_single_agent_takes_consecutive_turns() {
    let gateway =
        Arc::new(ScriptedGateway::new("gpt-4o").with_fallback(GatewayResponse::text("again", 1)));
    let config = RunConfiguration::new(agents(&["solo"]))
        .with_termination(TerminationCondition::max_turns(3));
    let team = team(config, gateway, ToolRegistry::new());

    let result = team.run(None).await;
    assert_turn_sources(&result.history, &["solo", "solo", "solo"]);
}

#[tokio::test]
async fn test_text_mention_is_case_sensitive() {
    let gateway = Arc::new(ScriptedGateway::new("gpt-4o"));
    gateway
        .push(GatewayResponse::text("Please approve this draft", 1))
        .push(GatewayResponse::text("approve", 1))
        .push(GatewayResponse::text("Approved? APPROVE", 1))
        .push(GatewayResponse::text("never reached", 1));
    let config = RunConfiguration::new(agents(&["writer", "critic"]))
        .with_termination(TerminationCondition::text_mention("APPROVE"));
    let team = team(config, gateway.clone(), ToolRegistry::new());

    let result = team.run(Some("Write a haiku")).await;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.turn_messages().count(), 3);
    assert_eq!(result.last_content(), Some("Approved? APPROVE"));
    assert_eq!(gateway.remaining(), 1);
}

#[tokio::test]
async fn test_marker_in_task_does_not_terminate() {
    let gateway = Arc::new(ScriptedGateway::new("gpt-4o"));
    gateway.push(GatewayResponse::text("ALL_DONE", 1));
    let team = team(translation_config(), gateway, ToolRegistry::new());

    let result = team.run(Some("Reply ALL_DONE when finished")).await;
    assert_eq!(result.turn_messages().count(), 1);
    assert_eq!(result.history.messages()[1].source, "Manager");
}

#[tokio::test]
async fn test_gateway_failure_preserves_history() {
    let gateway = Arc::new(ScriptedGateway::new("gpt-4o"));
    gateway
        .push_for("Manager", GatewayResponse::text("Spanish_Agent, translate", 3))
        .push_error_for(
            "Spanish_Agent",
            GatewayError::Transport {
                provider: "azure".to_string(),
                reason: "connection reset".to_string(),
            },
        );
    let team = team(translation_config(), gateway, ToolRegistry::new());

    let result = team.run(Some("Translate 'good morning'")).await;

    assert_eq!(result.status, RunStatus::Failed);
    assert!(matches!(
        result.stop_reason,
        StopReason::Gateway {
            error: GatewayError::Transport { .. }
        }
    ));
    assert_turn_sources(&result.history, &["Manager"]);
    assert_eq!(result.usage.requests, 2);
}

// ============================================================================
// TOOLS
// ============================================================================

fn tool_agent(tool: &str) -> RunConfiguration {
    RunConfiguration::new(vec![
        AgentSpec::new("worker", "Use your tool.", GATEWAY).with_tools([tool]),
        AgentSpec::new("reviewer", "Review the work.", GATEWAY),
    ])
}

#[tokio::test]
async fn test_tool_calls_limit_aborts_always_retry_tool() {
    for limit in [1u64, 3, 5] {
        let gateway = Arc::new(ScriptedGateway::new("gpt-4o").with_fallback(
            GatewayResponse::tool_call("infinite_retry_tool", json!({}), 1),
        ));
        let config = tool_agent("infinite_retry_tool")
            .with_limits(UsageLimits::unbounded().with_tool_calls_limit(limit));
        let team = team(config, gateway, tools_with(always_retry_tool(5)));

        let result = team.run(Some("Call the tool")).await;

        assert_eq!(result.status, RunStatus::Aborted);
        assert_usage_limit(&result.stop_reason, UsageDimension::ToolCalls);
        assert_eq!(result.usage.tool_calls, limit);
        assert_eq!(result.turn_messages().count(), 0);
    }
}

#[tokio::test]
async fn test_retry_budget_exhaustion_continues_conversation() {
    let gateway = Arc::new(ScriptedGateway::new("gpt-4o"));
    gateway
        .push_for(
            "worker",
            GatewayResponse::tool_call("infinite_retry_tool", json!({}), 1),
        )
        .push_for("worker", GatewayResponse::text("The tool failed.", 1))
        .push_for("reviewer", GatewayResponse::text("Noted.", 1));
    let config = tool_agent("infinite_retry_tool")
        .with_limits(UsageLimits::unbounded().with_tool_calls_limit(10))
        .with_termination(TerminationCondition::max_turns(2));
    let team = team(config, gateway.clone(), tools_with(always_retry_tool(3)));

    let result = team.run(Some("Call the tool")).await;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.usage.tool_calls, 4);
    assert_turn_sources(&result.history, &["worker", "reviewer"]);

    let fed_back = &gateway.recorded()[1].tool_results[0];
    assert!(fed_back.is_error);
    assert!(fed_back
        .output
        .contains("Tool infinite_retry_tool exceeded max retries count of 3"));
}

#[tokio::test]
async fn test_counter_tool_side_effects_are_serialized() {
    let (tool, counter) = counter_tool();
    let gateway = Arc::new(ScriptedGateway::new("gpt-4o"));
    for _ in 0..2 {
        gateway
            .push_for("worker", GatewayResponse::tool_call("do_work", json!({}), 1))
            .push_for("worker", GatewayResponse::text("Did some work", 1));
    }
    let config = RunConfiguration::new(vec![
        AgentSpec::new("worker", "Use your tool.", GATEWAY).with_tools(["do_work"]),
    ])
    .with_termination(TerminationCondition::max_turns(2));
    let team = team(config, gateway.clone(), tools_with(tool));

    let result = team.run(None).await;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(counter.load(Ordering::SeqCst), 2);
    assert_eq!(
        gateway.recorded()[3].tool_results[0].output,
        "Counter value is 2"
    );
    assert_eq!(
        result.usage.to_string(),
        "Usage(requests=4, response_tokens=4, tool_calls=2)"
    );
}

// ============================================================================
// USER PROXY
// ============================================================================

#[tokio::test]
async fn test_user_proxy_approval_loop() {
    let gateway = Arc::new(ScriptedGateway::new("gpt-4o"));
    gateway
        .push(GatewayResponse::text("Ocean waves at dawn", 10))
        .push(GatewayResponse::text("Waves kiss the shore", 10));
    let input: Arc<dyn InputSource> = Arc::new(ScriptedInput::new(["make it calmer", "APPROVE"]));
    let config = RunConfiguration::new(vec![
        AgentSpec::new("assistant", "You are a poet.", GATEWAY),
        AgentSpec::user_proxy("user_proxy"),
    ])
    .with_termination(TerminationCondition::text_mention("APPROVE"));
    let team = RoundRobinTeam::builder(config)
        .gateways(registry_with(gateway))
        .input(input)
        .build()
        .unwrap();

    let result = team.run(Some("Write a 4 line poem about the ocean.")).await;

    assert_eq!(result.status, RunStatus::Completed);
    assert_turn_sources(
        &result.history,
        &["assistant", "user_proxy", "assistant", "user_proxy"],
    );
    assert_eq!(result.usage.requests, 2);
    assert_eq!(result.usage.response_tokens, 20);
}

// ============================================================================
// TIMEOUT AND CANCELLATION
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_timeout_interrupts_stalled_gateway() {
    let config = RunConfiguration::new(agents(&["assistant"])).with_timeout(Duration::from_secs(50));
    let gateways = registry_with(Arc::new(StallingGateway::new(Duration::from_secs(600))));
    let team = RoundRobinTeam::new(config, gateways, ToolRegistry::new()).unwrap();

    let result = team.run(Some("Write a poem")).await;

    assert_eq!(result.status, RunStatus::TimedOut);
    assert_eq!(result.stop_reason, StopReason::Timeout { timeout_ms: 50_000 });
    assert_eq!(result.turn_messages().count(), 0);
    assert_eq!(result.history.len(), 1);
    assert_eq!(result.usage.requests, 1);
}

#[tokio::test]
async fn test_cancelled_before_start_issues_nothing() {
    let gateway = Arc::new(ScriptedGateway::new("gpt-4o"));
    let token = RunCancellationToken::new();
    token.cancel();
    let team = RoundRobinTeam::builder(translation_config())
        .gateways(registry_with(gateway.clone()))
        .cancellation(token)
        .build()
        .unwrap();

    let result = team.run(Some("Translate")).await;

    assert_eq!(result.status, RunStatus::Aborted);
    assert_eq!(result.stop_reason, StopReason::Cancelled);
    assert_eq!(gateway.calls(), 0);
    assert_eq!(result.history.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_interrupts_in_flight_call() {
    let token = RunCancellationToken::new();
    let config = RunConfiguration::new(agents(&["assistant"]));
    let team = RoundRobinTeam::builder(config)
        .gateways(registry_with(Arc::new(StallingGateway::new(Duration::from_secs(600)))))
        .cancellation(token.clone())
        .build()
        .unwrap();

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
    });
    let result = team.run(None).await;
    canceller.await.unwrap();

    assert_eq!(result.status, RunStatus::Aborted);
    assert_eq!(result.stop_reason, StopReason::Cancelled);
    assert!(result.history.is_empty());
}

// ============================================================================
// CONSTRUCTION
// ============================================================================

#[test]
fn test_unregistered_tool_binding_is_rejected() {
    let gateway = Arc::new(ScriptedGateway::new("gpt-4o"));
    let err = RoundRobinTeam::new(
        tool_agent("weather"),
        registry_with(gateway),
        ToolRegistry::new(),
    )
    .unwrap_err();
    assert!(matches!(err, RondoError::Config(_)));
    assert!(err.to_string().contains("weather"));
}

#[test]
fn test_user_proxy_without_input_is_rejected() {
    let config = RunConfiguration::new(vec![AgentSpec::user_proxy("user_proxy")]);
    let err = RoundRobinTeam::new(config, rondo_llm::GatewayRegistry::new(), ToolRegistry::new())
        .unwrap_err();
    assert!(matches!(err, RondoError::Config(_)));
}

#[test]
fn test_conflicting_termination_is_rejected() {
    let gateway = Arc::new(ScriptedGateway::new("gpt-4o"));
    let config = translation_config()
        .with_termination(TerminationCondition::max_turns(3))
        .with_termination(TerminationCondition::max_turns(5));
    let err = RoundRobinTeam::new(config, registry_with(gateway), ToolRegistry::new()).unwrap_err();
    assert!(matches!(err, RondoError::Config(_)));
}
