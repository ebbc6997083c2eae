//! Scripted gateway for tests and demos.

use crate::{GatewayResponse, GenerateRequest, ModelGateway, ToolExchange};
use async_trait::async_trait;
use rondo_core::GatewayError;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

type Step = Result<GatewayResponse, GatewayError>;

/// What the gateway saw on one call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub agent: String,
    pub history_len: usize,
    pub available_tools: Vec<String>,
    pub tool_results: Vec<ToolExchange>,
}

#[derive(Debug, Default)]
struct Script {
    per_agent: HashMap<String, VecDeque<Step>>,
    shared: VecDeque<Step>,
    fallback: Option<Step>,
    calls: Vec<RecordedRequest>,
}

/// Gateway that replays queued responses in order.
///
/// Responses queued for a specific agent take precedence over the shared
/// queue. When both are empty the fallback, if any, is returned on every
/// call; otherwise the call fails with `InvalidResponse`.
#[derive(Debug)]
pub struct ScriptedGateway {
    model_id: String,
    script: Mutex<Script>,
}

impl ScriptedGateway {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            script: Mutex::new(Script::default()),
        }
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a response for whichever agent calls next.
    pub fn push(&self, response: GatewayResponse) -> &Self {
        self.script().shared.push_back(Ok(response));
        self
    }

    /// Queue a failure for whichever agent calls next.
    pub fn push_error(&self, error: GatewayError) -> &Self {
        self.script().shared.push_back(Err(error));
        self
    }

    /// Queue a response for a named agent.
    pub fn push_for(&self, agent: impl Into<String>, response: GatewayResponse) -> &Self {
        self.script()
            .per_agent
            .entry(agent.into())
            .or_default()
            .push_back(Ok(response));
        self
    }

    /// Queue a failure for a named agent.
    pub fn push_error_for(&self, agent: impl Into<String>, error: GatewayError) -> &Self {
        self.script()
            .per_agent
            .entry(agent.into())
            .or_default()
            .push_back(Err(error));
        self
    }

    /// Response returned once every queue is drained.
    pub fn with_fallback(self, response: GatewayResponse) -> Self {
        self.script().fallback = Some(Ok(response));
        self
    }

    /// Number of `generate` calls received so far.
    pub fn calls(&self) -> usize {
        self.script().calls.len()
    }

    /// Copies of every request received so far.
    pub fn recorded(&self) -> Vec<RecordedRequest> {
        self.script().calls.clone()
    }

    /// Number of queued steps not yet consumed.
    pub fn remaining(&self) -> usize {
        let script = self.script();
        script.shared.len() + script.per_agent.values().map(VecDeque::len).sum::<usize>()
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<GatewayResponse, GatewayError> {
        let mut script = self.script();
        script.calls.push(RecordedRequest {
            agent: request.agent.to_string(),
            history_len: request.history.len(),
            available_tools: request.available_tools.to_vec(),
            tool_results: request.tool_results.to_vec(),
        });

        let step = script
            .per_agent
            .get_mut(request.agent)
            .and_then(VecDeque::pop_front)
            .or_else(|| script.shared.pop_front())
            .or_else(|| script.fallback.clone());

        step.unwrap_or_else(|| {
            Err(GatewayError::InvalidResponse {
                provider: self.model_id.clone(),
                reason: format!("script exhausted for agent {}", request.agent),
            })
        })
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
