//! Offline gateway that plays the demo without a model provider.

use async_trait::async_trait;
use rondo_core::{GatewayError, MessageKind};
use rondo_llm::{GatewayResponse, GenerateRequest, ModelGateway};
use std::collections::HashMap;

/// Deterministic stand-in for a chat model.
///
/// An agent with tools calls each of them once, in order, passing the task
/// as `input`, then answers with the collected tool output. An agent without
/// tools answers from its script; its n-th turn gets the n-th line and the
/// last line repeats.
#[derive(Debug, Clone, Default)]
pub struct DemoGateway {
    script: HashMap<String, Vec<String>>,
}

impl DemoGateway {
    pub fn new(script: HashMap<String, Vec<String>>) -> Self {
        Self { script }
    }
}

fn estimate_tokens(text: &str) -> u64 {
    text.split_whitespace().count() as u64 + 1
}

#[async_trait]
impl ModelGateway for DemoGateway {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<GatewayResponse, GatewayError> {
        let task = request
            .history
            .iter()
            .find(|m| m.kind == MessageKind::Task)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        let prompt_tokens = estimate_tokens(request.directive);

        if let Some(tool) = request.available_tools.get(request.tool_results.len()) {
            return Ok(GatewayResponse::tool_call(
                tool.clone(),
                serde_json::json!({ "input": task }),
                prompt_tokens,
            ));
        }

        if !request.tool_results.is_empty() {
            let content = request
                .tool_results
                .iter()
                .map(|exchange| exchange.output.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            let tokens = prompt_tokens + estimate_tokens(&content);
            return Ok(GatewayResponse::text(content, tokens));
        }

        let spoken = request
            .history
            .iter()
            .filter(|m| m.source == request.agent)
            .count();
        let reply = self
            .script
            .get(request.agent)
            .and_then(|lines| lines.get(spoken).or_else(|| lines.last()))
            .ok_or_else(|| GatewayError::InvalidResponse {
                provider: self.model_id().to_string(),
                reason: format!("no scripted reply for agent {}", request.agent),
            })?;
        Ok(GatewayResponse::text(
            reply.clone(),
            prompt_tokens + estimate_tokens(reply),
        ))
    }

    fn model_id(&self) -> &str {
        "demo"
    }
}
