//! Rondo LLM - Model Call Gateway
//!
//! Provider-agnostic interface for the model calls an agent makes.
//! This crate defines what a gateway must implement and how gateways are
//! looked up by name. Concrete provider clients are supplied by the caller.

use async_trait::async_trait;
use rondo_core::{ConfigError, GatewayError, Message};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

mod scripted;

pub use scripted::{RecordedRequest, ScriptedGateway};

// ============================================================================
// REQUEST / RESPONSE TYPES
// ============================================================================

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Registry name of the tool
    pub name: String,
    /// Structured arguments for the tool
    #[serde(default)]
    pub args: serde_json::Value,
}

impl ToolCallRequest {
    pub fn new(name: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// The result of running a requested tool, fed back to the next model call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExchange {
    /// The request the model made
    pub call: ToolCallRequest,
    /// Tool output, or the rendered tool error
    pub output: String,
    /// Whether `output` describes a failure
    pub is_error: bool,
}

/// Everything a gateway sees for one model call.
#[derive(Debug, Clone, Copy)]
pub struct GenerateRequest<'a> {
    /// Name of the calling agent
    pub agent: &'a str,
    /// The agent's static directive
    pub directive: &'a str,
    /// The full shared history at the start of the turn
    pub history: &'a [Message],
    /// Tools the agent may request
    pub available_tools: &'a [String],
    /// Tool round-trips completed earlier in this turn, oldest first
    pub tool_results: &'a [ToolExchange],
}

/// What a gateway returns for one model call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayResponse {
    /// Generated message text
    pub content: String,
    /// Tokens the provider reports for this call
    pub tokens_consumed: u64,
    /// A tool the model wants to call before it answers
    #[serde(default)]
    pub requested_tool: Option<ToolCallRequest>,
}

impl GatewayResponse {
    /// A plain text answer.
    pub fn text(content: impl Into<String>, tokens_consumed: u64) -> Self {
        Self {
            content: content.into(),
            tokens_consumed,
            requested_tool: None,
        }
    }

    /// A response that asks for a tool call.
    pub fn tool_call(
        name: impl Into<String>,
        args: serde_json::Value,
        tokens_consumed: u64,
    ) -> Self {
        Self {
            content: String::new(),
            tokens_consumed,
            requested_tool: Some(ToolCallRequest::new(name, args)),
        }
    }
}

// ============================================================================
// GATEWAY TRAIT
// ============================================================================

/// Trait for model call gateways.
/// Implementations must be thread-safe (Send + Sync).
///
/// A gateway never retries on its own behalf from the orchestrator's point of
/// view: any error it returns ends the run as failed.
///
/// # Example
/// ```ignore
/// struct OpenRouterGateway { /* ... */ }
///
/// #[async_trait]
/// impl ModelGateway for OpenRouterGateway {
///     async fn generate(&self, request: GenerateRequest<'_>) -> Result<GatewayResponse, GatewayError> {
///         // Call the chat completions endpoint
///     }
///     fn model_id(&self) -> &str { "openai/gpt-oss-20b" }
/// }
/// ```
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Generate the next message for an agent.
    ///
    /// # Returns
    /// * `Ok(GatewayResponse)` - Generated text, token usage, optional tool request
    /// * `Err(GatewayError)` - Transport, authentication or response failure
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<GatewayResponse, GatewayError>;

    /// Identifier of the model behind this gateway.
    fn model_id(&self) -> &str;
}

// ============================================================================
// GATEWAY REGISTRY
// ============================================================================

/// Named gateway handles that agent specs refer to.
/// Gateways must be explicitly registered - no auto-discovery.
///
/// # Example
/// ```ignore
/// let mut registry = GatewayRegistry::new();
/// registry.register("azure", Arc::new(my_gateway));
/// let gateway = registry.resolve("Manager", "azure")?;
/// ```
#[derive(Clone, Default)]
pub struct GatewayRegistry {
    gateways: BTreeMap<String, Arc<dyn ModelGateway>>,
}

impl GatewayRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a gateway under `name`.
    /// Replaces any gateway previously registered under that name.
    pub fn register(&mut self, name: impl Into<String>, gateway: Arc<dyn ModelGateway>) {
        let name = name.into();
        tracing::debug!(gateway = %name, model = gateway.model_id(), "Registered gateway");
        self.gateways.insert(name, gateway);
    }

    /// Builder-style variant of [`GatewayRegistry::register`].
    pub fn with(mut self, name: impl Into<String>, gateway: Arc<dyn ModelGateway>) -> Self {
        self.register(name, gateway);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ModelGateway>> {
        self.gateways.get(name).cloned()
    }

    /// Look up the gateway an agent refers to.
    ///
    /// # Returns
    /// * `Ok(Arc<dyn ModelGateway>)` - The registered gateway
    /// * `Err(ConfigError::UnknownReference)` - If nothing is registered under `name`
    pub fn resolve(&self, agent: &str, name: &str) -> Result<Arc<dyn ModelGateway>, ConfigError> {
        self.get(name).ok_or_else(|| ConfigError::UnknownReference {
            kind: "gateway".to_string(),
            agent: agent.to_string(),
            name: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.gateways.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.gateways.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.gateways.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gateways.is_empty()
    }
}

impl std::fmt::Debug for GatewayRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.gateways.iter().map(|(k, v)| (k, v.model_id())))
            .finish()
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
