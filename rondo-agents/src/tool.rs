//! Tool registry
//!
//! Tools are registered up front under unique names and dispatched by name.
//! A tool reports one of three explicit outcomes; asking for a retry is a
//! value, not an unwinding error.

use async_trait::async_trait;
use rondo_core::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

// ============================================================================
// TOOL OUTCOME
// ============================================================================

/// What a single tool invocation produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "text", rename_all = "snake_case")]
pub enum ToolOutcome {
    /// The tool succeeded
    Output(String),
    /// The tool asks to be invoked again
    RetryRequested(String),
    /// The tool failed and should not be retried
    Failed(String),
}

impl ToolOutcome {
    pub fn output(text: impl Into<String>) -> Self {
        Self::Output(text.into())
    }

    pub fn retry(reason: impl Into<String>) -> Self {
        Self::RetryRequested(reason.into())
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

// ============================================================================
// TOOL TRAIT
// ============================================================================

/// A callable tool. Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Tool: Send + Sync {
    async fn call(&self, args: &serde_json::Value) -> ToolOutcome;
}

/// Adapter for plain synchronous functions.
pub struct FnTool<F> {
    f: F,
}

impl<F> FnTool<F>
where
    F: Fn(&serde_json::Value) -> ToolOutcome + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> Tool for FnTool<F>
where
    F: Fn(&serde_json::Value) -> ToolOutcome + Send + Sync,
{
    async fn call(&self, args: &serde_json::Value) -> ToolOutcome {
        (self.f)(args)
    }
}

// ============================================================================
// TOOL DESCRIPTOR
// ============================================================================

/// A registered tool and its retry budget.
#[derive(Clone)]
pub struct ToolDescriptor {
    name: String,
    description: String,
    max_retries: u32,
    callable: Arc<dyn Tool>,
}

impl ToolDescriptor {
    /// Create a descriptor with no automatic retries.
    pub fn new(name: impl Into<String>, callable: Arc<dyn Tool>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            max_retries: 0,
            callable,
        }
    }

    /// Create a descriptor from a synchronous function.
    pub fn from_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&serde_json::Value) -> ToolOutcome + Send + Sync + 'static,
    {
        Self::new(name, Arc::new(FnTool::new(f)))
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Invoke the tool once.
    pub async fn invoke(&self, args: &serde_json::Value) -> ToolOutcome {
        self.callable.call(args).await
    }
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

// ============================================================================
// TOOL REGISTRY
// ============================================================================

/// Tools available to a team, keyed by unique name.
///
/// The registry holds no per-run state and may be shared between concurrent
/// runs; retry counters live in [`ToolRetryState`].
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Names must be unique.
    pub fn register(&mut self, descriptor: ToolDescriptor) -> Result<(), ConfigError> {
        if self.tools.contains_key(descriptor.name()) {
            return Err(ConfigError::Duplicate {
                field: "tool name".to_string(),
                name: descriptor.name().to_string(),
            });
        }
        self.tools.insert(descriptor.name().to_string(), descriptor);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Invoke a tool by name. Unknown names fail without invoking anything.
    pub async fn invoke(&self, name: &str, args: &serde_json::Value) -> ToolOutcome {
        match self.get(name) {
            Some(descriptor) => descriptor.invoke(args).await,
            None => ToolOutcome::failed(format!("Unknown tool: {}", name)),
        }
    }
}

// ============================================================================
// RETRY STATE
// ============================================================================

/// Retries consumed per tool during one run. Starts empty for every run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolRetryState {
    used: HashMap<String, u32>,
}

impl ToolRetryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retries consumed so far for `tool`.
    pub fn retries_used(&self, tool: &str) -> u32 {
        self.used.get(tool).copied().unwrap_or(0)
    }

    /// Consume one retry for `descriptor` if its budget allows.
    pub fn try_consume(&mut self, descriptor: &ToolDescriptor) -> bool {
        let used = self.used.entry(descriptor.name().to_string()).or_insert(0);
        if *used < descriptor.max_retries() {
            *used += 1;
            true
        } else {
            false
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
