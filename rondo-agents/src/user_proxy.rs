//! Human-in-the-loop participant.

use crate::agent::{Agent, TurnContext, TurnError};
use crate::tool::ToolRegistry;
use async_trait::async_trait;
use rondo_core::{AgentSpec, ConfigError, GatewayError, ParticipantKind};
use rondo_llm::GatewayRegistry;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Where a user proxy reads its messages from.
#[async_trait]
pub trait InputSource: Send + Sync {
    /// Read one message. `prompt` names the participant asking.
    async fn read_message(&self, prompt: &str) -> io::Result<String>;
}

/// Input source that replays canned lines, for tests and demos.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    lines: Mutex<VecDeque<String>>,
}

impl ScriptedInput {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: Mutex::new(lines.into_iter().map(Into::into).collect()),
        }
    }

    pub fn remaining(&self) -> usize {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl InputSource for ScriptedInput {
    async fn read_message(&self, _prompt: &str) -> io::Result<String> {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no scripted input left"))
    }
}

/// A participant whose message comes from a human instead of a model.
///
/// User proxies make no gateway calls and reserve nothing from the ledger.
#[derive(Clone)]
pub struct UserProxy {
    name: String,
    input: Arc<dyn InputSource>,
}

impl UserProxy {
    pub fn new(name: impl Into<String>, input: Arc<dyn InputSource>) -> Self {
        Self {
            name: name.into(),
            input,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read the next message. A failed read ends the run like a gateway
    /// failure would.
    pub async fn take_turn(&self, ctx: &mut TurnContext<'_>) -> Result<String, TurnError> {
        ctx.guard.check()?;
        debug!(participant = %self.name, "Waiting for user input");
        let line = ctx
            .guard
            .race(self.input.read_message(&self.name))
            .await?
            .map_err(|e| GatewayError::Transport {
                provider: "user_proxy".to_string(),
                reason: e.to_string(),
            })?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl std::fmt::Debug for UserProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserProxy").field("name", &self.name).finish()
    }
}

// ============================================================================
// PARTICIPANT
// ============================================================================

/// A member of a round-robin team.
#[derive(Debug, Clone)]
pub enum Participant {
    Assistant(Agent),
    UserProxy(UserProxy),
}

impl Participant {
    /// Build a participant from its spec.
    ///
    /// User proxies require `input`; assistants require their gateway and
    /// every bound tool to be registered.
    pub fn from_spec(
        spec: &AgentSpec,
        gateways: &GatewayRegistry,
        tools: &ToolRegistry,
        input: Option<&Arc<dyn InputSource>>,
    ) -> Result<Self, ConfigError> {
        match spec.kind {
            ParticipantKind::Assistant => Ok(Self::Assistant(Agent::from_spec(spec, gateways, tools)?)),
            ParticipantKind::UserProxy => {
                let input = input.ok_or_else(|| ConfigError::MissingRequired {
                    field: format!("input source for user proxy {}", spec.name),
                })?;
                Ok(Self::UserProxy(UserProxy::new(spec.name.clone(), input.clone())))
            }
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Assistant(agent) => agent.name(),
            Self::UserProxy(proxy) => proxy.name(),
        }
    }

    pub async fn take_turn(&self, ctx: &mut TurnContext<'_>) -> Result<String, TurnError> {
        match self {
            Self::Assistant(agent) => agent.take_turn(ctx).await,
            Self::UserProxy(proxy) => proxy.take_turn(ctx).await,
        }
    }
}
