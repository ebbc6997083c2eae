//! Usage limits and the per-run usage ledger.
//!
//! Every governed action (a model call, the tokens it reports, a tool
//! invocation) is reserved against the ledger before it is allowed to
//! happen. A reservation that would push a counter strictly above its
//! ceiling fails without touching the counter.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ConfigError;

// ============================================================================
// DIMENSIONS
// ============================================================================

/// A governed usage dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageDimension {
    /// Model calls issued through the gateway
    Requests,
    /// Tokens reported by the gateway across the run
    ResponseTokens,
    /// Tool invocations, including retries
    ToolCalls,
}

impl UsageDimension {
    /// Name of the limit option for this dimension.
    pub fn limit_name(&self) -> &'static str {
        match self {
            Self::Requests => "request_limit",
            Self::ResponseTokens => "response_tokens_limit",
            Self::ToolCalls => "tool_calls_limit",
        }
    }

    /// Name of the counter for this dimension.
    pub fn counter_name(&self) -> &'static str {
        match self {
            Self::Requests => "requests",
            Self::ResponseTokens => "response_tokens",
            Self::ToolCalls => "tool_calls",
        }
    }
}

impl fmt::Display for UsageDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.counter_name())
    }
}

// ============================================================================
// LIMITS
// ============================================================================

/// Ceilings for a single run. `None` means unbounded for that dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UsageLimits {
    /// Maximum model calls per run
    #[serde(default)]
    pub request_limit: Option<u64>,
    /// Maximum cumulative response tokens across the run
    #[serde(default)]
    pub response_tokens_limit: Option<u64>,
    /// Maximum tool invocations across the run
    #[serde(default)]
    pub tool_calls_limit: Option<u64>,
}

impl UsageLimits {
    /// No ceilings on any dimension.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_request_limit(mut self, limit: u64) -> Self {
        self.request_limit = Some(limit);
        self
    }

    pub fn with_response_tokens_limit(mut self, limit: u64) -> Self {
        self.response_tokens_limit = Some(limit);
        self
    }

    pub fn with_tool_calls_limit(mut self, limit: u64) -> Self {
        self.tool_calls_limit = Some(limit);
        self
    }

    /// Ceiling for a dimension, if one is configured.
    pub fn limit_for(&self, dimension: UsageDimension) -> Option<u64> {
        match dimension {
            UsageDimension::Requests => self.request_limit,
            UsageDimension::ResponseTokens => self.response_tokens_limit,
            UsageDimension::ToolCalls => self.tool_calls_limit,
        }
    }

    /// Reject non-positive ceilings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for dimension in [
            UsageDimension::Requests,
            UsageDimension::ResponseTokens,
            UsageDimension::ToolCalls,
        ] {
            if self.limit_for(dimension) == Some(0) {
                return Err(ConfigError::InvalidValue {
                    field: format!("limits.{}", dimension.limit_name()),
                    value: "0".to_string(),
                    reason: "limit must be greater than 0".to_string(),
                });
            }
        }
        Ok(())
    }
}

// ============================================================================
// LIMIT EXCEEDED
// ============================================================================

/// A reservation that was refused. This is a governed stop, not a crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitExceeded {
    /// Which dimension would have been exceeded
    pub dimension: UsageDimension,
    /// The configured ceiling
    pub limit: u64,
    /// The counter value the reservation would have produced
    pub attempted: u64,
}

impl fmt::Display for LimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dimension {
            UsageDimension::Requests => write!(
                f,
                "The next request would exceed the request_limit of {} (requests={})",
                self.limit, self.attempted
            ),
            UsageDimension::ResponseTokens => write!(
                f,
                "Exceeded the response_tokens_limit of {} (response_tokens={})",
                self.limit, self.attempted
            ),
            UsageDimension::ToolCalls => write!(
                f,
                "The next tool call would exceed the tool_calls_limit of {} (tool_calls={})",
                self.limit, self.attempted
            ),
        }
    }
}

impl std::error::Error for LimitExceeded {}

// ============================================================================
// LEDGER
// ============================================================================

/// Point-in-time copy of the ledger counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub requests: u64,
    pub response_tokens: u64,
    pub tool_calls: u64,
}

impl fmt::Display for UsageSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Usage(requests={}, response_tokens={}, tool_calls={})",
            self.requests, self.response_tokens, self.tool_calls
        )
    }
}

/// Running counters for one run, checked before each governed action.
///
/// Owned exclusively by the run that created it. Turns are sequential, so the
/// check and the increment in [`UsageLedger::check_and_reserve`] never race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageLedger {
    limits: UsageLimits,
    requests_issued: u64,
    tokens_consumed: u64,
    tool_calls_executed: u64,
    exceeded: Option<LimitExceeded>,
}

impl UsageLedger {
    /// Create a ledger with all counters at zero.
    pub fn new(limits: UsageLimits) -> Self {
        Self {
            limits,
            requests_issued: 0,
            tokens_consumed: 0,
            tool_calls_executed: 0,
            exceeded: None,
        }
    }

    pub fn limits(&self) -> &UsageLimits {
        &self.limits
    }

    /// Reserve `amount` units of `dimension`.
    ///
    /// On success the counter is incremented before returning. On failure the
    /// counter is left untouched and the refusal is remembered for
    /// [`UsageLedger::has_exceeded`].
    pub fn check_and_reserve(
        &mut self,
        dimension: UsageDimension,
        amount: u64,
    ) -> Result<(), LimitExceeded> {
        let current = self.counter(dimension);
        let attempted = current.saturating_add(amount);

        if let Some(limit) = self.limits.limit_for(dimension) {
            if attempted > limit {
                let exceeded = LimitExceeded {
                    dimension,
                    limit,
                    attempted,
                };
                if self.exceeded.is_none() {
                    self.exceeded = Some(exceeded);
                }
                return Err(exceeded);
            }
        }

        *self.counter_mut(dimension) = attempted;
        Ok(())
    }

    /// Current value of a counter.
    pub fn counter(&self, dimension: UsageDimension) -> u64 {
        match dimension {
            UsageDimension::Requests => self.requests_issued,
            UsageDimension::ResponseTokens => self.tokens_consumed,
            UsageDimension::ToolCalls => self.tool_calls_executed,
        }
    }

    fn counter_mut(&mut self, dimension: UsageDimension) -> &mut u64 {
        match dimension {
            UsageDimension::Requests => &mut self.requests_issued,
            UsageDimension::ResponseTokens => &mut self.tokens_consumed,
            UsageDimension::ToolCalls => &mut self.tool_calls_executed,
        }
    }

    pub fn requests_issued(&self) -> u64 {
        self.requests_issued
    }

    pub fn tokens_consumed(&self) -> u64 {
        self.tokens_consumed
    }

    pub fn tool_calls_executed(&self) -> u64 {
        self.tool_calls_executed
    }

    /// Whether any reservation in this run has been refused.
    pub fn has_exceeded(&self) -> bool {
        self.exceeded.is_some()
    }

    /// The first refused reservation, if any.
    pub fn first_exceeded(&self) -> Option<&LimitExceeded> {
        self.exceeded.as_ref()
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            requests: self.requests_issued,
            response_tokens: self.tokens_consumed,
            tool_calls: self.tool_calls_executed,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================


// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
