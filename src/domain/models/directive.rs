//! Directive model: a prioritized, routable remediation request.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Priority of a remediation directive.
///
/// Always set explicitly by the producing strategy; there is no global
/// default, so this type deliberately does not implement `Default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectivePriority {
    Low,
    Normal,
    High,
    Critical,
}

impl DirectivePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Multiplier applied to trail deposits for outcomes at this priority.
    ///
    /// Critical successes reinforce a route more strongly than low-priority
    /// ones; the same scaling applies to failure penalties.
    pub fn reinforcement_scale(&self) -> f64 {
        match self {
            Self::Low => 0.5,
            Self::Normal => 1.0,
            Self::High => 1.5,
            Self::Critical => 2.0,
        }
    }
}

impl std::fmt::Display for DirectivePriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A remediation request produced by the strategy resolver and consumed by
/// the dispatcher.
///
/// Multiple issues may legitimately produce directives with the same
/// `directive_type` within one cycle; deduplication belongs to the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Directive {
    /// Opaque action type matched against executor capabilities.
    pub directive_type: String,
    /// Free-form parameters for the executor.
    #[serde(default)]
    pub payload: HashMap<String, Value>,
    pub priority: DirectivePriority,
    /// Names of eligible executor sinks, in preference order.
    pub target_agents: Vec<String>,
}

impl Directive {
    /// Create a directive with an empty payload.
    pub fn new(
        directive_type: impl Into<String>,
        priority: DirectivePriority,
        target_agents: Vec<String>,
    ) -> Self {
        Self {
            directive_type: directive_type.into(),
            payload: HashMap::new(),
            priority,
            target_agents,
        }
    }

    /// Attach a payload entry (builder style).
    pub fn with_payload(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }
}
