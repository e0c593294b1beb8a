//! Issue model: a typed problem report produced by an analyzer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of an issue as reported by an analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl IssueSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }

    /// Whether this severity indicates a fault rather than an observation.
    pub fn is_actionable(&self) -> bool {
        matches!(self, Self::Error | Self::Critical)
    }
}

impl std::fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A problem report produced by an external analyzer during a cycle.
///
/// Issues are immutable: they are consumed once by the strategy resolver and
/// then discarded. Nothing in this subsystem persists them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Identifier of the analyzer that produced this issue.
    pub analyzer_id: String,
    /// Analyzer-scoped identifier for the kind of problem found.
    pub issue_id: String,
    pub severity: IssueSeverity,
    pub description: String,
    /// Free-form structured payload for strategy consumption.
    #[serde(default)]
    pub data: HashMap<String, Value>,
}

impl Issue {
    /// Create an issue with an empty data payload.
    pub fn new(
        analyzer_id: impl Into<String>,
        issue_id: impl Into<String>,
        severity: IssueSeverity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            analyzer_id: analyzer_id.into(),
            issue_id: issue_id.into(),
            severity,
            description: description.into(),
            data: HashMap::new(),
        }
    }

    /// Attach a data entry (builder style).
    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}
