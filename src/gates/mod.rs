//! Quality gates: external commands classified as passed, failed or skipped.
//!
//! - [`runner`]: executes a gate command and captures its output
//! - [`audit`]: classifies dependency-audit output (structured report or exit status)

pub mod audit;
pub mod runner;

pub use audit::{AuditBasis, AuditSummary};
pub use runner::{GateCommand, GateRunner};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome class of one gate invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateStatus {
    Passed,
    Failed,
    Skipped,
}

impl GateStatus {
    /// Skipped gates do not count against the aggregate.
    pub fn is_acceptable(&self) -> bool {
        matches!(self, Self::Passed | Self::Skipped)
    }
}

impl fmt::Display for GateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        write!(f, "{}", s)
    }
}

/// Result of a single gate invocation. Produced once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateResult {
    pub status: GateStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    /// Why the gate was skipped, or the invocation error for a failed gate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit: Option<AuditSummary>,
}

impl GateResult {
    fn with_status(status: GateStatus) -> Self {
        Self {
            status,
            command: None,
            exit_code: None,
            stdout: None,
            stderr: None,
            reason: None,
            duration_ms: None,
            audit: None,
        }
    }

    pub fn passed() -> Self {
        Self::with_status(GateStatus::Passed)
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::with_status(GateStatus::Failed)
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::with_status(GateStatus::Skipped)
        }
    }

    pub fn is_passed(&self) -> bool {
        self.status == GateStatus::Passed
    }

    pub fn is_failed(&self) -> bool {
        self.status == GateStatus::Failed
    }

    pub fn is_skipped(&self) -> bool {
        self.status == GateStatus::Skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_status_acceptable() {
        assert!(GateStatus::Passed.is_acceptable());
        assert!(GateStatus::Skipped.is_acceptable());
        assert!(!GateStatus::Failed.is_acceptable());
    }

    #[test]
    fn test_gate_status_serialization() {
        assert_eq!(
            serde_json::to_string(&GateStatus::Skipped).unwrap(),
            "\"skipped\""
        );
        let parsed: GateStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(parsed, GateStatus::Failed);
    }

    #[test]
    fn test_skipped_result_carries_reason() {
        let result = GateResult::skipped("no test command configured");
        assert!(result.is_skipped());
        assert_eq!(result.reason.as_deref(), Some("no test command configured"));
    }

    #[test]
    fn test_gate_result_omits_empty_fields() {
        let json = serde_json::to_value(GateResult::passed()).unwrap();
        assert_eq!(json, serde_json::json!({"status": "passed"}));
    }

    #[test]
    fn test_gate_result_camel_case_fields() {
        let result = GateResult {
            exit_code: Some(1),
            duration_ms: Some(12),
            ..GateResult::failed("boom")
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["exitCode"], 1);
        assert_eq!(json["durationMs"], 12);
    }
}
