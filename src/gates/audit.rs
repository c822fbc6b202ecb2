//! Dependency-audit classification.
//!
//! The structured report from the audit tool is authoritative when it can be
//! parsed (`npm audit --json`, `cargo audit --json`): the gate fails iff it
//! lists any high or critical vulnerability, whatever the exit status.
//! Without a structured report the exit status decides. A word match for
//! "high"/"critical" in the text is kept as a low-confidence note only.

use super::GateResult;
use super::runner::CommandOutput;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

/// What decided the audit verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditBasis {
    /// The tool's machine-readable report.
    Structured,
    /// The command's exit status.
    ExitStatus,
}

/// Vulnerability counts by severity from a structured report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: u64,
    pub high: u64,
    pub moderate: u64,
    pub low: u64,
}

impl SeverityCounts {
    pub fn severe(&self) -> u64 {
        self.critical + self.high
    }
}

/// Classification details stored with the audit gate result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSummary {
    pub basis: AuditBasis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counts: Option<SeverityCounts>,
    /// Low-confidence text match, only present when no structured report was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_heuristic_severe: Option<bool>,
}

/// A parsed structured audit report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredReport {
    pub tool: &'static str,
    pub counts: SeverityCounts,
}

/// Classify captured audit output into a gate result.
pub fn classify_audit(output: &CommandOutput) -> GateResult {
    if let Some(report) = parse_structured(&output.stdout) {
        let summary = AuditSummary {
            basis: AuditBasis::Structured,
            tool: Some(report.tool.to_string()),
            counts: Some(report.counts),
            text_heuristic_severe: None,
        };
        let mut result = if report.counts.severe() == 0 {
            GateResult::passed()
        } else {
            GateResult::failed(format!(
                "{} critical and {} high severity vulnerabilities",
                report.counts.critical, report.counts.high
            ))
        };
        result.audit = Some(summary);
        return result;
    }

    let combined = format!("{}\n{}", output.stdout, output.stderr);
    let summary = AuditSummary {
        basis: AuditBasis::ExitStatus,
        tool: None,
        counts: None,
        text_heuristic_severe: Some(mentions_severe(&combined)),
    };
    let mut result = if output.success {
        GateResult::passed()
    } else {
        GateResult::failed(format!(
            "audit exited with code {} and produced no structured report",
            output
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        ))
    };
    result.audit = Some(summary);
    result
}

/// Try each known report format against the tool's stdout.
pub fn parse_structured(stdout: &str) -> Option<StructuredReport> {
    let value: Value = serde_json::from_str(stdout.trim()).ok()?;
    parse_npm(&value).or_else(|| parse_cargo_audit(&value))
}

/// `npm audit --json` (v6 and v7+ share `metadata.vulnerabilities`).
fn parse_npm(value: &Value) -> Option<StructuredReport> {
    let vulns = value.get("metadata")?.get("vulnerabilities")?;
    let count = |key: &str| vulns.get(key).and_then(Value::as_u64).unwrap_or(0);
    Some(StructuredReport {
        tool: "npm-audit",
        counts: SeverityCounts {
            critical: count("critical"),
            high: count("high"),
            moderate: count("moderate"),
            low: count("low"),
        },
    })
}

/// `cargo audit --json`. RustSec vulnerabilities carry no uniform severity,
/// so every listed vulnerability counts as high; warnings are ignored.
fn parse_cargo_audit(value: &Value) -> Option<StructuredReport> {
    let vulns = value.get("vulnerabilities")?;
    let count = vulns
        .get("count")
        .and_then(Value::as_u64)
        .or_else(|| {
            vulns
                .get("list")
                .and_then(Value::as_array)
                .map(|l| l.len() as u64)
        })?;
    Some(StructuredReport {
        tool: "cargo-audit",
        counts: SeverityCounts {
            high: count,
            ..SeverityCounts::default()
        },
    })
}

fn mentions_severe(text: &str) -> bool {
    static SEVERE: OnceLock<Option<Regex>> = OnceLock::new();
    SEVERE
        .get_or_init(|| Regex::new(r"(?i)\b(high|critical)\b").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(text))
}
