//! Extraction of a structured verdict from free-form model text.
//!
//! Strategies are tried strictly in [`STRATEGY_ORDER`]; the first match wins:
//!
//! 1. [`ParseStrategy::WholeDocument`]: the trimmed response is the document
//! 2. [`ParseStrategy::FencedBlock`]: the interior of a (optionally
//!    language-tagged) fenced block is the document
//! 3. [`ParseStrategy::BraceScan`]: the balanced object starting at the first
//!    `{`, with braces inside string literals ignored
//!
//! When none match, the verdict degrades to `raw = true` carrying the text.

use super::findings::{QualityTier, ReviewFinding, ReviewKind, ReviewVerdict, RiskLevel, Severity};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::debug;

/// Keys that identify a review document; an object with none of them is not one.
const DOCUMENT_KEYS: &[&str] = &[
    "riskLevel",
    "risk_level",
    "risk",
    "quality",
    "codeQuality",
    "code_quality",
    "summary",
    "findings",
    "issues",
];

/// A named extraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStrategy {
    WholeDocument,
    FencedBlock,
    BraceScan,
}

/// The order in which strategies are attempted.
pub const STRATEGY_ORDER: [ParseStrategy; 3] = [
    ParseStrategy::WholeDocument,
    ParseStrategy::FencedBlock,
    ParseStrategy::BraceScan,
];

/// Result of applying one strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyOutcome {
    Matched(Map<String, Value>),
    NoMatch,
}

impl StrategyOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched(_))
    }
}

impl ParseStrategy {
    pub fn apply(&self, text: &str) -> StrategyOutcome {
        let candidate = match self {
            Self::WholeDocument => as_document(text.trim()),
            Self::FencedBlock => fenced_blocks(text)
                .into_iter()
                .find_map(|body| as_document(body.trim())),
            Self::BraceScan => scan_balanced_object(text).and_then(as_document),
        };
        match candidate {
            Some(doc) => StrategyOutcome::Matched(doc),
            None => StrategyOutcome::NoMatch,
        }
    }
}

impl fmt::Display for ParseStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::WholeDocument => "whole_document",
            Self::FencedBlock => "fenced_block",
            Self::BraceScan => "brace_scan",
        };
        write!(f, "{}", s)
    }
}

/// Convert a model response into a verdict. Never fails.
pub fn parse_review(kind: ReviewKind, text: &str) -> ReviewVerdict {
    for strategy in STRATEGY_ORDER {
        if let StrategyOutcome::Matched(doc) = strategy.apply(text) {
            debug!(%kind, %strategy, "review response parsed");
            let mut verdict = verdict_from_document(kind, &doc);
            verdict.strategy = Some(strategy);
            return verdict;
        }
    }
    debug!(%kind, "no strategy matched, falling back to raw text");
    ReviewVerdict::raw(kind, text.trim())
}

fn as_document(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate).ok()? {
        Value::Object(map) if DOCUMENT_KEYS.iter().any(|k| map.contains_key(*k)) => Some(map),
        _ => None,
    }
}

/// Interiors of every fenced block, in order of appearance.
///
/// A language tag is recognised only when the opening fence is followed by a
/// bare word and a newline.
pub fn fenced_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after = &rest[open + 3..];
        let body_start = match after.find('\n') {
            Some(nl)
                if after[..nl]
                    .trim()
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '+') =>
            {
                nl + 1
            }
            _ => 0,
        };
        let body = &after[body_start..];
        let Some(close) = body.find("```") else {
            break;
        };
        blocks.push(&body[..close]);
        rest = &body[close + 3..];
    }
    blocks
}

/// The balanced `{...}` substring beginning at the first opening brace.
///
/// Depth is tracked character by character; braces inside string literals
/// (with backslash escapes) do not count, so an inner `}` in a value cannot
/// end the object early.
pub fn scan_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn verdict_from_document(kind: ReviewKind, doc: &Map<String, Value>) -> ReviewVerdict {
    let summary = str_field(doc, &["summary", "overview"]).unwrap_or_default();
    let mut verdict = match kind {
        ReviewKind::Security => {
            let risk = str_field(doc, &["riskLevel", "risk_level", "risk", "overallRisk"])
                .and_then(|s| s.parse::<RiskLevel>().ok());
            let mut v = ReviewVerdict::security(RiskLevel::Low, summary);
            v.risk_level = risk;
            v
        }
        ReviewKind::Quality => {
            let tier = str_field(doc, &["quality", "codeQuality", "code_quality", "overallQuality"])
                .and_then(|s| s.parse::<QualityTier>().ok());
            let mut v = ReviewVerdict::quality(QualityTier::Good, summary);
            v.quality = tier;
            v
        }
    };

    let findings = ["findings", "issues"]
        .iter()
        .find_map(|k| doc.get(*k).and_then(Value::as_array))
        .map(|items| items.iter().filter_map(parse_finding).collect::<Vec<_>>())
        .unwrap_or_default();
    verdict.findings = findings;
    verdict
}

/// Parse one finding; entries without a description are dropped.
fn parse_finding(value: &Value) -> Option<ReviewFinding> {
    let obj = value.as_object()?;
    let description = str_field(obj, &["description", "issue", "title", "message"])?;
    let severity = str_field(obj, &["severity", "priority"])
        .and_then(|s| s.parse::<Severity>().ok())
        .unwrap_or(Severity::Medium);

    let mut finding = ReviewFinding::new(severity, description);

    let (mut file, mut symbol) = (
        str_field(obj, &["file", "path"]),
        str_field(obj, &["symbol", "function", "method"]),
    );
    match obj.get("location") {
        Some(Value::String(loc)) if file.is_none() => file = Some(loc.clone()),
        Some(Value::Object(loc)) => {
            file = file.or_else(|| str_field(loc, &["file", "path"]));
            symbol = symbol.or_else(|| str_field(loc, &["symbol", "function", "method"]));
        }
        _ => {}
    }
    if let Some(file) = file {
        finding = finding.with_file(file);
    }
    if let Some(symbol) = symbol {
        finding = finding.with_symbol(symbol);
    }
    if let Some(rec) = str_field(obj, &["recommendation", "suggestion", "fix"]) {
        finding = finding.with_recommendation(rec);
    }
    Some(finding)
}

fn str_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::to_string)
}
