//! Review verdict types.
//!
//! ## Types
//!
//! - [`Severity`]: severity/priority of one finding
//! - [`RiskLevel`]: aggregate risk from a security review
//! - [`QualityTier`]: aggregate tier from a quality review
//! - [`ReviewFinding`]: one issue with location and recommendation
//! - [`ReviewVerdict`]: the parsed (or degraded) outcome of one review
//!
//! ## Example
//!
//! ```
//! use shipgate::review::findings::{ReviewFinding, ReviewVerdict, RiskLevel, Severity};
//!
//! let finding = ReviewFinding::new(Severity::High, "Token compared with ==")
//!     .with_file("src/auth.rs")
//!     .with_symbol("verify_token")
//!     .with_recommendation("Use a constant-time comparison");
//!
//! let verdict = ReviewVerdict::security(RiskLevel::Medium, "One timing issue")
//!     .add_finding(finding);
//!
//! assert!(verdict.passes());
//! assert_eq!(verdict.findings.len(), 1);
//! ```

use super::parser::ParseStrategy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of one finding.
///
/// Variants are declared from most to least severe, so `Critical < Low` in
/// `Ord`; sort ascending to list the worst first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Critical and high findings share the top band.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::Critical | Self::High)
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Critical => "🔴",
            Self::High => "🟠",
            Self::Medium => "🟡",
            Self::Low => "🔵",
        }
    }

    pub fn all() -> [Severity; 4] {
        [Self::Critical, Self::High, Self::Medium, Self::Low]
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_label(s).as_str() {
            "CRITICAL" => Ok(Self::Critical),
            "HIGH" => Ok(Self::High),
            "MEDIUM" | "MODERATE" => Ok(Self::Medium),
            "LOW" | "INFO" => Ok(Self::Low),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

/// Aggregate risk reported by a security review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// LOW and MEDIUM are within the release threshold.
    pub fn is_acceptable(&self) -> bool {
        matches!(self, Self::Low | Self::Medium)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_label(s).as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" | "MODERATE" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "CRITICAL" => Ok(Self::Critical),
            other => Err(format!("unknown risk level '{}'", other)),
        }
    }
}

/// Aggregate tier reported by a quality review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityTier {
    Excellent,
    Good,
    Acceptable,
    NeedsWork,
}

impl QualityTier {
    /// Everything above NEEDS_WORK is within the release threshold.
    pub fn is_acceptable(&self) -> bool {
        !matches!(self, Self::NeedsWork)
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Excellent => "EXCELLENT",
            Self::Good => "GOOD",
            Self::Acceptable => "ACCEPTABLE",
            Self::NeedsWork => "NEEDS_WORK",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for QualityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_label(s).as_str() {
            "EXCELLENT" => Ok(Self::Excellent),
            "GOOD" => Ok(Self::Good),
            "ACCEPTABLE" => Ok(Self::Acceptable),
            "NEEDS_WORK" | "NEEDSWORK" | "POOR" => Ok(Self::NeedsWork),
            other => Err(format!("unknown quality tier '{}'", other)),
        }
    }
}

/// Uppercase and fold spaces/dashes to underscores: "needs work" -> "NEEDS_WORK".
fn normalize_label(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

/// Which review prompt produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewKind {
    Security,
    Quality,
}

impl fmt::Display for ReviewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Security => write!(f, "security"),
            Self::Quality => write!(f, "quality"),
        }
    }
}

/// A single finding from a review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewFinding {
    severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    /// Function, type or other symbol the finding points at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    symbol: Option<String>,
    description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    recommendation: Option<String>,
}

impl ReviewFinding {
    pub fn new(severity: Severity, description: impl Into<String>) -> Self {
        Self {
            severity,
            file: None,
            symbol: None,
            description: description.into(),
            recommendation: None,
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }

    /// `file::symbol`, `file`, `symbol` or `(unspecified)`.
    ///
    /// ```
    /// use shipgate::review::findings::{ReviewFinding, Severity};
    ///
    /// let finding = ReviewFinding::new(Severity::Low, "Unused import")
    ///     .with_file("src/lib.rs")
    ///     .with_symbol("helpers");
    /// assert_eq!(finding.location(), "src/lib.rs::helpers");
    /// ```
    pub fn location(&self) -> String {
        match (&self.file, &self.symbol) {
            (Some(file), Some(symbol)) => format!("{}::{}", file, symbol),
            (Some(file), None) => file.clone(),
            (None, Some(symbol)) => symbol.clone(),
            (None, None) => "(unspecified)".to_string(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn recommendation(&self) -> Option<&str> {
        self.recommendation.as_deref()
    }
}

impl fmt::Display for ReviewFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}: {}",
            self.severity.emoji(),
            self.severity,
            self.location(),
            self.description
        )?;
        if let Some(ref rec) = self.recommendation {
            write!(f, " (recommendation: {})", rec)?;
        }
        Ok(())
    }
}

/// Outcome of one review run.
///
/// `raw = true` means structured extraction failed: the summary holds the
/// model's free-form text and the verdict is inconclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewVerdict {
    pub kind: ReviewKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityTier>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub findings: Vec<ReviewFinding>,
    #[serde(default)]
    pub raw: bool,
    /// Which extraction strategy matched; `None` for raw verdicts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<ParseStrategy>,
}

impl ReviewVerdict {
    pub fn security(risk: RiskLevel, summary: impl Into<String>) -> Self {
        Self {
            kind: ReviewKind::Security,
            risk_level: Some(risk),
            quality: None,
            summary: summary.into(),
            findings: Vec::new(),
            raw: false,
            strategy: None,
        }
    }

    pub fn quality(tier: QualityTier, summary: impl Into<String>) -> Self {
        Self {
            kind: ReviewKind::Quality,
            risk_level: None,
            quality: Some(tier),
            summary: summary.into(),
            findings: Vec::new(),
            raw: false,
            strategy: None,
        }
    }

    /// Degraded verdict carrying the unparseable response text.
    pub fn raw(kind: ReviewKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            risk_level: None,
            quality: None,
            summary: text.into(),
            findings: Vec::new(),
            raw: true,
            strategy: None,
        }
    }

    pub fn add_finding(mut self, finding: ReviewFinding) -> Self {
        self.findings.push(finding);
        self
    }

    pub fn add_findings(mut self, findings: impl IntoIterator<Item = ReviewFinding>) -> Self {
        self.findings.extend(findings);
        self
    }

    /// No usable tier: either extraction failed or the document omitted it.
    pub fn is_inconclusive(&self) -> bool {
        self.raw
            || match self.kind {
                ReviewKind::Security => self.risk_level.is_none(),
                ReviewKind::Quality => self.quality.is_none(),
            }
    }

    /// Structured and within the acceptable threshold for its kind.
    pub fn passes(&self) -> bool {
        if self.raw {
            return false;
        }
        match self.kind {
            ReviewKind::Security => self.risk_level.is_some_and(|r| r.is_acceptable()),
            ReviewKind::Quality => self.quality.is_some_and(|q| q.is_acceptable()),
        }
    }

    /// The tier as printed in summaries, `UNKNOWN` when inconclusive.
    pub fn tier_label(&self) -> String {
        match self.kind {
            ReviewKind::Security => self.risk_level.map(|r| r.to_string()),
            ReviewKind::Quality => self.quality.map(|q| q.to_string()),
        }
        .unwrap_or_else(|| "UNKNOWN".to_string())
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }

    /// Findings ordered worst first; ties keep response order.
    pub fn sorted_findings(&self) -> Vec<&ReviewFinding> {
        let mut sorted: Vec<&ReviewFinding> = self.findings.iter().collect();
        sorted.sort_by_key(|f| f.severity);
        sorted
    }
}

impl fmt::Display for ReviewVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = if self.raw {
            "INCONCLUSIVE".to_string()
        } else {
            self.tier_label()
        };
        writeln!(f, "{} review: {}", self.kind, label)?;
        if !self.summary.is_empty() && !self.raw {
            writeln!(f, "  Summary: {}", self.summary)?;
        }
        if !self.findings.is_empty() {
            writeln!(f, "  Findings ({}):", self.findings.len())?;
            for finding in self.sorted_findings() {
                writeln!(f, "    {}", finding)?;
            }
        }
        Ok(())
    }
}
