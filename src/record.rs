//! Persisted verification artifacts.
//!
//! [`VerificationRecord`] is the only state shared between `verify` and
//! `ship`. It is written atomically (temp file in the same directory, then
//! rename) so a reader never observes a partially written snapshot.

use crate::errors::{ReviewError, ShipError};
use crate::gates::{GateResult, GateStatus};
use crate::hasher::FileSnapshot;
use crate::review::findings::{ReviewVerdict, Severity};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Version written into every record; other versions are rejected on load.
pub const RECORD_VERSION: u32 = 1;

/// `files` section: the snapshot plus its size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilesSection {
    pub count: usize,
    #[serde(flatten)]
    pub snapshot: FileSnapshot,
}

impl From<FileSnapshot> for FilesSection {
    fn from(snapshot: FileSnapshot) -> Self {
        Self {
            count: snapshot.len(),
            snapshot,
        }
    }
}

/// A reviewer failure as stored in the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewFailure {
    /// `timeout`, `transport`, `api` or `malformed_response`.
    pub kind: String,
    pub message: String,
    pub retryable: bool,
}

impl From<&ReviewError> for ReviewFailure {
    fn from(err: &ReviewError) -> Self {
        let kind = match err {
            ReviewError::Timeout { .. } => "timeout",
            ReviewError::Transport(_) => "transport",
            ReviewError::Api { .. } => "api",
            ReviewError::MalformedResponse(_) => "malformed_response",
        };
        Self {
            kind: kind.to_string(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

/// The AI review gate: status plus whichever verdicts were produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewGate {
    pub status: GateStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<ReviewVerdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<ReviewVerdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_diff: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_reviewed: Option<usize>,
    /// Skip reason, or why the verdicts did not pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ReviewFailure>,
}

impl ReviewGate {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: GateStatus::Skipped,
            security: None,
            quality: None,
            model: None,
            used_diff: None,
            files_reviewed: None,
            reason: Some(reason.into()),
            error: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: GateStatus::Failed,
            ..Self::skipped(reason)
        }
    }

    /// A reviewer call failed outright. Never skipped.
    pub fn errored(err: &ReviewError) -> Self {
        Self {
            status: GateStatus::Failed,
            reason: Some(err.to_string()),
            error: Some(ReviewFailure::from(err)),
            ..Self::skipped(String::new())
        }
    }

    /// Gate from completed verdicts. Passes only when every verdict is
    /// structured and within the acceptable set.
    pub fn from_verdicts(security: ReviewVerdict, quality: Option<ReviewVerdict>) -> Self {
        let mut problems = Vec::new();
        for verdict in std::iter::once(&security).chain(quality.as_ref()) {
            if verdict.raw {
                problems.push(format!("{} review inconclusive (unstructured response)", verdict.kind));
            } else if !verdict.passes() {
                problems.push(format!("{} review {}", verdict.kind, verdict.tier_label()));
            }
        }
        let (status, reason) = if problems.is_empty() {
            (GateStatus::Passed, None)
        } else {
            (GateStatus::Failed, Some(problems.join("; ")))
        };
        Self {
            status,
            security: Some(security),
            quality,
            reason,
            ..Self::skipped(String::new())
        }
    }

    pub fn with_context(mut self, model: &str, used_diff: bool, files_reviewed: usize) -> Self {
        self.model = Some(model.to_string());
        self.used_diff = Some(used_diff);
        self.files_reviewed = Some(files_reviewed);
        self
    }

    pub fn verdicts(&self) -> impl Iterator<Item = &ReviewVerdict> {
        self.security.iter().chain(self.quality.iter())
    }
}

/// Derived pass/fail flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub tests_pass: bool,
    pub lint_pass: bool,
    pub audit_pass: bool,
    pub ai_review_pass: bool,
    pub overall_pass: bool,
}

impl Summary {
    pub fn aggregate(tests: &GateResult, lint: &GateResult, audit: &GateResult, review: &ReviewGate) -> Self {
        let tests_pass = tests.status.is_acceptable();
        let lint_pass = lint.status.is_acceptable();
        // An invoked audit is never skipped, so skipped here means opted out or undeclared.
        let audit_pass = audit.status.is_acceptable();
        let ai_review_pass = review.status.is_acceptable();
        Self {
            tests_pass,
            lint_pass,
            audit_pass,
            ai_review_pass,
            overall_pass: tests_pass && lint_pass && audit_pass && ai_review_pass,
        }
    }

    /// Names of the gates that did not pass.
    pub fn failed_gates(&self) -> Vec<String> {
        [
            ("tests", self.tests_pass),
            ("lint", self.lint_pass),
            ("audit", self.audit_pass),
            ("aiReview", self.ai_review_pass),
        ]
        .into_iter()
        .filter(|(_, pass)| !pass)
        .map(|(name, _)| name.to_string())
        .collect()
    }
}

/// The persisted outcome of one verify run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRecord {
    pub version: u32,
    pub timestamp: DateTime<Utc>,
    pub files: FilesSection,
    pub tests: GateResult,
    pub lint: GateResult,
    pub audit: GateResult,
    pub ai_review: ReviewGate,
    pub summary: Summary,
}

impl VerificationRecord {
    pub fn new(
        timestamp: DateTime<Utc>,
        snapshot: FileSnapshot,
        tests: GateResult,
        lint: GateResult,
        audit: GateResult,
        ai_review: ReviewGate,
    ) -> Self {
        let summary = Summary::aggregate(&tests, &lint, &audit, &ai_review);
        Self {
            version: RECORD_VERSION,
            timestamp,
            files: snapshot.into(),
            tests,
            lint,
            audit,
            ai_review,
            summary,
        }
    }

    pub fn snapshot(&self) -> &FileSnapshot {
        &self.files.snapshot
    }

    /// Summary recomputed from the stored gate results.
    pub fn recomputed_summary(&self) -> Summary {
        Summary::aggregate(&self.tests, &self.lint, &self.audit, &self.ai_review)
    }

    /// Overall pass as stored and as supported by the stored gate results.
    pub fn gates_passed(&self) -> bool {
        self.summary.overall_pass && self.recomputed_summary().overall_pass
    }

    /// Failed gates by either the stored or the recomputed summary.
    pub fn failed_gates(&self) -> Vec<String> {
        let mut failed = self.summary.failed_gates();
        for gate in self.recomputed_summary().failed_gates() {
            if !failed.contains(&gate) {
                failed.push(gate);
            }
        }
        if failed.is_empty() && !self.summary.overall_pass {
            failed.push("overall".to_string());
        }
        failed
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.timestamp)
    }

    /// Findings across both verdicts with the given severity.
    pub fn count_findings(&self, severity: Severity) -> usize {
        self.ai_review
            .verdicts()
            .map(|v| v.count_by_severity(severity))
            .sum()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)
    }

    /// Load a record, mapping absence and corruption to ship errors.
    pub fn load(path: &Path) -> Result<Self, ShipError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ShipError::RecordNotFound {
                    path: path.to_path_buf(),
                });
            }
            Err(e) => {
                return Err(ShipError::RecordUnreadable {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        };
        let record: Self = serde_json::from_str(&content).map_err(|e| ShipError::RecordUnreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if record.version != RECORD_VERSION {
            return Err(ShipError::RecordUnreadable {
                path: path.to_path_buf(),
                reason: format!(
                    "unsupported record version {} (expected {})",
                    record.version, RECORD_VERSION
                ),
            });
        }
        Ok(record)
    }
}

/// `summary` of a stand-alone review run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub security_risk: Option<String>,
    pub code_quality: Option<String>,
    pub passes_review: bool,
}

/// Output of `shipgate review`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub files_reviewed: usize,
    pub used_diff: bool,
    pub security_review: Option<ReviewVerdict>,
    pub quality_review: Option<ReviewVerdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ReviewFailure>,
    pub summary: ReviewSummary,
}

impl ReviewResult {
    pub fn from_gate(timestamp: DateTime<Utc>, gate: &ReviewGate) -> Self {
        Self {
            timestamp,
            model: gate.model.clone().unwrap_or_default(),
            files_reviewed: gate.files_reviewed.unwrap_or(0),
            used_diff: gate.used_diff.unwrap_or(false),
            security_review: gate.security.clone(),
            quality_review: gate.quality.clone(),
            error: gate.error.clone(),
            summary: ReviewSummary {
                security_risk: gate.security.as_ref().map(ReviewVerdict::tier_label),
                code_quality: gate.quality.as_ref().map(ReviewVerdict::tier_label),
                passes_review: gate.status == GateStatus::Passed,
            },
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)
    }

    pub fn load(path: &Path) -> Result<Self> {
        read_json(path)
    }
}

/// Serialize to `<path>.tmp` next to the target, then rename over it.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value).context("Failed to serialize JSON")?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    std::fs::write(&tmp, content).with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move {} into place at {}", tmp.display(), path.display()))?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::Digest;
    use crate::review::findings::{QualityTier, ReviewFinding, RiskLevel};
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn snapshot() -> FileSnapshot {
        let mut hashes = BTreeMap::new();
        hashes.insert("a.txt".to_string(), Digest::of_bytes(b"alpha"));
        hashes.insert("src/lib.rs".to_string(), Digest::of_bytes(b"pub fn x() {}"));
        FileSnapshot::from_hashes(hashes)
    }

    fn passing_review() -> ReviewGate {
        ReviewGate::from_verdicts(
            ReviewVerdict::security(RiskLevel::Low, "fine"),
            Some(ReviewVerdict::quality(QualityTier::Good, "tidy")),
        )
    }

    fn record(tests: GateResult, lint: GateResult, audit: GateResult, review: ReviewGate) -> VerificationRecord {
        VerificationRecord::new(Utc::now(), snapshot(), tests, lint, audit, review)
    }

    #[test]
    fn test_all_passed_or_skipped_is_overall_pass() {
        let r = record(
            GateResult::passed(),
            GateResult::skipped("no lint command configured"),
            GateResult::passed(),
            passing_review(),
        );
        assert!(r.summary.overall_pass);
        assert!(r.gates_passed());
        assert!(r.failed_gates().is_empty());
    }

    #[test]
    fn test_flipping_any_gate_fails_overall() {
        let gates = || {
            (
                GateResult::passed(),
                GateResult::passed(),
                GateResult::passed(),
                passing_review(),
            )
        };
        for which in 0..4 {
            let (mut t, mut l, mut a, mut r) = gates();
            match which {
                0 => t = GateResult::failed("exit 1"),
                1 => l = GateResult::failed("exit 1"),
                2 => a = GateResult::failed("high vulnerability"),
                _ => {
                    r = ReviewGate::from_verdicts(ReviewVerdict::security(RiskLevel::High, "bad"), None)
                }
            }
            let rec = record(t, l, a, r);
            assert!(!rec.summary.overall_pass, "gate {} should fail overall", which);
            assert_eq!(rec.failed_gates().len(), 1);
        }
    }

    #[test]
    fn test_audit_failure_forces_overall_fail() {
        let r = record(
            GateResult::passed(),
            GateResult::passed(),
            GateResult::failed("1 critical and 0 high severity vulnerabilities"),
            passing_review(),
        );
        assert!(!r.summary.audit_pass);
        assert!(!r.summary.overall_pass);
        assert_eq!(r.failed_gates(), vec!["audit"]);
    }

    #[test]
    fn test_quality_outside_acceptable_set_fails_review() {
        let gate = ReviewGate::from_verdicts(
            ReviewVerdict::security(RiskLevel::Medium, "ok"),
            Some(ReviewVerdict::quality(QualityTier::NeedsWork, "messy")),
        );
        assert_eq!(gate.status, GateStatus::Failed);
        assert!(gate.reason.unwrap().contains("NEEDS_WORK"));
    }

    #[test]
    fn test_raw_verdict_is_inconclusive_and_fails_gate() {
        let gate = ReviewGate::from_verdicts(
            ReviewVerdict::raw(crate::review::findings::ReviewKind::Security, "looks fine to me"),
            None,
        );
        assert_eq!(gate.status, GateStatus::Failed);
        assert!(gate.reason.unwrap().contains("inconclusive"));
    }

    #[test]
    fn test_review_error_is_failed_not_skipped() {
        let gate = ReviewGate::errored(&ReviewError::Timeout { secs: 30 });
        assert_eq!(gate.status, GateStatus::Failed);
        let failure = gate.error.unwrap();
        assert_eq!(failure.kind, "timeout");
        assert!(failure.retryable);
    }

    #[test]
    fn test_round_trip_preserves_hashes_and_summary() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".shipgate").join("verification.json");
        let security = ReviewVerdict::security(RiskLevel::Low, "fine").add_finding(
            ReviewFinding::new(Severity::Low, "verbose logging").with_file("src/lib.rs"),
        );
        let original = record(
            GateResult::passed(),
            GateResult::passed(),
            GateResult::skipped("opted out"),
            ReviewGate::from_verdicts(security, None).with_context("m", true, 2),
        );
        original.save(&path).unwrap();
        assert!(!dir.path().join(".shipgate").join("verification.json.tmp").exists());

        let loaded = VerificationRecord::load(&path).unwrap();
        assert_eq!(loaded.snapshot().hashes(), original.snapshot().hashes());
        assert_eq!(loaded.summary, original.summary);
        assert_eq!(loaded.files.count, 2);
        assert_eq!(loaded.count_findings(Severity::Low), 1);
    }

    #[test]
    fn test_serialized_shape_uses_external_field_names() {
        let r = record(
            GateResult::passed(),
            GateResult::passed(),
            GateResult::passed(),
            ReviewGate::skipped("no credential"),
        );
        let json: serde_json::Value = serde_json::to_value(&r).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["files"]["count"], 2);
        assert!(json["files"]["hashes"]["a.txt"].is_string());
        assert_eq!(json["aiReview"]["status"], "skipped");
        assert_eq!(json["summary"]["aiReviewPass"], true);
        assert_eq!(json["summary"]["overallPass"], true);
    }

    #[test]
    fn test_missing_record_is_not_found() {
        let dir = tempdir().unwrap();
        let err = VerificationRecord::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ShipError::RecordNotFound { .. }));
    }

    #[test]
    fn test_corrupt_record_is_unreadable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("verification.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = VerificationRecord::load(&path).unwrap_err();
        assert!(matches!(err, ShipError::RecordUnreadable { .. }));
    }

    #[test]
    fn test_wrong_version_is_unreadable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("verification.json");
        let mut r = record(
            GateResult::passed(),
            GateResult::passed(),
            GateResult::passed(),
            ReviewGate::skipped("x"),
        );
        r.version = 99;
        write_json_atomic(&path, &r).unwrap();
        let err = VerificationRecord::load(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported record version 99"));
    }

    #[test]
    fn test_tampered_summary_does_not_pass() {
        let mut r = record(
            GateResult::failed("exit 1"),
            GateResult::passed(),
            GateResult::passed(),
            ReviewGate::skipped("x"),
        );
        r.summary.tests_pass = true;
        r.summary.overall_pass = true;
        assert!(!r.gates_passed());
        assert_eq!(r.failed_gates(), vec!["tests"]);
    }

    #[test]
    fn test_review_result_summary() {
        let gate = passing_review().with_context("model-x", false, 7);
        let result = ReviewResult::from_gate(Utc::now(), &gate);
        assert_eq!(result.model, "model-x");
        assert_eq!(result.files_reviewed, 7);
        assert_eq!(result.summary.security_risk.as_deref(), Some("LOW"));
        assert_eq!(result.summary.code_quality.as_deref(), Some("GOOD"));
        assert!(result.summary.passes_review);

        let dir = tempdir().unwrap();
        let path = dir.path().join("review.json");
        result.save(&path).unwrap();
        let loaded = ReviewResult::load(&path).unwrap();
        assert_eq!(loaded, result);
    }
}
