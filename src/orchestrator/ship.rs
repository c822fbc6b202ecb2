//! Ship orchestrator.
//!
//! Each state is its own type and every transition consumes the previous
//! one: [`LoadedRecord`] → [`CheckedRecord`] → [`Decided`], which either
//! approves into [`Approved`] (the only state that can run the release
//! action) or ends as [`Denied`].

use crate::config::Config;
use crate::errors::{CollaboratorError, DigestMismatch, HashError, ShipError};
use crate::hasher::digest_file;
use crate::record::VerificationRecord;
use crate::vcs::{GhCli, Git, PullRequest, ReleasePlan, plan_release};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Per-file outcome of re-hashing the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    pub verified: Vec<String>,
    /// Digest differs; carries expected and actual digest prefixes.
    pub modified: Vec<DigestMismatch>,
    pub missing: Vec<String>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.modified.is_empty() && self.missing.is_empty()
    }

    pub fn checked(&self) -> usize {
        self.verified.len() + self.modified.len() + self.missing.len()
    }
}

/// Re-hash every snapshot path under `root` and classify it.
pub fn check_integrity(record: &VerificationRecord, root: &Path) -> IntegrityReport {
    let mut report = IntegrityReport::default();
    for (path, expected) in record.snapshot().hashes() {
        match digest_file(&root.join(path)) {
            Ok(actual) if &actual == expected => report.verified.push(path.clone()),
            Ok(actual) => report.modified.push(DigestMismatch {
                path: path.clone(),
                expected: expected.prefix().to_string(),
                actual: actual.prefix().to_string(),
            }),
            Err(HashError::NotFound { .. }) => report.missing.push(path.clone()),
            Err(e) => {
                // Unreadable content cannot be confirmed unchanged.
                warn!(path = %path, error = %e, "could not re-hash file");
                report.modified.push(DigestMismatch {
                    path: path.clone(),
                    expected: expected.prefix().to_string(),
                    actual: "unreadable".to_string(),
                });
            }
        }
    }
    report
}

/// Final allow/deny.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShipVerdict {
    Allow,
    Deny(Vec<String>),
}

/// Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipDecision {
    pub integrity: IntegrityReport,
    pub gates_passed: bool,
    pub failed_gates: Vec<String>,
    /// Non-blocking: set when the record is older than the threshold.
    pub stale_warning: Option<String>,
    pub verdict: ShipVerdict,
}

impl ShipDecision {
    pub fn is_allowed(&self) -> bool {
        self.verdict == ShipVerdict::Allow
    }

    /// The error describing why shipping is denied, integrity first.
    pub fn denial_error(&self) -> Option<ShipError> {
        if !self.integrity.is_clean() {
            Some(ShipError::IntegrityViolation {
                modified: self.integrity.modified.clone(),
                missing: self.integrity.missing.clone(),
            })
        } else if !self.gates_passed {
            Some(ShipError::GatesFailed {
                failed: self.failed_gates.clone(),
            })
        } else {
            None
        }
    }
}

/// A verification record read from disk.
#[derive(Debug)]
pub struct LoadedRecord {
    pub path: PathBuf,
    pub record: VerificationRecord,
}

impl LoadedRecord {
    pub fn load(path: &Path) -> Result<Self, ShipError> {
        let record = VerificationRecord::load(path)?;
        info!(path = %path.display(), files = record.files.count, "verification record loaded");
        Ok(Self {
            path: path.to_path_buf(),
            record,
        })
    }

    pub fn check_integrity(self, root: &Path) -> CheckedRecord {
        let integrity = check_integrity(&self.record, root);
        info!(
            verified = integrity.verified.len(),
            modified = integrity.modified.len(),
            missing = integrity.missing.len(),
            "integrity checked"
        );
        CheckedRecord {
            record: self.record,
            integrity,
        }
    }
}

/// Integrity established; gates not yet considered.
#[derive(Debug)]
pub struct CheckedRecord {
    pub record: VerificationRecord,
    pub integrity: IntegrityReport,
}

impl CheckedRecord {
    pub fn decide(self, now: DateTime<Utc>, stale_after: chrono::Duration) -> Decided {
        let gates_passed = self.record.gates_passed();
        let failed_gates = if gates_passed {
            Vec::new()
        } else {
            self.record.failed_gates()
        };

        let age = self.record.age(now);
        let stale_warning = (age > stale_after).then(|| {
            format!(
                "verification record is {} old (threshold {}h); consider re-running verify",
                format_age(age),
                stale_after.num_hours()
            )
        });

        let mut reasons = Vec::new();
        for m in &self.integrity.modified {
            reasons.push(format!(
                "modified: {} (expected {}, actual {})",
                m.path, m.expected, m.actual
            ));
        }
        for path in &self.integrity.missing {
            reasons.push(format!("missing: {}", path));
        }
        if !gates_passed {
            reasons.push(format!("gates failed: {}", failed_gates.join(", ")));
        }
        let verdict = if reasons.is_empty() {
            ShipVerdict::Allow
        } else {
            ShipVerdict::Deny(reasons)
        };

        Decided {
            record: self.record,
            decision: ShipDecision {
                integrity: self.integrity,
                gates_passed,
                failed_gates,
                stale_warning,
                verdict,
            },
        }
    }
}

/// A decision has been made; only approval unlocks the release action.
#[derive(Debug)]
pub struct Decided {
    pub record: VerificationRecord,
    pub decision: ShipDecision,
}

impl Decided {
    pub fn approve(self) -> Result<Approved, Denied> {
        match self.decision.denial_error() {
            None => Ok(Approved {
                record: self.record,
                decision: self.decision,
            }),
            Some(error) => Err(Denied {
                decision: self.decision,
                error,
            }),
        }
    }
}

/// Terminal: integrity or gate failure. Carries no release capability.
#[derive(Debug)]
pub struct Denied {
    pub decision: ShipDecision,
    pub error: ShipError,
}

/// Shipping is allowed.
#[derive(Debug)]
pub struct Approved {
    pub record: VerificationRecord,
    pub decision: ShipDecision,
}

/// Caller choices for the release action.
#[derive(Debug, Clone, Default)]
pub struct ReleaseRequest {
    pub create_pr: bool,
    pub dry_run: bool,
    pub base: Option<String>,
}

/// What the release action did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    NotRequested,
    Skipped { reason: String },
    DryRun(PullRequest),
    Created { pr: PullRequest, url: String },
}

impl Approved {
    /// Run (or, for a dry run, describe) the release action.
    pub async fn release(&self, config: &Config, request: &ReleaseRequest) -> Result<ReleaseOutcome, CollaboratorError> {
        if !request.create_pr && !request.dry_run {
            return Ok(ReleaseOutcome::NotRequested);
        }

        let git = Git::new(&config.project_dir);
        if !git.is_work_tree().await {
            return Ok(ReleaseOutcome::Skipped {
                reason: "project is not a git work tree".to_string(),
            });
        }
        let current = git.current_branch().await?;
        let default = match request.base.clone().or_else(|| config.toml.ship.default_branch.clone()) {
            Some(base) => base,
            None => git.default_branch().await,
        };
        let gh = GhCli::new(&config.project_dir);
        let gh_available = gh.is_available().await;

        let plan = plan_release(
            &self.record,
            &current,
            &default,
            gh_available,
            &config.toml.ship.pr_title_prefix,
        );
        let pr = match plan {
            ReleasePlan::Skip { reason } => {
                info!(%reason, "release action skipped");
                return Ok(ReleaseOutcome::Skipped { reason });
            }
            ReleasePlan::CreatePr(pr) => pr,
        };
        if request.dry_run {
            return Ok(ReleaseOutcome::DryRun(pr));
        }

        git.push_branch(&pr.branch).await?;
        let url = gh.create_pr(&pr).await?;
        info!(%url, "pull request created");
        Ok(ReleaseOutcome::Created { pr, url })
    }
}

/// Load, check and decide in one step.
pub fn evaluate(record_path: &Path, root: &Path, now: DateTime<Utc>, stale_after: chrono::Duration) -> Result<Decided, ShipError> {
    Ok(LoadedRecord::load(record_path)?
        .check_integrity(root)
        .decide(now, stale_after))
}

/// `5h 12m`, or `7m` under an hour.
pub fn format_age(age: chrono::Duration) -> String {
    let hours = age.num_hours();
    let minutes = age.num_minutes() - hours * 60;
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}
