//! Code-hosting collaborator backed by the `gh` CLI, plus release planning.

use crate::errors::CollaboratorError;
use crate::gates::GateStatus;
use crate::record::VerificationRecord;
use crate::review::findings::Severity;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

pub struct GhCli {
    dir: PathBuf,
}

impl GhCli {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Whether `gh` is installed and runnable.
    pub async fn is_available(&self) -> bool {
        Command::new("gh")
            .arg("--version")
            .current_dir(&self.dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .is_ok_and(|s| s.success())
    }

    /// Open a pull request and return its URL.
    pub async fn create_pr(&self, pr: &PullRequest) -> Result<String, CollaboratorError> {
        let output = Command::new("gh")
            .args(pr.gh_args())
            .current_dir(&self.dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => CollaboratorError::Unavailable {
                    tool: "gh".to_string(),
                },
                _ => CollaboratorError::CommandFailed {
                    command: "gh pr create".to_string(),
                    stderr: e.to_string(),
                },
            })?;

        if !output.status.success() {
            return Err(CollaboratorError::CommandFailed {
                command: "gh pr create".to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// A pull request to open for a verified branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub branch: String,
    pub base: String,
    pub title: String,
    pub body: String,
}

impl PullRequest {
    pub fn gh_args(&self) -> Vec<String> {
        vec![
            "pr".to_string(),
            "create".to_string(),
            "--base".to_string(),
            self.base.clone(),
            "--head".to_string(),
            self.branch.clone(),
            "--title".to_string(),
            self.title.clone(),
            "--body".to_string(),
            self.body.clone(),
        ]
    }
}

/// What the release action will do for an allowed ship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleasePlan {
    CreatePr(PullRequest),
    Skip { reason: String },
}

/// Decide the release action from branch state and tool availability.
pub fn plan_release(
    record: &VerificationRecord,
    current_branch: &str,
    default_branch: &str,
    gh_available: bool,
    title_prefix: &str,
) -> ReleasePlan {
    if current_branch == "HEAD" {
        return ReleasePlan::Skip {
            reason: "HEAD is detached; check out a branch to open a pull request".to_string(),
        };
    }
    if current_branch == default_branch {
        return ReleasePlan::Skip {
            reason: format!(
                "current branch '{}' is the default branch; nothing to propose",
                current_branch
            ),
        };
    }
    if !gh_available {
        return ReleasePlan::Skip {
            reason: "`gh` is not available; install the GitHub CLI to open pull requests"
                .to_string(),
        };
    }
    ReleasePlan::CreatePr(PullRequest {
        branch: current_branch.to_string(),
        base: default_branch.to_string(),
        title: pr_title(title_prefix, current_branch, record),
        body: pr_body(record),
    })
}

pub fn pr_title(prefix: &str, branch: &str, record: &VerificationRecord) -> String {
    format!(
        "{}Ship {}: {} files verified",
        prefix, branch, record.files.count
    )
}

pub fn pr_body(record: &VerificationRecord) -> String {
    let mark = |status: GateStatus| match status {
        GateStatus::Passed => "✅ passed",
        GateStatus::Failed => "❌ failed",
        GateStatus::Skipped => "⏭️ skipped",
    };

    let mut body = String::from("## Verification\n\n");
    body.push_str(&format!(
        "- Verified at: {}\n",
        record.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    body.push_str(&format!("- Files verified: {}\n\n", record.files.count));

    body.push_str("| Gate | Result |\n|---|---|\n");
    body.push_str(&format!("| Tests | {} |\n", mark(record.tests.status)));
    body.push_str(&format!("| Lint | {} |\n", mark(record.lint.status)));
    body.push_str(&format!("| Audit | {} |\n", mark(record.audit.status)));
    body.push_str(&format!("| AI review | {} |\n", mark(record.ai_review.status)));

    let review = &record.ai_review;
    if review.security.is_some() || review.quality.is_some() {
        body.push_str("\n## Review\n\n");
        if let Some(security) = &review.security {
            body.push_str(&format!("- Security risk: {}\n", security.tier_label()));
        }
        if let Some(quality) = &review.quality {
            body.push_str(&format!("- Code quality: {}\n", quality.tier_label()));
        }
        let counts: Vec<String> = Severity::all()
            .into_iter()
            .map(|s| (s, record.count_findings(s)))
            .filter(|(_, n)| *n > 0)
            .map(|(s, n)| format!("{} {}", n, s))
            .collect();
        if counts.is_empty() {
            body.push_str("- Findings: none\n");
        } else {
            body.push_str(&format!("- Findings: {}\n", counts.join(", ")));
        }
    }

    body.push_str("\n---\n*Gated by shipgate*\n");
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates::GateResult;
    use crate::hasher::{Digest, FileSnapshot};
    use crate::record::ReviewGate;
    use crate::review::findings::{ReviewFinding, ReviewVerdict, RiskLevel};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn record() -> VerificationRecord {
        let mut hashes = BTreeMap::new();
        for name in ["a.txt", "b.txt", "c.txt"] {
            hashes.insert(name.to_string(), Digest::of_bytes(name.as_bytes()));
        }
        let security = ReviewVerdict::security(RiskLevel::Medium, "ok")
            .add_finding(ReviewFinding::new(Severity::Medium, "missing rate limit"))
            .add_finding(ReviewFinding::new(Severity::Low, "verbose error"));
        VerificationRecord::new(
            Utc::now(),
            FileSnapshot::from_hashes(hashes),
            GateResult::passed(),
            GateResult::skipped("no lint command configured"),
            GateResult::passed(),
            ReviewGate::from_verdicts(security, None),
        )
    }

    #[test]
    fn test_feature_branch_with_gh_creates_pr() {
        let plan = plan_release(&record(), "feature/login", "main", true, "");
        match plan {
            ReleasePlan::CreatePr(pr) => {
                assert_eq!(pr.title, "Ship feature/login: 3 files verified");
                assert_eq!(pr.base, "main");
                assert_eq!(pr.branch, "feature/login");
            }
            other => panic!("Expected CreatePr, got {:?}", other),
        }
    }

    #[test]
    fn test_default_branch_skips() {
        let plan = plan_release(&record(), "main", "main", true, "");
        assert!(matches!(plan, ReleasePlan::Skip { ref reason } if reason.contains("default branch")));
    }

    #[test]
    fn test_missing_gh_skips() {
        let plan = plan_release(&record(), "feature", "main", false, "");
        assert!(matches!(plan, ReleasePlan::Skip { ref reason } if reason.contains("gh")));
    }

    #[test]
    fn test_detached_head_skips() {
        let plan = plan_release(&record(), "HEAD", "main", true, "");
        assert!(matches!(plan, ReleasePlan::Skip { .. }));
    }

    #[test]
    fn test_title_prefix() {
        assert_eq!(
            pr_title("[release] ", "topic", &record()),
            "[release] Ship topic: 3 files verified"
        );
    }

    #[test]
    fn test_body_lists_gates_and_findings() {
        let body = pr_body(&record());
        assert!(body.contains("Files verified: 3"));
        assert!(body.contains("| Tests | ✅ passed |"));
        assert!(body.contains("| Lint | ⏭️ skipped |"));
        assert!(body.contains("Security risk: MEDIUM"));
        assert!(body.contains("1 MEDIUM, 1 LOW"));
    }

    #[test]
    fn test_gh_args_carry_title_and_body() {
        let pr = PullRequest {
            branch: "b".into(),
            base: "main".into(),
            title: "t".into(),
            body: "body".into(),
        };
        let args = pr.gh_args();
        assert_eq!(&args[..2], &["pr", "create"]);
        assert!(args.windows(2).any(|w| w[0] == "--title" && w[1] == "t"));
        assert!(args.windows(2).any(|w| w[0] == "--body" && w[1] == "body"));
    }
}
