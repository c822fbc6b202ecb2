//! Verify → ship flows driven through the library with a scripted reviewer.

use async_trait::async_trait;
use chrono::Utc;
use shipgate::config::{Config, EnvOverrides, ShipgateToml};
use shipgate::errors::{ReviewError, ShipError};
use shipgate::gates::GateStatus;
use shipgate::orchestrator::ship::evaluate;
use shipgate::orchestrator::{NoopObserver, ShipVerdict, Verifier, VerifyOptions};
use shipgate::record::{ReviewResult, VerificationRecord};
use shipgate::review::ReviewerClient;
use std::fs;
use std::sync::Mutex;
use tempfile::TempDir;

const SECURITY_LOW: &str = r#"```json
{"riskLevel": "LOW", "summary": "No issues", "findings": []}
```"#;
const QUALITY_GOOD: &str = r#"{"quality": "GOOD", "summary": "Readable", "findings": [{"priority": "LOW", "file": "src/lib.rs", "description": "Missing docs"}]}"#;
const SECURITY_CRITICAL: &str = r#"{"riskLevel": "CRITICAL", "summary": "Injection", "findings": [{"severity": "CRITICAL", "file": "src/lib.rs", "function": "run", "description": "Shell injection", "recommendation": "Quote arguments"}]}"#;

struct FakeReviewer {
    responses: Mutex<Vec<Result<String, ReviewError>>>,
}

impl FakeReviewer {
    fn new(mut responses: Vec<Result<String, ReviewError>>) -> Self {
        responses.reverse();
        Self {
            responses: Mutex::new(responses),
        }
    }
}

#[async_trait]
impl ReviewerClient for FakeReviewer {
    fn model(&self) -> &str {
        "fake-reviewer"
    }

    async fn review(&self, _prompt: &str, code_context: &str) -> Result<String, ReviewError> {
        assert!(code_context.contains("src/lib.rs"));
        self.responses
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(ReviewError::Transport("unexpected request".into())))
    }
}

fn project(audit: &str) -> (TempDir, Config) {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src/lib.rs"), "pub fn run(cmd: &str) {}\n").unwrap();
    fs::write(dir.path().join("Makefile"), "all:\n\techo ok\n").unwrap();

    let mut toml = ShipgateToml::default();
    toml.gates.test = Some("true".into());
    toml.gates.lint = Some("true".into());
    toml.gates.audit = Some(audit.into());
    let config = Config::from_parts(dir.path().to_path_buf(), toml, EnvOverrides::default());
    (dir, config)
}

async fn verify_with(config: &Config, options: VerifyOptions, reviewer: FakeReviewer) -> VerificationRecord {
    Verifier::with_reviewer(config, options, Box::new(reviewer))
        .run_and_save(&config.record_path(), &NoopObserver)
        .await
        .unwrap()
}

fn ship(config: &Config) -> Result<shipgate::orchestrator::Decided, ShipError> {
    evaluate(&config.record_path(), &config.project_dir, Utc::now(), config.stale_after())
}

#[tokio::test]
async fn clean_review_then_ship_is_allowed() {
    let (_dir, config) = project("");
    let reviewer = FakeReviewer::new(vec![Ok(SECURITY_LOW.into()), Ok(QUALITY_GOOD.into())]);

    let record = verify_with(&config, VerifyOptions::default(), reviewer).await;
    assert!(record.summary.overall_pass);
    assert_eq!(record.ai_review.status, GateStatus::Passed);
    assert_eq!(record.ai_review.model.as_deref(), Some("fake-reviewer"));
    assert_eq!(record.ai_review.used_diff, Some(false));

    let decided = ship(&config).unwrap();
    assert!(decided.decision.is_allowed());
    assert!(decided.approve().is_ok());
}

#[tokio::test]
async fn reviewer_timeout_fails_verification_and_blocks_ship() {
    let (_dir, config) = project("");
    let reviewer = FakeReviewer::new(vec![Err(ReviewError::Timeout { secs: 30 })]);

    let record = verify_with(&config, VerifyOptions::default(), reviewer).await;
    assert_eq!(record.ai_review.status, GateStatus::Failed);
    let failure = record.ai_review.error.as_ref().unwrap();
    assert_eq!(failure.kind, "timeout");
    assert!(failure.retryable);
    assert!(!record.summary.ai_review_pass);
    assert!(!record.summary.overall_pass);

    let decided = ship(&config).unwrap();
    assert!(decided.decision.integrity.is_clean());
    let denied = decided.approve().unwrap_err();
    assert!(matches!(denied.error, ShipError::GatesFailed { ref failed } if failed == &["aiReview"]));
}

#[tokio::test]
async fn critical_security_finding_blocks_ship() {
    let (_dir, config) = project("");
    let reviewer = FakeReviewer::new(vec![Ok(SECURITY_CRITICAL.into()), Ok(QUALITY_GOOD.into())]);

    let record = verify_with(&config, VerifyOptions::default(), reviewer).await;
    assert_eq!(record.ai_review.status, GateStatus::Failed);
    assert_eq!(record.count_findings(shipgate::review::Severity::Critical), 1);

    let decided = ship(&config).unwrap();
    match decided.decision.verdict {
        ShipVerdict::Deny(reasons) => assert_eq!(reasons, vec!["gates failed: aiReview"]),
        ShipVerdict::Allow => panic!("expected deny"),
    }
}

#[tokio::test]
async fn structured_audit_report_overrides_exit_status() {
    let report = r#"{"metadata":{"vulnerabilities":{"low":0,"moderate":0,"high":2,"critical":0}}}"#;
    let (_dir, config) = project(&format!("echo '{}'", report));
    let reviewer = FakeReviewer::new(vec![Ok(SECURITY_LOW.into()), Ok(QUALITY_GOOD.into())]);

    let record = verify_with(&config, VerifyOptions::default(), reviewer).await;
    assert_eq!(record.audit.exit_code, Some(0));
    assert_eq!(record.audit.status, GateStatus::Failed);
    assert!(!record.summary.audit_pass);

    let denied = ship(&config).unwrap().approve().unwrap_err();
    assert!(matches!(denied.error, ShipError::GatesFailed { ref failed } if failed == &["audit"]));
}

#[tokio::test]
async fn edit_after_verify_blocks_ship_until_reverified() {
    let (dir, config) = project("");
    let options = VerifyOptions {
        security_only: true,
        ..VerifyOptions::default()
    };
    verify_with(&config, options.clone(), FakeReviewer::new(vec![Ok(SECURITY_LOW.into())])).await;

    fs::write(dir.path().join("src/lib.rs"), "pub fn run(cmd: &str) { let _ = cmd; }\n").unwrap();
    let decided = ship(&config).unwrap();
    assert_eq!(decided.decision.integrity.modified.len(), 1);
    assert_eq!(decided.decision.integrity.modified[0].path, "src/lib.rs");
    assert!(matches!(
        decided.approve().unwrap_err().error,
        ShipError::IntegrityViolation { .. }
    ));

    verify_with(&config, options, FakeReviewer::new(vec![Ok(SECURITY_LOW.into())])).await;
    assert!(ship(&config).unwrap().decision.is_allowed());
}

#[tokio::test]
async fn tampered_summary_does_not_unlock_ship() {
    let (_dir, config) = project("false");
    let reviewer = FakeReviewer::new(vec![Ok(SECURITY_LOW.into()), Ok(QUALITY_GOOD.into())]);
    verify_with(&config, VerifyOptions::default(), reviewer).await;

    let path = config.record_path();
    let mut json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    json["summary"]["auditPass"] = true.into();
    json["summary"]["overallPass"] = true.into();
    fs::write(&path, serde_json::to_string_pretty(&json).unwrap()).unwrap();

    let decided = ship(&config).unwrap();
    assert!(!decided.decision.gates_passed);
    assert!(!decided.decision.is_allowed());
}

#[tokio::test]
async fn review_only_produces_review_result() {
    let (dir, config) = project("");
    let reviewer = FakeReviewer::new(vec![Ok(SECURITY_LOW.into()), Ok("I think it's fine overall.".into())]);

    let gate = Verifier::with_reviewer(&config, VerifyOptions::default(), Box::new(reviewer))
        .review_only(&NoopObserver)
        .await
        .unwrap();
    let result = ReviewResult::from_gate(Utc::now(), &gate);
    let path = dir.path().join(".shipgate/review.json");
    result.save(&path).unwrap();

    let loaded = ReviewResult::load(&path).unwrap();
    assert_eq!(loaded.summary.security_risk.as_deref(), Some("LOW"));
    assert!(loaded.quality_review.as_ref().unwrap().raw);
    assert!(!loaded.summary.passes_review);
}
