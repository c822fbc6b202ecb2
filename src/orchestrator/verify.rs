//! Verification orchestrator.
//!
//! Runs strictly in sequence: snapshot, tests, lint, audit, security review,
//! then quality review unless scoped to security only. Gate failures are
//! captured into the record; they never abort the run.

use crate::config::{API_KEY_VAR, Config};
use crate::errors::ReviewError;
use crate::gates::audit::classify_audit;
use crate::gates::{GateResult, GateRunner, GateStatus};
use crate::hasher::{FileSnapshot, filter_paths, walk_files};
use crate::record::{ReviewGate, VerificationRecord};
use crate::review::context::{ContextOptions, ReviewContext, build_context};
use crate::review::prompts::build_prompt;
use crate::review::{HttpReviewer, ReviewKind, ReviewVerdict, ReviewerClient, parse_review};
use crate::vcs::Git;
use anyhow::{Context, Result};
use chrono::Utc;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

/// Steps reported to a [`VerifyObserver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyStep {
    Snapshot,
    Tests,
    Lint,
    Audit,
    SecurityReview,
    QualityReview,
}

impl fmt::Display for VerifyStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Snapshot => "snapshot",
            Self::Tests => "tests",
            Self::Lint => "lint",
            Self::Audit => "audit",
            Self::SecurityReview => "security review",
            Self::QualityReview => "quality review",
        };
        write!(f, "{}", s)
    }
}

/// Progress hooks for a verify run. All methods default to no-ops.
pub trait VerifyObserver {
    fn started(&self, _step: VerifyStep) {}
    fn finished(&self, _step: VerifyStep, _status: GateStatus) {}
}

pub struct NoopObserver;

impl VerifyObserver for NoopObserver {}

/// Caller choices for one verify run.
#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    pub skip_tests: bool,
    pub skip_lint: bool,
    pub skip_audit: bool,
    pub skip_review: bool,
    pub security_only: bool,
    /// Review the full tree instead of the branch diff.
    pub full_review: bool,
    /// Treat a missing reviewer credential as fatal.
    pub require_review: bool,
    pub base_branch: Option<String>,
}

pub struct Verifier<'a> {
    config: &'a Config,
    options: VerifyOptions,
    reviewer: Option<Box<dyn ReviewerClient>>,
}

impl<'a> Verifier<'a> {
    /// Build a verifier with the HTTP reviewer from configuration.
    ///
    /// A missing credential leaves the review gate to be skipped, unless
    /// `require_review` is set, in which case this fails before any gate runs.
    pub fn new(config: &'a Config, options: VerifyOptions) -> Result<Self> {
        let reviewer: Option<Box<dyn ReviewerClient>> = if options.skip_review {
            None
        } else {
            match config.require_api_key() {
                Ok(key) => Some(Box::new(
                    HttpReviewer::new(&config.api_url, key, &config.model, config.review_timeout())
                        .context("Failed to build reviewer client")?,
                )),
                Err(e) if options.require_review => return Err(e.into()),
                Err(_) => None,
            }
        };
        Ok(Self {
            config,
            options,
            reviewer,
        })
    }

    /// Build a verifier around an explicit reviewer.
    pub fn with_reviewer(config: &'a Config, options: VerifyOptions, reviewer: Box<dyn ReviewerClient>) -> Self {
        Self {
            config,
            options,
            reviewer: Some(reviewer),
        }
    }

    /// Run every step and return the record without persisting it.
    pub async fn run(&self, observer: &dyn VerifyObserver) -> Result<VerificationRecord> {
        self.run_excluding(None, observer).await
    }

    /// Run and persist the record, whatever the outcome.
    ///
    /// The record and its temp file are kept out of the snapshot so a later
    /// verify to the same path supersedes it.
    pub async fn run_and_save(&self, path: &Path, observer: &dyn VerifyObserver) -> Result<VerificationRecord> {
        let record = self.run_excluding(Some(path), observer).await?;
        record
            .save(path)
            .with_context(|| format!("Failed to save verification record to {}", path.display()))?;
        Ok(record)
    }

    async fn run_excluding(
        &self,
        record_path: Option<&Path>,
        observer: &dyn VerifyObserver,
    ) -> Result<VerificationRecord> {
        observer.started(VerifyStep::Snapshot);
        let tracked = tracked_files(self.config, record_path).await?;
        let snapshot = FileSnapshot::capture(&self.config.project_dir, &tracked)?;
        info!(files = snapshot.len(), "snapshot captured");
        observer.finished(VerifyStep::Snapshot, GateStatus::Passed);

        let runner = GateRunner::new(&self.config.project_dir, self.config.gate_timeout());

        let tests = self
            .gate(observer, VerifyStep::Tests, self.options.skip_tests, "--skip-tests", || async {
                runner.run(self.config.test_command().as_ref(), "test").await
            })
            .await;
        let lint = self
            .gate(observer, VerifyStep::Lint, self.options.skip_lint, "--skip-lint", || async {
                runner.run(self.config.lint_command().as_ref(), "lint").await
            })
            .await;
        let audit = self
            .gate(observer, VerifyStep::Audit, self.options.skip_audit, "--skip-audit", || async {
                runner
                    .run_with(self.config.audit_command().as_ref(), "audit", classify_audit)
                    .await
            })
            .await;

        let tracked_snapshot: Vec<String> = snapshot.paths().map(str::to_string).collect();
        let ai_review = self.review(&tracked_snapshot, observer).await;

        let record = VerificationRecord::new(Utc::now(), snapshot, tests, lint, audit, ai_review);
        info!(overall_pass = record.summary.overall_pass, "verification finished");
        Ok(record)
    }

    async fn gate<F, Fut>(
        &self,
        observer: &dyn VerifyObserver,
        step: VerifyStep,
        skip: bool,
        flag: &str,
        run: F,
    ) -> GateResult
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = GateResult>,
    {
        observer.started(step);
        let result = if skip {
            GateResult::skipped(format!("skipped by {}", flag))
        } else {
            run().await
        };
        observer.finished(step, result.status);
        result
    }

    /// The AI review gate over the given snapshot paths.
    pub async fn review(&self, tracked: &[String], observer: &dyn VerifyObserver) -> ReviewGate {
        if self.options.skip_review {
            return ReviewGate::skipped("skipped by --skip-review");
        }
        let Some(reviewer) = self.reviewer.as_deref() else {
            warn!("{} is not set, AI review skipped", API_KEY_VAR);
            return ReviewGate::skipped(format!("{} is not set", API_KEY_VAR));
        };

        let context = match build_context(&self.config.project_dir, tracked, &self.context_options()).await {
            Ok(context) => context,
            Err(e) => return ReviewGate::failed(format!("could not assemble review context: {:#}", e)),
        };
        if context.is_empty() {
            return ReviewGate::skipped("no reviewable files");
        }
        let finish = |gate: ReviewGate| {
            gate.with_context(reviewer.model(), context.used_diff, context.files_reviewed())
        };

        let security = match ask(reviewer, ReviewKind::Security, &context, observer).await {
            Ok(verdict) => verdict,
            Err(e) => return finish(ReviewGate::errored(&e)),
        };
        let quality = if self.options.security_only {
            None
        } else {
            match ask(reviewer, ReviewKind::Quality, &context, observer).await {
                Ok(verdict) => Some(verdict),
                Err(e) => {
                    let mut gate = ReviewGate::errored(&e);
                    gate.security = Some(security);
                    return finish(gate);
                }
            }
        };
        finish(ReviewGate::from_verdicts(security, quality))
    }

    /// Stand-alone review over the current tracked files.
    pub async fn review_only(&self, observer: &dyn VerifyObserver) -> Result<ReviewGate> {
        let tracked = tracked_files(self.config, None).await?;
        Ok(self.review(&tracked, observer).await)
    }

    fn context_options(&self) -> ContextOptions {
        let review = &self.config.toml.review;
        ContextOptions {
            max_file_bytes: review.max_file_bytes,
            max_files: review.max_files,
            include: review.include.clone(),
            exclude: review.exclude.clone(),
            prefer_diff: !self.options.full_review,
            base_branch: self
                .options
                .base_branch
                .clone()
                .or_else(|| self.config.toml.ship.default_branch.clone()),
        }
    }
}

async fn ask(
    reviewer: &dyn ReviewerClient,
    kind: ReviewKind,
    context: &ReviewContext,
    observer: &dyn VerifyObserver,
) -> Result<ReviewVerdict, ReviewError> {
    let step = match kind {
        ReviewKind::Security => VerifyStep::SecurityReview,
        ReviewKind::Quality => VerifyStep::QualityReview,
    };
    observer.started(step);
    match reviewer.review(&build_prompt(kind), &context.text).await {
        Ok(text) => {
            let verdict = parse_review(kind, &text);
            let status = if verdict.passes() {
                GateStatus::Passed
            } else {
                GateStatus::Failed
            };
            observer.finished(step, status);
            Ok(verdict)
        }
        Err(e) => {
            warn!(%kind, error = %e, retryable = e.is_retryable(), "review request failed");
            observer.finished(step, GateStatus::Failed);
            Err(e)
        }
    }
}

/// Files to snapshot: `git ls-files` in a work tree, otherwise a directory walk.
///
/// `record_path` (and its `.tmp` sibling) is excluded when it lies inside the
/// project.
pub async fn tracked_files(config: &Config, record_path: Option<&Path>) -> Result<Vec<String>> {
    let mut excludes = config.snapshot_excludes()?;
    if let Some(rel) = record_path.and_then(|p| project_relative(&config.project_dir, p)) {
        excludes = excludes.with_path(format!("{}.tmp", rel)).with_path(rel);
    }
    let git = Git::new(&config.project_dir);
    if git.is_work_tree().await {
        match git.ls_files().await {
            Ok(files) => return Ok(filter_paths(files, &excludes)),
            Err(e) => warn!(error = %e, "git ls-files failed, walking the directory instead"),
        }
    }
    walk_files(&config.project_dir, &excludes)
}

/// `path` relative to `root` with `/` separators, if it lies inside `root`.
fn project_relative(root: &Path, path: &Path) -> Option<String> {
    let rel = match path.strip_prefix(root) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => {
            // Compare canonical forms when the spellings differ (symlinked temp dirs).
            let root = root.canonicalize().ok()?;
            let parent = path.parent()?.canonicalize().ok()?;
            parent.strip_prefix(&root).ok()?.join(path.file_name()?)
        }
    };
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}
