//! `shipgate review`: the review gate on its own, written as a review result.

use anyhow::{Context, Result};
use chrono::Utc;
use shipgate::config::Config;
use shipgate::orchestrator::{Verifier, VerifyOptions};
use shipgate::record::ReviewResult;
use shipgate::ui::{VerifyProgress, render_review_gate};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

pub struct ReviewArgs {
    pub security_only: bool,
    pub full: bool,
    pub output: Option<PathBuf>,
    pub base: Option<String>,
    pub model: Option<String>,
}

pub async fn cmd_review(project_dir: &Path, args: ReviewArgs) -> Result<ExitCode> {
    let config = Config::load(project_dir)?.with_model(args.model);
    let output = match &args.output {
        Some(path) => config.resolve(path),
        None => config.review_path(),
    };

    // Stand-alone review requires the credential.
    let options = VerifyOptions {
        security_only: args.security_only,
        full_review: args.full,
        require_review: true,
        base_branch: args.base,
        ..VerifyOptions::default()
    };
    let verifier = Verifier::new(&config, options)?;

    let progress = VerifyProgress::new();
    let gate = verifier.review_only(&progress).await;
    progress.finish();
    let gate = gate?;

    let result = ReviewResult::from_gate(Utc::now(), &gate);
    result
        .save(&output)
        .with_context(|| format!("Failed to write review result to {}", output.display()))?;

    println!();
    print!("{}", render_review_gate(&gate));
    println!("Review written to {}", output.display());

    Ok(if result.summary.passes_review {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
