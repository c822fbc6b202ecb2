//! `shipgate verify`

use anyhow::Result;
use shipgate::config::Config;
use shipgate::orchestrator::{Verifier, VerifyOptions};
use shipgate::ui::{VerifyProgress, render_record};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

pub struct VerifyArgs {
    pub skip_tests: bool,
    pub skip_lint: bool,
    pub skip_audit: bool,
    pub skip_review: bool,
    pub security_only: bool,
    pub full: bool,
    pub require_review: bool,
    pub output: Option<PathBuf>,
    pub base: Option<String>,
    pub model: Option<String>,
}

pub async fn cmd_verify(project_dir: &Path, args: VerifyArgs) -> Result<ExitCode> {
    let config = Config::load(project_dir)?.with_model(args.model);
    let output = match &args.output {
        Some(path) => config.resolve(path),
        None => config.record_path(),
    };

    let options = VerifyOptions {
        skip_tests: args.skip_tests,
        skip_lint: args.skip_lint,
        skip_audit: args.skip_audit,
        skip_review: args.skip_review,
        security_only: args.security_only,
        full_review: args.full,
        require_review: args.require_review,
        base_branch: args.base,
    };
    let verifier = Verifier::new(&config, options)?;

    let progress = VerifyProgress::new();
    let record = verifier.run_and_save(&output, &progress).await;
    progress.finish();
    let record = record?;

    println!();
    print!("{}", render_record(&record));
    println!("Record written to {}", output.display());

    Ok(if record.summary.overall_pass {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
