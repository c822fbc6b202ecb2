//! `shipgate ship`

use anyhow::{Context, Result};
use chrono::Utc;
use shipgate::config::Config;
use shipgate::orchestrator::ReleaseRequest;
use shipgate::orchestrator::ship::evaluate;
use shipgate::ui::{render_decision, render_release};
use std::path::Path;
use std::process::ExitCode;
use tracing::warn;

pub async fn cmd_ship(
    project_dir: &Path,
    record: Option<&Path>,
    dry_run: bool,
    create_pr: bool,
    base: Option<String>,
) -> Result<ExitCode> {
    let config = Config::load(project_dir)?;
    let record_path = match record {
        Some(path) => config.resolve(path),
        None => config.record_path(),
    };

    let decided = evaluate(&record_path, &config.project_dir, Utc::now(), config.stale_after())?;
    print!("{}", render_decision(&decided.decision));

    let approved = match decided.approve() {
        Ok(approved) => approved,
        Err(denied) => {
            warn!(error = %denied.error, "ship denied");
            eprintln!("{}", denied.error);
            return Ok(ExitCode::FAILURE);
        }
    };

    let request = ReleaseRequest {
        create_pr,
        dry_run,
        base,
    };
    let outcome = approved
        .release(&config, &request)
        .await
        .context("Release action failed")?;
    print!("{}", render_release(&outcome));

    Ok(ExitCode::SUCCESS)
}
