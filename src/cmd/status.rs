//! `shipgate status`: summarize the current record without touching the tree.

use anyhow::Result;
use chrono::Utc;
use console::style;
use shipgate::config::Config;
use shipgate::orchestrator::ship::format_age;
use shipgate::record::VerificationRecord;
use shipgate::ui::icons::{CLOCK, WARN};
use shipgate::ui::render_record;
use std::path::Path;
use std::process::ExitCode;

pub fn cmd_status(project_dir: &Path, record: Option<&Path>) -> Result<ExitCode> {
    let config = Config::load(project_dir)?;
    let record_path = match record {
        Some(path) => config.resolve(path),
        None => config.record_path(),
    };
    let record = VerificationRecord::load(&record_path)?;

    println!("Record: {}", record_path.display());
    print!("{}", render_record(&record));

    let age = record.age(Utc::now());
    let stale_after = config.stale_after();
    println!("{}Age: {}", CLOCK, format_age(age));
    if age > stale_after {
        println!(
            "{}{}",
            WARN,
            style(format!(
                "Older than {}h; re-run `shipgate verify` before shipping",
                stale_after.num_hours()
            ))
            .yellow()
        );
    }

    Ok(if record.gates_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
