//! Configuration view and init commands: `shipgate config`.

use anyhow::{Result, bail};
use shipgate::config::{API_KEY_VAR, CONFIG_FILE, Config, STATE_DIR, ShipgateToml};
use shipgate::gates::GateCommand;
use shipgate::ui::icons::WARN;
use std::path::Path;
use std::process::ExitCode;

use super::super::ConfigCommands;

fn describe(command: Option<GateCommand>) -> String {
    match command {
        Some(cmd) => format!("\"{}\"", cmd.as_str()),
        None => "(none, gate skipped)".to_string(),
    }
}

pub fn cmd_config(project_dir: &Path, command: Option<ConfigCommands>) -> Result<ExitCode> {
    let config_path = project_dir.join(STATE_DIR).join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            let config = Config::load(project_dir)?;
            println!();
            println!("Shipgate Configuration");
            println!("======================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No shipgate.toml at {}; using defaults", config_path.display());
            }
            println!();

            let toml = &config.toml;
            println!("[gates]");
            println!("  test = {}", describe(config.test_command()));
            println!("  lint = {}", describe(config.lint_command()));
            println!("  audit = {}", describe(config.audit_command()));
            println!("  gate_timeout_secs = {}", toml.gates.gate_timeout_secs);
            println!();

            println!("[review]");
            println!("  model = \"{}\"", config.model);
            println!("  api_url = \"{}\"", config.api_url);
            println!("  timeout_secs = {}", toml.review.timeout_secs);
            println!("  max_file_bytes = {}", toml.review.max_file_bytes);
            println!("  max_files = {}", toml.review.max_files);
            if !toml.review.include.is_empty() {
                println!("  include = {:?}", toml.review.include);
            }
            if !toml.review.exclude.is_empty() {
                println!("  exclude = {:?}", toml.review.exclude);
            }
            println!(
                "  {} = {}",
                API_KEY_VAR,
                if config.api_key.is_some() { "set" } else { "not set (review skipped)" }
            );
            println!();

            println!("[ship]");
            println!("  stale_after_hours = {}", toml.ship.stale_after_hours);
            if let Some(branch) = &toml.ship.default_branch {
                println!("  default_branch = \"{}\"", branch);
            }
            println!("  pr_title_prefix = \"{}\"", toml.ship.pr_title_prefix);
            println!();

            println!("[snapshot]");
            println!("  exclude = {:?}", toml.snapshot.exclude);

            let warnings = config.validate();
            if !warnings.is_empty() {
                println!();
                for warning in warnings {
                    println!("{}{}", WARN, warning);
                }
            }
        }
        Some(ConfigCommands::Init { force }) => {
            if config_path.exists() && !force {
                bail!(
                    "{} already exists. Use --force to overwrite.",
                    config_path.display()
                );
            }
            ShipgateToml::default().save(&config_path)?;
            println!("Created {}", config_path.display());
        }
    }

    Ok(ExitCode::SUCCESS)
}
