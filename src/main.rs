use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shipgate::errors::{ConfigError, ShipError};
use shipgate::telemetry;
use std::path::PathBuf;
use std::process::ExitCode;

mod cmd;

#[derive(Parser)]
#[command(name = "shipgate")]
#[command(version, about = "Verify a working tree, then ship exactly what was verified")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run every gate and record the verified file snapshot
    Verify {
        #[arg(long)]
        skip_tests: bool,

        #[arg(long)]
        skip_lint: bool,

        #[arg(long)]
        skip_audit: bool,

        #[arg(long)]
        skip_review: bool,

        /// Run only the security review
        #[arg(long)]
        security_only: bool,

        /// Review the full tree instead of the branch diff
        #[arg(long)]
        full: bool,

        /// Fail instead of skipping the review when no API key is set
        #[arg(long)]
        require_review: bool,

        /// Where to write the verification record
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Base branch for the review diff
        #[arg(long)]
        base: Option<String>,

        /// Reviewer model override
        #[arg(long)]
        model: Option<String>,
    },
    /// Check the tree against the verification record and release it
    Ship {
        /// Verification record to check against
        #[arg(long)]
        record: Option<PathBuf>,

        /// Print the release action instead of running it
        #[arg(long)]
        dry_run: bool,

        /// Push the branch and open a pull request
        #[arg(long)]
        create_pr: bool,

        /// Default-branch override for the pull request base
        #[arg(long)]
        base: Option<String>,
    },
    /// Run the AI review alone and write the review result
    Review {
        #[arg(long)]
        security_only: bool,

        #[arg(long)]
        full: bool,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long)]
        base: Option<String>,

        #[arg(long)]
        model: Option<String>,
    },
    /// Show the current verification record without re-hashing
    Status {
        #[arg(long)]
        record: Option<PathBuf>,
    },
    /// View or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Write a default shipgate.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.log_json, telemetry::level_for(cli.verbose));

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_code_for(&e)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match cli.command {
        Commands::Verify {
            skip_tests,
            skip_lint,
            skip_audit,
            skip_review,
            security_only,
            full,
            require_review,
            output,
            base,
            model,
        } => {
            let args = cmd::VerifyArgs {
                skip_tests,
                skip_lint,
                skip_audit,
                skip_review,
                security_only,
                full,
                require_review,
                output,
                base,
                model,
            };
            cmd::cmd_verify(&project_dir, args).await
        }
        Commands::Ship {
            record,
            dry_run,
            create_pr,
            base,
        } => cmd::cmd_ship(&project_dir, record.as_deref(), dry_run, create_pr, base).await,
        Commands::Review {
            security_only,
            full,
            output,
            base,
            model,
        } => {
            let args = cmd::ReviewArgs {
                security_only,
                full,
                output,
                base,
                model,
            };
            cmd::cmd_review(&project_dir, args).await
        }
        Commands::Status { record } => cmd::cmd_status(&project_dir, record.as_deref()),
        Commands::Config { command } => cmd::cmd_config(&project_dir, command),
    }
}

/// 2 for configuration and record problems, 1 for everything else.
fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    let config_class = err.chain().any(|cause| {
        cause.downcast_ref::<ConfigError>().is_some()
            || cause
                .downcast_ref::<ShipError>()
                .is_some_and(ShipError::is_record_error)
    });
    if config_class {
        ExitCode::from(2)
    } else {
        ExitCode::FAILURE
    }
}
