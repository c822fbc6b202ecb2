//! Layered configuration for shipgate.
//!
//! Settings are read from `.shipgate/shipgate.toml`, then the environment
//! (with `.env` in the project root loaded first), then CLI flags. The
//! resulting [`Config`] is passed explicitly into each orchestrator; nothing
//! reads the process environment after it is built.
//!
//! ```toml
//! [gates]
//! test = "cargo test"
//! lint = "cargo clippy -- -D warnings"
//! audit = "cargo audit --json"
//! gate_timeout_secs = 900
//!
//! [review]
//! model = "claude-sonnet-4-20250514"
//! timeout_secs = 30
//! max_file_bytes = 60000
//! max_files = 40
//! include = ["src/**"]
//!
//! [ship]
//! stale_after_hours = 4
//! default_branch = "main"
//! pr_title_prefix = "[release] "
//!
//! [snapshot]
//! exclude = [".git/**", ".shipgate/**", "target/**"]
//! ```
//!
//! A gate key set to an empty string disables that gate outright; an absent
//! key falls back to detection from the project manifest.

use crate::errors::ConfigError;
use crate::gates::GateCommand;
use crate::hasher::{DEFAULT_EXCLUDES, ExcludeSet};
use crate::review::client::{DEFAULT_API_URL, DEFAULT_MODEL};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const STATE_DIR: &str = ".shipgate";
pub const CONFIG_FILE: &str = "shipgate.toml";
pub const RECORD_FILE: &str = "verification.json";
pub const REVIEW_FILE: &str = "review.json";

pub const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";
pub const MODEL_VAR: &str = "SHIPGATE_MODEL";
pub const API_URL_VAR: &str = "SHIPGATE_API_URL";

/// `[gates]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatesSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit: Option<String>,
    #[serde(default = "default_gate_timeout_secs")]
    pub gate_timeout_secs: u64,
}

fn default_gate_timeout_secs() -> u64 {
    900
}

impl Default for GatesSection {
    fn default() -> Self {
        Self {
            test: None,
            lint: None,
            audit: None,
            gate_timeout_secs: default_gate_timeout_secs(),
        }
    }
}

/// `[review]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default = "default_review_timeout_secs")]
    pub timeout_secs: u64,
    /// Per-file cap on context bytes; larger files are truncated with a marker.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: usize,
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    /// Globs selecting reviewable files in full-tree mode. Empty means all.
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_review_timeout_secs() -> u64 {
    30
}

fn default_max_file_bytes() -> usize {
    60_000
}

fn default_max_files() -> usize {
    40
}

impl Default for ReviewSection {
    fn default() -> Self {
        Self {
            model: None,
            api_url: None,
            timeout_secs: default_review_timeout_secs(),
            max_file_bytes: default_max_file_bytes(),
            max_files: default_max_files(),
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

/// `[ship]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipSection {
    #[serde(default = "default_stale_after_hours")]
    pub stale_after_hours: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub pr_title_prefix: String,
}

fn default_stale_after_hours() -> u64 {
    4
}

/// Upper bound for `ship.stale_after_hours` (about a century).
pub const MAX_STALE_AFTER_HOURS: u64 = 24 * 365 * 100;

impl Default for ShipSection {
    fn default() -> Self {
        Self {
            stale_after_hours: default_stale_after_hours(),
            default_branch: None,
            pr_title_prefix: String::new(),
        }
    }
}

/// `[snapshot]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotSection {
    #[serde(default = "default_snapshot_excludes")]
    pub exclude: Vec<String>,
}

fn default_snapshot_excludes() -> Vec<String> {
    DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect()
}

impl Default for SnapshotSection {
    fn default() -> Self {
        Self {
            exclude: default_snapshot_excludes(),
        }
    }
}

/// Contents of `shipgate.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShipgateToml {
    #[serde(default)]
    pub gates: GatesSection,
    #[serde(default)]
    pub review: ReviewSection,
    #[serde(default)]
    pub ship: ShipSection,
    #[serde(default)]
    pub snapshot: SnapshotSection,
}

impl ShipgateToml {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::InvalidConfig {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `<state_dir>/shipgate.toml`, or defaults when the file is absent.
    pub fn load_or_default(state_dir: &Path) -> Result<Self, ConfigError> {
        let path = state_dir.join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize shipgate.toml")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Human-readable warnings for suspicious values.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.review.timeout_secs == 0 {
            warnings.push("review.timeout_secs is 0; every review will time out".to_string());
        }
        if self.gates.gate_timeout_secs == 0 {
            warnings.push("gates.gate_timeout_secs is 0; every gate will time out".to_string());
        }
        if self.ship.stale_after_hours > MAX_STALE_AFTER_HOURS {
            warnings.push(format!(
                "ship.stale_after_hours is {}; clamped to {}",
                self.ship.stale_after_hours, MAX_STALE_AFTER_HOURS
            ));
        }
        if self.review.max_files == 0 {
            warnings.push("review.max_files is 0; full-tree review sends no code".to_string());
        }
        for g in self.snapshot.exclude.iter().chain(&self.review.include).chain(&self.review.exclude) {
            if glob::Pattern::new(g).is_err() {
                warnings.push(format!("invalid glob '{}'", g));
            }
        }
        warnings
    }
}

/// Environment values consulted while building a [`Config`].
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub api_url: Option<String>,
}

impl EnvOverrides {
    /// Load `<project>/.env` (never overriding set variables) and read the process environment.
    pub fn from_process(project_dir: &Path) -> Self {
        let dotenv = project_dir.join(".env");
        if dotenv.exists()
            && let Err(e) = dotenvy::from_path(&dotenv)
        {
            debug!(error = %e, "ignoring unreadable .env");
        }
        let read = |var: &str| std::env::var(var).ok().filter(|v| !v.trim().is_empty());
        Self {
            api_key: read(API_KEY_VAR),
            model: read(MODEL_VAR),
            api_url: read(API_URL_VAR),
        }
    }
}

/// Gate commands inferred from the project manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectedCommands {
    pub test: Option<GateCommand>,
    pub lint: Option<GateCommand>,
    pub audit: Option<GateCommand>,
}

/// Infer gate commands from `Cargo.toml` or `package.json`.
pub fn detect_commands(project_dir: &Path) -> DetectedCommands {
    if project_dir.join("Cargo.toml").is_file() {
        return DetectedCommands {
            test: Some(GateCommand::new("cargo test")),
            lint: Some(GateCommand::new("cargo clippy -- -D warnings")),
            audit: Some(GateCommand::new("cargo audit --json")),
        };
    }

    let package_json = project_dir.join("package.json");
    if package_json.is_file() {
        let scripts = std::fs::read_to_string(&package_json)
            .ok()
            .and_then(|s| serde_json::from_str::<serde_json::Value>(&s).ok())
            .and_then(|v| v.get("scripts").cloned());
        let has_script = |name: &str| scripts.as_ref().and_then(|s| s.get(name)).is_some();
        return DetectedCommands {
            test: has_script("test").then(|| GateCommand::new("npm test")),
            lint: has_script("lint").then(|| GateCommand::new("npm run lint")),
            audit: Some(GateCommand::new("npm audit --json")),
        };
    }

    DetectedCommands::default()
}

/// Effective configuration for one invocation.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub state_dir: PathBuf,
    pub toml: ShipgateToml,
    /// Reviewer credential; `None` degrades the review gate to skipped.
    pub api_key: Option<String>,
    pub model: String,
    pub api_url: String,
    detected: DetectedCommands,
}

impl Config {
    /// Build the configuration for `project_dir` from file and environment.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .with_context(|| format!("Failed to resolve project directory {}", project_dir.display()))?;
        let state_dir = project_dir.join(STATE_DIR);
        let toml = ShipgateToml::load_or_default(&state_dir)?;
        let env = EnvOverrides::from_process(&project_dir);
        Ok(Self::from_parts(project_dir, toml, env))
    }

    /// Assemble a configuration from already-loaded layers.
    pub fn from_parts(project_dir: PathBuf, toml: ShipgateToml, env: EnvOverrides) -> Self {
        let model = env
            .model
            .or_else(|| toml.review.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let api_url = env
            .api_url
            .or_else(|| toml.review.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let detected = detect_commands(&project_dir);
        Self {
            state_dir: project_dir.join(STATE_DIR),
            project_dir,
            toml,
            api_key: env.api_key,
            model,
            api_url,
            detected,
        }
    }

    /// CLI override for the reviewer model.
    pub fn with_model(mut self, model: Option<String>) -> Self {
        if let Some(model) = model {
            self.model = model;
        }
        self
    }

    pub fn test_command(&self) -> Option<GateCommand> {
        resolve_command(self.toml.gates.test.as_deref(), &self.detected.test)
    }

    pub fn lint_command(&self) -> Option<GateCommand> {
        resolve_command(self.toml.gates.lint.as_deref(), &self.detected.lint)
    }

    pub fn audit_command(&self) -> Option<GateCommand> {
        resolve_command(self.toml.gates.audit.as_deref(), &self.detected.audit)
    }

    pub fn gate_timeout(&self) -> Duration {
        Duration::from_secs(self.toml.gates.gate_timeout_secs)
    }

    pub fn review_timeout(&self) -> Duration {
        Duration::from_secs(self.toml.review.timeout_secs)
    }

    /// Age past which a record is reported stale, clamped to [`MAX_STALE_AFTER_HOURS`].
    pub fn stale_after(&self) -> chrono::Duration {
        let hours = self.toml.ship.stale_after_hours.min(MAX_STALE_AFTER_HOURS) as i64;
        chrono::Duration::try_hours(hours).unwrap_or_else(chrono::Duration::zero)
    }

    pub fn snapshot_excludes(&self) -> Result<ExcludeSet> {
        ExcludeSet::new(&self.toml.snapshot.exclude)
    }

    pub fn config_file(&self) -> PathBuf {
        self.state_dir.join(CONFIG_FILE)
    }

    /// Default location of the verification record.
    pub fn record_path(&self) -> PathBuf {
        self.state_dir.join(RECORD_FILE)
    }

    /// Default location of the stand-alone review result.
    pub fn review_path(&self) -> PathBuf {
        self.state_dir.join(REVIEW_FILE)
    }

    /// Resolve a user-supplied path against the project directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        }
    }

    /// The credential, or a configuration error naming the variable.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingCredential {
                var: API_KEY_VAR.to_string(),
            })
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}

fn resolve_command(configured: Option<&str>, detected: &Option<GateCommand>) -> Option<GateCommand> {
    match configured {
        Some(cmd) if cmd.trim().is_empty() => None,
        Some(cmd) => Some(GateCommand::new(cmd.trim())),
        None => detected.clone(),
    }
}
