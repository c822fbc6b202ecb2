//! Typed error hierarchy for shipgate.
//!
//! One enum per subsystem:
//! - `ConfigError`: missing credentials and unreadable configuration
//! - `HashError`: file digest failures
//! - `GateExecutionError`: external gate command misbehaviour (never escapes the runner)
//! - `ReviewError`: reviewer endpoint failures
//! - `ShipError`: ship-phase failures (record state and integrity)
//! - `CollaboratorError`: `git` / `gh` command failures

use std::path::PathBuf;
use thiserror::Error;

/// Configuration problems. Fatal before any action is taken.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Required credential {var} is not set")]
    MissingCredential { var: String },

    #[error("Invalid configuration at {path}: {source}")]
    InvalidConfig {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to read configuration at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from computing a file digest.
#[derive(Debug, Error)]
pub enum HashError {
    #[error("File not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An external gate command misbehaved.
///
/// The gate runner converts every variant into a failed `GateResult`.
#[derive(Debug, Error)]
pub enum GateExecutionError {
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {secs}s")]
    TimedOut { command: String, secs: u64 },
}

/// Reviewer endpoint failures.
///
/// Variants are kept distinct so callers can decide whether a retry makes sense.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Review request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Transport error talking to reviewer: {0}")]
    Transport(String),

    #[error("Reviewer API error ({status}, {kind}): {message}")]
    Api {
        status: u16,
        kind: String,
        message: String,
    },

    #[error("Reviewer returned an unexpected response: {0}")]
    MalformedResponse(String),
}

impl ReviewError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether a later full rerun could plausibly succeed.
    ///
    /// Timeouts, transport failures, rate limits and server-side errors are
    /// transient; request and authentication errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::MalformedResponse(_) => false,
        }
    }
}

/// A file whose current digest differs from the recorded one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestMismatch {
    pub path: String,
    pub expected: String,
    pub actual: String,
}

/// Errors from the ship phase.
#[derive(Debug, Error)]
pub enum ShipError {
    #[error("No verification record at {path}. Run `shipgate verify` first.")]
    RecordNotFound { path: PathBuf },

    #[error("Verification record at {path} is unreadable: {reason}")]
    RecordUnreadable { path: PathBuf, reason: String },

    #[error("{}", integrity_message(modified, missing))]
    IntegrityViolation {
        modified: Vec<DigestMismatch>,
        missing: Vec<String>,
    },

    #[error("Verification did not pass: {}", failed.join(", "))]
    GatesFailed { failed: Vec<String> },
}

impl ShipError {
    /// Record problems are configuration-class failures (exit code 2).
    pub fn is_record_error(&self) -> bool {
        matches!(
            self,
            Self::RecordNotFound { .. } | Self::RecordUnreadable { .. }
        )
    }
}

fn integrity_message(modified: &[DigestMismatch], missing: &[String]) -> String {
    let mut lines = vec![format!(
        "Integrity violation: {} modified, {} missing since verification",
        modified.len(),
        missing.len()
    )];
    for m in modified {
        lines.push(format!(
            "  modified: {} (expected {}, actual {})",
            m.path, m.expected, m.actual
        ));
    }
    for path in missing {
        lines.push(format!("  missing:  {}", path));
    }
    lines.join("\n")
}

/// Failures from the `git` / `gh` command-line collaborators.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("`{tool}` is not available")]
    Unavailable { tool: String },

    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_error_timeout_is_distinct_from_transport() {
        let timeout = ReviewError::Timeout { secs: 30 };
        let transport = ReviewError::Transport("connection refused".into());
        assert!(timeout.is_timeout());
        assert!(!transport.is_timeout());
        assert!(timeout.to_string().contains("30"));
    }

    #[test]
    fn review_error_retryable_classification() {
        assert!(ReviewError::Timeout { secs: 30 }.is_retryable());
        assert!(ReviewError::Transport("reset".into()).is_retryable());
        let rate_limited = ReviewError::Api {
            status: 429,
            kind: "rate_limit_error".into(),
            message: "slow down".into(),
        };
        assert!(rate_limited.is_retryable());
        let bad_request = ReviewError::Api {
            status: 400,
            kind: "invalid_request_error".into(),
            message: "bad".into(),
        };
        assert!(!bad_request.is_retryable());
    }

    #[test]
    fn integrity_violation_names_every_file() {
        let err = ShipError::IntegrityViolation {
            modified: vec![DigestMismatch {
                path: "src/a.rs".into(),
                expected: "aaaaaaaaaaaa".into(),
                actual: "bbbbbbbbbbbb".into(),
            }],
            missing: vec!["src/b.rs".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("src/a.rs"));
        assert!(msg.contains("expected aaaaaaaaaaaa"));
        assert!(msg.contains("actual bbbbbbbbbbbb"));
        assert!(msg.contains("missing:  src/b.rs"));
        assert!(!err.is_record_error());
    }

    #[test]
    fn record_not_found_is_record_error() {
        let err = ShipError::RecordNotFound {
            path: PathBuf::from(".shipgate/verification.json"),
        };
        assert!(err.is_record_error());
        assert!(err.to_string().contains("shipgate verify"));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&ConfigError::MissingCredential {
            var: "ANTHROPIC_API_KEY".into(),
        });
        assert_std_error(&HashError::NotFound {
            path: PathBuf::from("a"),
        });
        assert_std_error(&GateExecutionError::TimedOut {
            command: "sleep 5".into(),
            secs: 1,
        });
        assert_std_error(&ReviewError::Transport("x".into()));
        assert_std_error(&ShipError::GatesFailed {
            failed: vec!["tests".into()],
        });
        assert_std_error(&CollaboratorError::Unavailable { tool: "gh".into() });
    }
}
