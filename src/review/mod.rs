//! AI code review for the release gate.
//!
//! ## Components
//!
//! - [`findings`]: verdict and finding types
//! - [`parser`]: extraction of a verdict from free-form model text
//! - [`client`]: the reviewer endpoint seam and its HTTP implementation
//! - [`context`]: code context assembly (diff or full tree)
//! - [`prompts`]: security and quality prompts
//!
//! ## Example
//!
//! ```
//! use shipgate::review::{ReviewKind, parse_review};
//!
//! let text = "Here you go:\n```json\n{\"riskLevel\": \"LOW\", \"summary\": \"clean\", \"findings\": []}\n```";
//! let verdict = parse_review(ReviewKind::Security, text);
//! assert!(!verdict.raw);
//! assert!(verdict.passes());
//! ```

pub mod client;
pub mod context;
pub mod findings;
pub mod parser;
pub mod prompts;

pub use client::{HttpReviewer, ReviewerClient};
pub use context::{ContextOptions, ReviewContext, build_context};
pub use findings::{QualityTier, ReviewFinding, ReviewKind, ReviewVerdict, RiskLevel, Severity};
pub use parser::{ParseStrategy, StrategyOutcome, parse_review};
