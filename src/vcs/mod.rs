//! Command-line collaborators.
//!
//! - [`git`]: tracked files, branches and diffs
//! - [`github`]: pull request creation and release planning

pub mod git;
pub mod github;

pub use git::Git;
pub use github::{GhCli, PullRequest, ReleasePlan, plan_release};
