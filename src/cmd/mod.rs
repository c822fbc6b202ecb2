//! CLI command implementations.
//!
//! | Module   | Commands handled |
//! |----------|------------------|
//! | `verify` | `Verify`         |
//! | `ship`   | `Ship`           |
//! | `review` | `Review`         |
//! | `status` | `Status`         |
//! | `config` | `Config`         |
//!
//! Commands return the process exit code; errors are mapped to exit codes in `main`.

pub mod config;
pub mod review;
pub mod ship;
pub mod status;
pub mod verify;

pub use config::cmd_config;
pub use review::{ReviewArgs, cmd_review};
pub use ship::cmd_ship;
pub use status::cmd_status;
pub use verify::{VerifyArgs, cmd_verify};
