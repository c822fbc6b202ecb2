pub mod config;
pub mod errors;
pub mod gates;
pub mod hasher;
pub mod orchestrator;
pub mod record;
pub mod review;
pub mod telemetry;
pub mod ui;
pub mod vcs;
