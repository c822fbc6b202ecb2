//! The two release-gating phases.
//!
//! - [`verify`]: run every gate and persist a verification record
//! - [`ship`]: re-check integrity against the record and decide

pub mod ship;
pub mod verify;

pub use ship::{Approved, Decided, Denied, ReleaseOutcome, ReleaseRequest, ShipDecision, ShipVerdict};
pub use verify::{NoopObserver, Verifier, VerifyObserver, VerifyOptions, VerifyStep};
