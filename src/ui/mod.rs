pub mod icons;
pub mod progress;
pub mod report;

pub use progress::VerifyProgress;
pub use report::{render_decision, render_record, render_release, render_review_gate};
