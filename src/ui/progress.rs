use crate::gates::GateStatus;
use crate::orchestrator::{VerifyObserver, VerifyStep};
use crate::ui::icons::{CHECK, CROSS, SKIP};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner for a verify or review run.
///
/// One line is printed per finished step; the spinner only shows the step in
/// flight. When stderr is not a terminal the spinner stays hidden and the
/// step lines still go to stdout.
pub struct VerifyProgress {
    bar: ProgressBar,
}

impl VerifyProgress {
    pub fn new() -> Self {
        let spinner_style = ProgressStyle::with_template("{prefix:.bold.dim} {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        let bar = ProgressBar::new_spinner();
        bar.set_style(spinner_style);
        bar.set_prefix("verify");
        Self { bar }
    }

    /// Print a line without tearing the spinner.
    fn print_line(&self, msg: impl AsRef<str>) {
        self.bar.suspend(|| println!("{}", msg.as_ref()));
    }

    /// Stop the spinner and clear its line.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for VerifyProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl VerifyObserver for VerifyProgress {
    fn started(&self, step: VerifyStep) {
        self.bar
            .set_message(format!("Running {}...", style(step).cyan()));
        self.bar.enable_steady_tick(Duration::from_millis(100));
    }

    fn finished(&self, step: VerifyStep, status: GateStatus) {
        self.print_line(step_line(step, status));
    }
}

/// One finished-step line, e.g. `✅ tests passed`.
pub fn step_line(step: VerifyStep, status: GateStatus) -> String {
    match status {
        GateStatus::Passed => format!("{}{} {}", CHECK, step, style("passed").green()),
        GateStatus::Failed => format!("{}{} {}", CROSS, step, style("failed").red().bold()),
        GateStatus::Skipped => format!("{}{} {}", SKIP, step, style("skipped").dim()),
    }
}
