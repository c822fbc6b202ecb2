//! Plain-text reports for records, review gates and ship decisions.
//!
//! Renderers return strings so the command layer decides where they go.

use crate::gates::{GateResult, GateStatus};
use crate::orchestrator::{ReleaseOutcome, ShipDecision, ShipVerdict};
use crate::record::{ReviewGate, VerificationRecord};
use crate::review::{ReviewVerdict, Severity};
use crate::ui::icons::{CHECK, CLOCK, CROSS, FILE_DEL, FILE_MOD, LOCK, REVIEW, SHIP, SKIP, WARN};
use console::{Emoji, style};
use std::fmt::Write;

/// Findings listed per verdict before the rest are summarized.
const MAX_LISTED_FINDINGS: usize = 10;

fn status_icon(status: GateStatus) -> Emoji<'static, 'static> {
    match status {
        GateStatus::Passed => CHECK,
        GateStatus::Failed => CROSS,
        GateStatus::Skipped => SKIP,
    }
}

fn status_word(status: GateStatus) -> String {
    match status {
        GateStatus::Passed => style("passed").green().to_string(),
        GateStatus::Failed => style("failed").red().bold().to_string(),
        GateStatus::Skipped => style("skipped").dim().to_string(),
    }
}

fn gate_line(name: &str, gate: &GateResult) -> String {
    let mut line = format!("  {}{:<10} {}", status_icon(gate.status), name, status_word(gate.status));
    let mut details = Vec::new();
    if let Some(code) = gate.exit_code {
        details.push(format!("exit {}", code));
    }
    if let Some(ms) = gate.duration_ms {
        details.push(format!("{}ms", ms));
    }
    if let Some(audit) = &gate.audit
        && let Some(counts) = &audit.counts
    {
        details.push(format!(
            "{} critical, {} high, {} moderate, {} low",
            counts.critical, counts.high, counts.moderate, counts.low
        ));
    }
    if !details.is_empty() {
        let _ = write!(line, " ({})", details.join(", "));
    }
    if let Some(reason) = &gate.reason {
        let _ = write!(line, ": {}", reason);
    }
    line
}

/// Last few lines of a failed gate's output.
fn output_tail(gate: &GateResult, lines: usize) -> Option<String> {
    let text = gate
        .stderr
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .or(gate.stdout.as_deref())?;
    let all: Vec<&str> = text.trim_end().lines().collect();
    if all.is_empty() {
        return None;
    }
    let start = all.len().saturating_sub(lines);
    Some(
        all[start..]
            .iter()
            .map(|l| format!("      {}", style(l).dim()))
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

fn verdict_lines(out: &mut String, verdict: &ReviewVerdict) {
    let label = if verdict.raw {
        style("INCONCLUSIVE".to_string()).yellow()
    } else if verdict.passes() {
        style(verdict.tier_label()).green()
    } else {
        style(verdict.tier_label()).red().bold()
    };
    let _ = writeln!(out, "    {} review: {}", verdict.kind, label);
    if !verdict.summary.is_empty() && !verdict.raw {
        let _ = writeln!(out, "      {}", style(&verdict.summary).dim());
    }

    let sorted = verdict.sorted_findings();
    for finding in sorted.iter().take(MAX_LISTED_FINDINGS) {
        let _ = writeln!(
            out,
            "      {} [{}] {}: {}",
            finding.severity().emoji(),
            finding.severity(),
            finding.location(),
            finding.description()
        );
        if let Some(rec) = finding.recommendation() {
            let _ = writeln!(out, "         -> {}", rec);
        }
    }
    if sorted.len() > MAX_LISTED_FINDINGS {
        let _ = writeln!(out, "      ... and {} more", sorted.len() - MAX_LISTED_FINDINGS);
    }
}

/// The review gate with its verdicts and findings.
pub fn render_review_gate(gate: &ReviewGate) -> String {
    let mut out = format!("  {}{:<10} {}", REVIEW, "AI review", status_word(gate.status));
    if let Some(model) = &gate.model {
        let _ = write!(out, " ({}", model);
        if let Some(files) = gate.files_reviewed {
            let _ = write!(out, ", {} files", files);
        }
        if gate.used_diff == Some(true) {
            out.push_str(", diff");
        }
        out.push(')');
    }
    if let Some(reason) = &gate.reason {
        let _ = write!(out, ": {}", reason);
    }
    out.push('\n');
    if let Some(err) = &gate.error {
        let _ = writeln!(
            out,
            "    {}{} error: {}{}",
            WARN,
            err.kind,
            err.message,
            if err.retryable { " (retryable)" } else { "" }
        );
    }
    for verdict in gate.verdicts() {
        verdict_lines(&mut out, verdict);
    }
    out
}

/// Full verification report.
pub fn render_record(record: &VerificationRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {} ({} files snapshotted)",
        style("Verification").bold(),
        record.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        record.files.count
    );
    for (name, gate) in [("tests", &record.tests), ("lint", &record.lint), ("audit", &record.audit)] {
        let _ = writeln!(out, "{}", gate_line(name, gate));
        if gate.status == GateStatus::Failed
            && let Some(tail) = output_tail(gate, 5)
        {
            let _ = writeln!(out, "{}", tail);
        }
    }
    out.push_str(&render_review_gate(&record.ai_review));

    let findings: Vec<String> = Severity::all()
        .iter()
        .map(|s| (s, record.count_findings(*s)))
        .filter(|(_, n)| *n > 0)
        .map(|(s, n)| format!("{} {}", n, s))
        .collect();
    if !findings.is_empty() {
        let _ = writeln!(out, "  findings: {}", findings.join(", "));
    }

    if record.summary.overall_pass {
        let _ = writeln!(out, "{}Overall: {}", CHECK, style("PASS").green().bold());
    } else {
        let _ = writeln!(
            out,
            "{}Overall: {} (failed: {})",
            CROSS,
            style("FAIL").red().bold(),
            record.failed_gates().join(", ")
        );
    }
    out
}

/// Integrity, staleness and the allow/deny verdict.
pub fn render_decision(decision: &ShipDecision) -> String {
    let mut out = String::new();
    let integrity = &decision.integrity;
    if integrity.is_clean() {
        let _ = writeln!(
            out,
            "{}{} files match the verified snapshot",
            LOCK,
            integrity.verified.len()
        );
    } else {
        let _ = writeln!(
            out,
            "{}{} of {} files changed since verification",
            CROSS,
            integrity.modified.len() + integrity.missing.len(),
            integrity.checked()
        );
        for m in &integrity.modified {
            let _ = writeln!(out, "  {}{}", FILE_MOD, style(&m.path).yellow());
        }
        for path in &integrity.missing {
            let _ = writeln!(out, "  {}{}", FILE_DEL, style(path).red());
        }
    }

    if let Some(warning) = &decision.stale_warning {
        let _ = writeln!(out, "{}{}", CLOCK, style(warning).yellow());
    }

    match &decision.verdict {
        ShipVerdict::Allow => {
            let _ = writeln!(out, "{}{}", SHIP, style("Ship allowed").green().bold());
        }
        ShipVerdict::Deny(reasons) => {
            let _ = writeln!(out, "{}{}", CROSS, style("Ship denied").red().bold());
            for reason in reasons {
                let _ = writeln!(out, "  - {}", reason);
            }
        }
    }
    out
}

/// What the release action did.
pub fn render_release(outcome: &ReleaseOutcome) -> String {
    match outcome {
        ReleaseOutcome::NotRequested => String::new(),
        ReleaseOutcome::Skipped { reason } => {
            format!("{}Pull request skipped: {}\n", SKIP, reason)
        }
        ReleaseOutcome::DryRun(pr) => {
            let mut out = format!("{}Dry run, nothing pushed. Planned:\n", SHIP);
            let _ = writeln!(out, "  git push -u origin {}", pr.branch);
            let _ = writeln!(
                out,
                "  gh pr create --base {} --head {} --title {:?} --body <below>",
                pr.base, pr.branch, pr.title
            );
            let _ = writeln!(out);
            for line in pr.body.lines() {
                let _ = writeln!(out, "  {}", line);
            }
            out
        }
        ReleaseOutcome::Created { pr, url } => {
            format!("{}Pull request created for {}: {}\n", SHIP, pr.branch, style(url).cyan())
        }
    }
}
