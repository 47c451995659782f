//! Choice presentation: one line per arriving choice, plus the end-of-run summary.

use crate::choice::{Choice, FinalState};
use crate::orchestrator::RunReport;
use owo_colors::OwoColorize;

pub fn format_dispatch_banner(kind: &str, backends: &[String], color: bool) -> String {
    let names = backends.join(", ");
    if color {
        format!("{} {} with {}", "Generating".bold(), kind, names.cyan())
    } else {
        format!("Generating {} with {}", kind, names)
    }
}

/// Render one choice as it arrives. Errors are dimmed and marked.
pub fn format_live_choice(choice: &Choice, color: bool) -> String {
    match (choice.is_error, color) {
        (true, true) => format!("  {} {}", "✗".red(), choice.label.dimmed()),
        (true, false) => format!("  x {}", choice.label),
        (false, true) => format!(
            "  {} {} {}",
            "✓".green(),
            choice.label,
            format!("[{}]", choice.backend).dimmed()
        ),
        (false, false) => format!("  + {} [{}]", choice.label, choice.backend),
    }
}

pub fn format_run_summary(report: &RunReport, color: bool) -> String {
    let usable = report.selectable().count();
    let errors = report.choices.len() - usable;
    let mut summary = format!(
        "{} candidate(s), {} failed backend(s) in {:.1}s",
        usable,
        errors,
        report.elapsed.as_secs_f64()
    );
    if report.cancelled {
        summary.push_str(" (cancelled)");
    }
    if report.final_state == FinalState::AllFailed && color {
        return summary.red().to_string();
    }
    summary
}

/// Labels for the selection prompt: selectable choices only, in arrival order.
pub fn selection_items(report: &RunReport) -> Vec<String> {
    report
        .selectable()
        .map(|choice| format!("{}  ({})", choice.label, choice.backend))
        .collect()
}
