//! Build output formatting
use crate::builder::BuildReport;
use crate::tasks::TaskOutcome;
use std::fmt::Write;

/// How much the build prints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Per-unit summary
    Normal,
    /// Per-unit summary plus every task
    Verbose,
    /// Failures only
    Quiet,
    /// Machine-readable report
    Json,
}

/// Render a build report for a terminal.
///
/// JSON mode renders nothing here; callers serialize the report themselves.
pub fn render_report(report: &BuildReport, mode: OutputMode) -> String {
    let mut out = String::new();
    if mode == OutputMode::Json {
        return out;
    }

    for unit in &report.units {
        let failed = matches!(unit.outcome, TaskOutcome::Failed | TaskOutcome::Skipped);
        if mode == OutputMode::Quiet && !failed {
            continue;
        }

        let _ = writeln!(out, "{} {}", unit.name, unit.outcome);
        if mode == OutputMode::Verbose {
            for task in &unit.tasks {
                let _ = writeln!(out, "  :{}:{} {}", unit.name, task.name, task.outcome);
            }
        }
        if let Some(archive) = &unit.archive {
            if mode != OutputMode::Quiet {
                let marker = if unit.multi_release { " (multi-release)" } else { "" };
                let _ = writeln!(out, "  archive: {}{}", archive.display(), marker);
            }
        }
        for warning in &unit.warnings {
            let location = match (warning.release, &warning.entry) {
                (Some(release), Some(entry)) => format!("release {} {}: ", release, entry),
                (Some(release), None) => format!("release {}: ", release),
                _ => String::new(),
            };
            let _ = writeln!(out, "  warning: {}{}", location, warning.message);
        }
        if let Some(error) = &unit.error {
            let _ = writeln!(out, "  error: {}", error);
        }
    }

    if mode != OutputMode::Quiet {
        let status = if report.success() { "BUILD SUCCESSFUL" } else { "BUILD FAILED" };
        let _ = writeln!(out, "{} in {:.2}s", status, report.total_time.as_secs_f64());
    }
    out
}
