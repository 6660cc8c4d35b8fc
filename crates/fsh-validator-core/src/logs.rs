//! Summary log files
//!
//! Every run with a log directory leaves three files named
//! `validation_<timestamp>`: a `.log` with the raw validator output per
//! instance, a `.md` table and a `.json` dump of the report.

use crate::error::ValidatorError;
use crate::report::Report;
use crate::result::Result;
use crate::task::{Outcome, ValidationResult};
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Base name shared by the summary files and the batch log directory
pub fn run_basename(started: DateTime<Local>) -> String {
    format!("validation_{}", started.format("%y%m%dT%H%M%S"))
}

/// Paths of the written summary files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryFiles {
    pub log: PathBuf,
    pub markdown: PathBuf,
    pub json: PathBuf,
}

/// Write the `.log`, `.md` and `.json` summaries for `report`
pub fn write_summary(report: &Report, log_dir: &Path, basename: &str) -> Result<SummaryFiles> {
    fs::create_dir_all(log_dir).map_err(|e| ValidatorError::io_error(log_dir, e))?;

    let files = SummaryFiles {
        log: log_dir.join(format!("{basename}.log")),
        markdown: log_dir.join(format!("{basename}.md")),
        json: log_dir.join(format!("{basename}.json")),
    };

    write_file(&files.log, &render_log(report))?;
    write_file(&files.markdown, &render_markdown(report))?;

    let json = serde_json::to_string_pretty(report)
        .map_err(|e| ValidatorError::internal_error(format!("Could not serialize report: {e}")))?;
    write_file(&files.json, &json)?;

    info!("Wrote summary logs to {}", files.log.display());
    Ok(files)
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(|e| ValidatorError::io_error(path, e))
}

fn heading(result: &ValidationResult) -> String {
    match (&result.instance, &result.profile) {
        (instance, Some(profile)) if !instance.is_empty() => {
            format!("Validating {instance} on profile {profile}")
        }
        (instance, None) if !instance.is_empty() => format!("Instance {instance}"),
        (_, profile) => format!("Profile {}", profile.as_deref().unwrap_or("-")),
    }
}

/// Raw output per result, each under a boxed heading
pub fn render_log(report: &Report) -> String {
    let mut out = String::new();
    for result in report.results() {
        let title = heading(result);
        let rule = "=".repeat(title.len() + 4);
        let _ = writeln!(out, "{rule}\n| {title} |\n{rule}");

        match (&result.output, &result.outcome) {
            (Some(output), _) => out.push_str(output),
            (None, Outcome::Skipped { reason }) => {
                let _ = write!(out, "Skipped: {reason}");
            }
            (None, Outcome::Failed { diagnostics }) => out.push_str(&diagnostics.join("\n")),
            (None, Outcome::Passed { .. }) => {}
        }
        out.push_str("\n\n");
    }
    out
}

/// One table row per result
pub fn render_markdown(report: &Report) -> String {
    let mut out = String::from(
        "| status | instance | profile | errors | warnings | notes |\n\
         |--------|----------|---------|--------|----------|-------|\n",
    );
    for result in report.results() {
        let (errors, warnings, notes) = match &result.outcome {
            Outcome::Passed { warnings, notes } => (0, warnings.len(), notes.len()),
            Outcome::Failed { diagnostics } => (diagnostics.len(), 0, 0),
            Outcome::Skipped { .. } => (0, 0, 0),
        };
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} |",
            result.outcome.label(),
            result.instance,
            result.profile.as_deref().unwrap_or(""),
            errors,
            warnings,
            notes
        );
    }
    let _ = writeln!(
        out,
        "\n{} passed ({} with warnings), {} failed, {} skipped",
        report.passed, report.with_warnings, report.failed, report.skipped
    );
    out
}
