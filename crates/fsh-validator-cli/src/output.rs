//! Report output
//!
//! Human output lists every instance with its status followed by a summary;
//! JSON output is the serialized report.

use crate::OutputFormat;
use colored::*;
use fsh_validator_core::{Outcome, Report, Result, ValidationResult, ValidatorError};

/// Prints a finished report in the selected format
pub struct ReportPrinter {
    format: OutputFormat,
}

impl ReportPrinter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn print(&self, report: &Report) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                print!("{}", render_human(report));
                Ok(())
            }
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(report).map_err(|e| {
                    ValidatorError::internal_error(format!("Failed to serialize report: {e}"))
                })?;
                println!("{json}");
                Ok(())
            }
        }
    }
}

fn status_label(result: &ValidationResult) -> ColoredString {
    let label = format!("{:<8}", result.outcome.label());
    match result.outcome.label() {
        "passed" => label.green(),
        "warning" => label.yellow(),
        "failed" => label.red().bold(),
        _ => label.dimmed(),
    }
}

/// Per-instance listing and summary
pub fn render_human(report: &Report) -> String {
    let mut out = String::new();

    for result in report.results() {
        let name = if result.instance.is_empty() {
            result.profile.as_deref().unwrap_or("-")
        } else {
            result.instance.as_str()
        };
        out.push_str(&format!("  {} {}", status_label(result), name.bold()));
        if let Some(profile) = &result.profile
            && !result.instance.is_empty()
        {
            out.push_str(&format!(" {}", format!("({profile})").dimmed()));
        }
        out.push('\n');

        match &result.outcome {
            Outcome::Failed { diagnostics } => {
                for diagnostic in diagnostics {
                    out.push_str(&format!("      {}\n", diagnostic.red()));
                }
            }
            Outcome::Passed { warnings, .. } => {
                for warning in warnings {
                    out.push_str(&format!("      {}\n", warning.yellow()));
                }
            }
            Outcome::Skipped { reason } => {
                out.push_str(&format!("      {}\n", reason.to_string().dimmed()));
            }
        }
    }

    out.push_str(&format!("\n{}\n", "Summary:".bold()));
    out.push_str(&format!(
        "  Passed:  {} ({} with warnings)\n",
        report.passed.to_string().green(),
        report.with_warnings
    ));
    out.push_str(&format!("  Failed:  {}\n", report.failed.to_string().red()));
    out.push_str(&format!("  Skipped: {}\n", report.skipped));

    if report.is_success() {
        out.push_str(&format!("\n{}\n", "All instances validated successfully".green().bold()));
    } else {
        out.push_str(&format!("\n{}\n", "Errors during instance validation".red().bold()));
    }
    out
}
