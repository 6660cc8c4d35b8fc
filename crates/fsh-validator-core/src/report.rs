//! Aggregated run report

use crate::task::{Outcome, ValidationResult};
use serde::Serialize;

/// Exit code when every selected instance passed or was skipped
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code when at least one result failed
pub const EXIT_VALIDATION_FAILED: i32 = 1;

/// Exit code for errors that abort the run before validation
pub const EXIT_FATAL: i32 = 2;

/// Outcome counts and per-instance results of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Passed results that carry warnings
    pub with_warnings: usize,
    results: Vec<ValidationResult>,
}

impl Report {
    /// Combine results in selection order
    pub fn aggregate(results: impl IntoIterator<Item = ValidationResult>) -> Self {
        let mut results: Vec<ValidationResult> = results.into_iter().collect();
        results.sort_by_key(|r| r.seq);

        let mut report = Report {
            passed: 0,
            failed: 0,
            skipped: 0,
            with_warnings: 0,
            results: Vec::new(),
        };
        for result in &results {
            match &result.outcome {
                Outcome::Passed { warnings, .. } => {
                    report.passed += 1;
                    if !warnings.is_empty() {
                        report.with_warnings += 1;
                    }
                }
                Outcome::Failed { .. } => report.failed += 1,
                Outcome::Skipped { .. } => report.skipped += 1,
            }
        }
        report.results = results;
        report
    }

    pub fn results(&self) -> &[ValidationResult] {
        &self.results
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results.iter().filter(|r| r.outcome.is_failed())
    }

    pub fn skips(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Skipped { .. }))
    }

    /// False iff any result failed
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            EXIT_SUCCESS
        } else {
            EXIT_VALIDATION_FAILED
        }
    }
}
