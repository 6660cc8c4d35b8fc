//! Run options for a validation pass

use crate::config::layout::ProjectLayout;
use std::path::PathBuf;
use std::time::Duration;

/// Default number of instances handed to one validator process
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Default wall-clock limit for one validator process
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(600);

/// File name of the HL7 validator CLI jar
pub const VALIDATOR_JAR: &str = "validator_cli.jar";

/// Already-parsed options for a validation run
///
/// The CLI builds this value; the core never reads arguments or the
/// environment itself.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Project directories
    pub layout: ProjectLayout,

    /// Validator executable or jar
    pub validator: PathBuf,

    /// Java binary used for `.jar` validators
    pub java: PathBuf,

    /// Maximum instances per validator invocation
    pub max_batch_size: usize,

    /// Number of validator processes allowed to run at once
    pub concurrency: usize,

    /// Time limit for a single validator invocation
    pub batch_timeout: Duration,

    /// Directory for per-batch and summary logs
    pub log_dir: Option<PathBuf>,

    /// Transpiler binary
    pub transpiler: PathBuf,

    /// Run the transpiler before indexing
    pub run_transpiler: bool,

    /// Remove duplicate codings from instance files before validation
    pub repair_duplicate_codings: bool,

    /// Forward validator output to the log while it runs
    pub verbose: bool,
}

impl ValidatorConfig {
    /// Options with defaults for a project, using the validator jar in the
    /// project base directory
    pub fn new(layout: ProjectLayout) -> Self {
        let validator = layout.base_path().join(VALIDATOR_JAR);
        Self {
            layout,
            validator,
            java: PathBuf::from("java"),
            max_batch_size: DEFAULT_BATCH_SIZE,
            concurrency: 1,
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
            log_dir: None,
            transpiler: PathBuf::from("sushi"),
            run_transpiler: true,
            repair_duplicate_codings: true,
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_use_project_jar() {
        let config = ValidatorConfig::new(ProjectLayout::new("/work/ig"));
        assert_eq!(config.validator, PathBuf::from("/work/ig/validator_cli.jar"));
        assert_eq!(config.max_batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.concurrency, 1);
        assert!(config.run_transpiler);
        assert!(config.repair_duplicate_codings);
        assert!(config.log_dir.is_none());
    }
}
