//! Configuration for validation runs
//!
//! Three sources feed a run:
//! - `sushi-config.yaml` for the IG id, FHIR version and package dependencies
//! - `.fsh-validator.yml` for exclusion lists
//! - [`ValidatorConfig`], built by the command-line layer
//!
//! All of them are read once and are immutable afterwards.

pub mod layout;
pub mod options;
pub mod project_config;
pub mod sushi_project;

pub use layout::ProjectLayout;
pub use options::{DEFAULT_BATCH_SIZE, DEFAULT_BATCH_TIMEOUT, VALIDATOR_JAR, ValidatorConfig};
pub use project_config::{ExclusionConfig, PROJECT_CONFIG_FILE};
pub use sushi_project::{PackageDependency, SUSHI_CONFIG_FILE, SushiProject};
