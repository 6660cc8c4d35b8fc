//! FSH Validator Core
//!
//! Discovery and batch-validation orchestration for FHIR Shorthand (FSH)
//! projects. The crate indexes the transpiler output, resolves profile
//! inheritance, selects the instances to validate and drives the external
//! HL7 FHIR validator in batches.

pub mod alias;
pub mod artifact;
pub mod batch;
pub mod config;
pub mod error;
pub mod exclusion;
pub mod fhir_resources;
pub mod fsh_source;
pub mod index;
pub mod logs;
pub mod pipeline;
pub mod repair;
pub mod report;
pub mod resolver;
pub mod result;
pub mod selector;
pub mod task;
pub mod transpiler;
pub mod validator_output;

// Re-export commonly used types
pub use alias::{Alias, AliasTable, AliasTableBuilder};
pub use artifact::{Artifact, ArtifactKind, Coding};
pub use batch::{Batch, BatchOptions, BatchValidator, plan_batches};
pub use config::{ExclusionConfig, PackageDependency, ProjectLayout, SushiProject, ValidatorConfig};
pub use error::ValidatorError;
pub use exclusion::ExclusionPolicy;
pub use index::ArtifactIndex;
pub use pipeline::{Pipeline, Project};
pub use report::{EXIT_FATAL, EXIT_SUCCESS, EXIT_VALIDATION_FAILED, Report};
pub use resolver::{ProfileResolver, ResolvedProfile};
pub use result::Result;
pub use selector::{InstanceSelector, Selected, Selection, SelectionFilter, UncoveredProfile};
pub use task::{Outcome, SkipReason, TargetProfile, ValidationResult, ValidationTask};
pub use transpiler::Transpiler;

/// Default log filter when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "fsh_validator=info";

/// Initialize the tracing subscriber for logging
///
/// `RUST_LOG` wins over `default_filter`. Logs go to stderr so that report
/// output on stdout stays machine-readable.
pub fn init_tracing(default_filter: &str) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
