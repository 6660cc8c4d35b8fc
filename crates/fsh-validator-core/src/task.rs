//! Validation tasks and per-instance outcomes

use crate::artifact::ArtifactKind;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// What an instance is validated against
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TargetProfile {
    /// Profile declared in `meta.profile`; the validator picks it up from the
    /// instance itself
    Declared { url: String },

    /// No declared profile; validated against the core base type
    BaseType { resource_type: String, url: String },
}

impl TargetProfile {
    pub fn url(&self) -> &str {
        match self {
            TargetProfile::Declared { url } | TargetProfile::BaseType { url, .. } => url,
        }
    }

    /// Value for the validator's `-profile` argument
    pub fn profile_argument(&self) -> Option<&str> {
        match self {
            TargetProfile::Declared { .. } => None,
            TargetProfile::BaseType { url, .. } => Some(url),
        }
    }
}

/// One instance to hand to the validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationTask {
    /// Position in selection order
    pub seq: usize,

    /// Instance id
    pub instance: String,

    pub resource_type: String,

    /// Generated file passed to the validator
    pub file: PathBuf,

    /// FSH file declaring the instance, relative to `input/fsh/`
    pub source: PathBuf,

    pub target: TargetProfile,
}

/// Why an instance was not validated
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// No declared profile and no core base type to fall back on
    UnresolvedProfile { resource_type: String },

    /// Declared profile is abstract
    AbstractProfileTarget { profile: String },

    /// Instance uses a code system from `exclude_code_systems`
    ExcludedCodeSystem { systems: Vec<String> },

    /// Resource type listed in `exclude_resource_types`
    ExcludedResourceType { resource_type: String },

    /// Declared with `Instance:` but generated as a conformance resource
    NotAnInstance { generated_as: ArtifactKind },
}

impl SkipReason {
    /// Short name of the check that fired
    pub fn code(&self) -> &'static str {
        match self {
            SkipReason::UnresolvedProfile { .. } => "unresolved-profile",
            SkipReason::AbstractProfileTarget { .. } => "abstract-profile-target",
            SkipReason::ExcludedCodeSystem { .. } => "excluded-code-system",
            SkipReason::ExcludedResourceType { .. } => "excluded-resource-type",
            SkipReason::NotAnInstance { .. } => "not-an-instance",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnresolvedProfile { resource_type } => write!(
                f,
                "no profile declared and '{resource_type}' is not a FHIR core resource"
            ),
            SkipReason::AbstractProfileTarget { profile } => {
                write!(f, "target profile {profile} is abstract")
            }
            SkipReason::ExcludedCodeSystem { systems } => {
                write!(f, "excluded code system(s) used: {}", systems.join(", "))
            }
            SkipReason::ExcludedResourceType { resource_type } => {
                write!(f, "excluded resource type {resource_type}")
            }
            SkipReason::NotAnInstance { generated_as } => {
                write!(f, "generated as a {generated_as}, which is not a validation target")
            }
        }
    }
}

/// Per-instance result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Passed {
        warnings: Vec<String>,
        notes: Vec<String>,
    },
    Failed {
        diagnostics: Vec<String>,
    },
    Skipped {
        reason: SkipReason,
    },
}

impl Outcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }

    /// Short status label
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Passed { warnings, .. } if !warnings.is_empty() => "warning",
            Outcome::Passed { .. } => "passed",
            Outcome::Failed { .. } => "failed",
            Outcome::Skipped { .. } => "skipped",
        }
    }
}

/// Outcome of one selected instance (or one uncovered profile)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    /// Position in selection order
    pub seq: usize,

    /// Instance id; empty for profile-level results
    pub instance: String,

    /// Target profile URL, if one was determined
    pub profile: Option<String>,

    pub outcome: Outcome,

    /// Raw validator output block for this instance
    #[serde(skip)]
    pub output: Option<String>,
}

impl ValidationResult {
    pub fn failed(
        seq: usize,
        instance: impl Into<String>,
        profile: Option<String>,
        diagnostics: Vec<String>,
    ) -> Self {
        Self {
            seq,
            instance: instance.into(),
            profile,
            outcome: Outcome::Failed { diagnostics },
            output: None,
        }
    }

    pub fn skipped(
        seq: usize,
        instance: impl Into<String>,
        profile: Option<String>,
        reason: SkipReason,
    ) -> Self {
        Self {
            seq,
            instance: instance.into(),
            profile,
            outcome: Outcome::Skipped { reason },
            output: None,
        }
    }

    /// Failed result for every task of a batch that failed as a whole
    pub fn batch_failure(task: &ValidationTask, diagnostic: &str, output: Option<String>) -> Self {
        Self {
            seq: task.seq,
            instance: task.instance.clone(),
            profile: Some(task.target.url().to_string()),
            outcome: Outcome::Failed {
                diagnostics: vec![diagnostic.to_string()],
            },
            output,
        }
    }
}
