//! Exclusion policy
//!
//! Two independent denylists from `.fsh-validator.yml`. Either one firing is
//! enough to skip an instance; the returned reason names the list that fired.

use crate::artifact::Artifact;
use crate::config::ExclusionConfig;
use crate::task::SkipReason;

/// Immutable exclusion rules for one run
#[derive(Debug, Clone, Default)]
pub struct ExclusionPolicy {
    config: ExclusionConfig,
}

impl ExclusionPolicy {
    pub fn new(config: ExclusionConfig) -> Self {
        Self { config }
    }

    /// Policy that never skips anything
    pub fn none() -> Self {
        Self::default()
    }

    /// Decide whether `instance` must be skipped
    pub fn should_skip(&self, instance: &Artifact) -> Option<SkipReason> {
        if self.config.exclude_resource_types.contains(&instance.resource_type) {
            return Some(SkipReason::ExcludedResourceType {
                resource_type: instance.resource_type.clone(),
            });
        }

        let systems: Vec<String> = instance
            .code_systems()
            .into_iter()
            .filter(|system| self.config.exclude_code_systems.contains(*system))
            .map(str::to_string)
            .collect();
        if !systems.is_empty() {
            return Some(SkipReason::ExcludedCodeSystem { systems });
        }

        None
    }

    pub fn is_empty(&self) -> bool {
        self.config.exclude_code_systems.is_empty()
            && self.config.exclude_resource_types.is_empty()
    }
}
