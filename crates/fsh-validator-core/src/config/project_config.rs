//! Project-level exclusion configuration (`.fsh-validator.yml`)

use crate::error::ValidatorError;
use crate::result::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// File name looked up in the project base directory
pub const PROJECT_CONFIG_FILE: &str = ".fsh-validator.yml";

/// Exclusion lists read from the project configuration
///
/// Both lists default to empty, so a missing file or missing key means
/// nothing is excluded.
///
/// ```yaml
/// exclude_code_systems:
///   - http://loinc.org
/// exclude_resource_types:
///   - Bundle
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExclusionConfig {
    /// Code-system URIs whose presence in an instance prevents validation
    pub exclude_code_systems: BTreeSet<String>,

    /// Resource types that are never validated
    #[serde(alias = "exclude_resource_type")]
    pub exclude_resource_types: BTreeSet<String>,
}

impl ExclusionConfig {
    /// Load the configuration from the project base path
    ///
    /// Returns the empty configuration when the file does not exist.
    pub fn load(base_path: &Path) -> Result<Self> {
        let path = base_path.join(PROJECT_CONFIG_FILE);
        if !path.is_file() {
            tracing::debug!("No {} found, nothing excluded", PROJECT_CONFIG_FILE);
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&path).map_err(|e| ValidatorError::io_error(&path, e))?;
        Self::from_yaml(&contents).map_err(|e| {
            ValidatorError::config_error(format!("Failed to parse {}: {e}", path.display()))
        })
    }

    /// Parse from YAML string; an empty document is the empty configuration
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Option<Self> = serde_yaml::from_str(yaml)?;
        Ok(config.unwrap_or_default())
    }
}
