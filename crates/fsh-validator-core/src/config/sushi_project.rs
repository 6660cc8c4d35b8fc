//! Reader for the parts of `sushi-config.yaml` the validator needs
//!
//! Only the IG id, the FHIR version and the package dependencies matter here;
//! every other key is ignored.
//!
//! ```yaml
//! canonical: http://example.org/fhir/example-ig
//! id: example.fhir.ig
//! fhirVersion: 4.0.1
//! dependencies:
//!   hl7.fhir.us.core: 5.0.1
//!   de.medizininformatikinitiative.kerndatensatz.labor:
//!     version: 1.0.6
//! ```

use crate::error::ValidatorError;
use crate::result::Result;
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

/// File name of the transpiler project configuration
pub const SUSHI_CONFIG_FILE: &str = "sushi-config.yaml";

/// Subset of the SUSHI project configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SushiProject {
    /// IG identifier
    #[serde(default)]
    pub id: Option<String>,

    /// Canonical base URL of the IG
    #[serde(default)]
    pub canonical: Option<String>,

    /// FHIR version(s) - can be single string or array
    #[serde(deserialize_with = "deserialize_fhir_version")]
    pub fhir_version: Vec<String>,

    /// Package dependencies (package-id: version)
    #[serde(default)]
    pub dependencies: IndexMap<String, DependencyVersion>,
}

/// Dependency version - can be string or object
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DependencyVersion {
    /// Simple version string
    Simple(String),

    /// Dependency with additional properties
    Complex { version: String },
}

impl DependencyVersion {
    pub fn version(&self) -> &str {
        match self {
            DependencyVersion::Simple(v) => v,
            DependencyVersion::Complex { version } => version,
        }
    }
}

/// A FHIR package the validator has to load, as `package#version`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageDependency {
    pub package_id: String,
    pub version: String,
}

impl PackageDependency {
    pub fn new(package_id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            package_id: package_id.into(),
            version: version.into(),
        }
    }

    /// Validator `-ig` argument value
    pub fn coordinate(&self) -> String {
        format!("{}#{}", self.package_id, self.version)
    }
}

impl SushiProject {
    /// Load `sushi-config.yaml` from the project base path
    pub fn load(base_path: &Path) -> Result<Self> {
        let path = base_path.join(SUSHI_CONFIG_FILE);
        if !path.is_file() {
            return Err(ValidatorError::config_error(format!(
                "Could not find {}",
                path.display()
            )));
        }

        let contents =
            std::fs::read_to_string(&path).map_err(|e| ValidatorError::io_error(&path, e))?;

        Self::from_yaml(&contents).map_err(|e| {
            ValidatorError::config_error(format!("Failed to parse {}: {e}", path.display()))
        })
    }

    /// Parse from YAML string
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// FHIR version handed to the validator (first configured version)
    pub fn primary_fhir_version(&self) -> &str {
        self.fhir_version
            .first()
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Declared dependencies in declaration order
    pub fn package_dependencies(&self) -> Vec<PackageDependency> {
        self.dependencies
            .iter()
            .map(|(id, v)| PackageDependency::new(id, v.version()))
            .collect()
    }
}

fn deserialize_fhir_version<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FhirVersionValue {
        Single(String),
        Multiple(Vec<String>),
    }

    match FhirVersionValue::deserialize(deserializer)? {
        FhirVersionValue::Single(s) => Ok(vec![s]),
        FhirVersionValue::Multiple(v) => {
            if v.is_empty() {
                Err(D::Error::custom("fhirVersion array cannot be empty"))
            } else {
                Ok(v)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_single_fhir_version() {
        let yaml = r#"
id: example.fhir.ig
canonical: http://example.org/fhir/example-ig
fhirVersion: 4.0.1
"#;
        let project = SushiProject::from_yaml(yaml).unwrap();
        assert_eq!(project.id.as_deref(), Some("example.fhir.ig"));
        assert_eq!(project.primary_fhir_version(), "4.0.1");
        assert!(project.package_dependencies().is_empty());
    }

    #[test]
    fn test_parse_version_list_and_dependencies() {
        let yaml = r#"
id: mii.example
fhirVersion: [4.0.1, 4.3.0]
dependencies:
  hl7.fhir.us.core: 5.0.1
  de.medizininformatikinitiative.kerndatensatz.labor:
    version: 1.0.6
    uri: http://example.org/ImplementationGuide/labor
"#;
        let project = SushiProject::from_yaml(yaml).unwrap();
        assert_eq!(project.fhir_version, vec!["4.0.1", "4.3.0"]);
        assert_eq!(project.primary_fhir_version(), "4.0.1");

        let deps = project.package_dependencies();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].coordinate(), "hl7.fhir.us.core#5.0.1");
        assert_eq!(
            deps[1].coordinate(),
            "de.medizininformatikinitiative.kerndatensatz.labor#1.0.6"
        );
    }

    #[test]
    fn test_empty_version_list_rejected() {
        assert!(SushiProject::from_yaml("fhirVersion: []").is_err());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = SushiProject::load(temp_dir.path()).unwrap_err();
        assert!(matches!(err, ValidatorError::ConfigError { .. }));
    }
}
