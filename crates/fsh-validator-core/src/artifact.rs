//! Typed records for generated resources

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// What a generated resource is, as far as validation is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ArtifactKind {
    Profile,
    Extension,
    ValueSet,
    CodeSystem,
    ImplementationGuide,
    Instance,
    Bundle,
}

impl ArtifactKind {
    /// Instances and Bundles are the only kinds that can be validated
    pub fn is_instance_like(self) -> bool {
        matches!(self, ArtifactKind::Instance | ArtifactKind::Bundle)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArtifactKind::Profile => "Profile",
            ArtifactKind::Extension => "Extension",
            ArtifactKind::ValueSet => "ValueSet",
            ArtifactKind::CodeSystem => "CodeSystem",
            ArtifactKind::ImplementationGuide => "ImplementationGuide",
            ArtifactKind::Instance => "Instance",
            ArtifactKind::Bundle => "Bundle",
        };
        f.write_str(s)
    }
}

/// A `(system, code)` pair found in a `coding` array
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coding {
    pub system: String,
    pub code: String,
}

impl Coding {
    pub fn new(system: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            code: code.into(),
        }
    }

    /// Read a coding object; entries without `system` carry nothing to match on
    pub fn from_json(value: &Value) -> Option<Self> {
        let system = value.get("system")?.as_str()?;
        let code = value.get("code").and_then(Value::as_str).unwrap_or_default();
        Some(Self::new(system, code))
    }
}

/// Codings collected from a resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodingScan {
    /// Deduplicated codings
    pub codings: BTreeSet<Coding>,
    /// Whether any single `coding` array repeated a pair
    pub had_duplicates: bool,
}

/// Collect every coding below `value`, recursing through nested elements
/// and contained resources
pub fn scan_codings(value: &Value) -> CodingScan {
    let mut scan = CodingScan::default();
    collect_codings(value, &mut scan);
    scan
}

fn collect_codings(value: &Value, scan: &mut CodingScan) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key == "coding"
                    && let Value::Array(items) = child
                {
                    let mut seen = BTreeSet::new();
                    for coding in items.iter().filter_map(Coding::from_json) {
                        if !seen.insert(coding.clone()) {
                            scan.had_duplicates = true;
                        }
                        scan.codings.insert(coding);
                    }
                }
                collect_codings(child, scan);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_codings(item, scan);
            }
        }
        _ => {}
    }
}

/// One generated resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub kind: ArtifactKind,

    /// `url` for conformance resources, `id` for instances
    pub canonical_id: String,

    /// Resource `id`
    pub id: String,

    /// StructureDefinition `name`
    pub name: Option<String>,

    /// `resourceType`, or the constrained `type` for StructureDefinitions
    pub resource_type: String,

    /// Resolved `baseDefinition` (profiles and extensions)
    pub derived_from: Option<String>,

    /// Resolved `meta.profile[0]` (instances and bundles)
    pub profile_ref: Option<String>,

    /// Deduplicated codings
    #[serde(skip)]
    pub codings: BTreeSet<Coding>,

    /// The generated file repeated a coding pair inside one `coding` array
    pub had_duplicate_codings: bool,

    /// `abstract` flag (profiles only)
    pub is_abstract: bool,

    /// Generated file
    pub file: PathBuf,

    /// Id of the Bundle this resource is an entry of
    pub contained_in: Option<String>,
}

impl Artifact {
    /// Code systems used anywhere in the artifact
    pub fn code_systems(&self) -> BTreeSet<&str> {
        self.codings.iter().map(|c| c.system.as_str()).collect()
    }

    /// Only standalone files can be handed to the validator
    pub fn is_standalone(&self) -> bool {
        self.contained_in.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scan_deduplicates_repeated_pairs() {
        let resource = json!({
            "resourceType": "Observation",
            "identifier": [{
                "type": {
                    "coding": [
                        {"system": "http://terminology.hl7.org/CodeSystem/v2-0203", "code": "OBI"},
                        {"system": "http://terminology.hl7.org/CodeSystem/v2-0203", "code": "OBI"}
                    ]
                }
            }],
            "code": {"coding": [{"system": "http://loinc.org", "code": "26464-8"}]}
        });

        let scan = scan_codings(&resource);
        assert!(scan.had_duplicates);
        assert_eq!(scan.codings.len(), 2);
        assert!(scan.codings.contains(&Coding::new(
            "http://terminology.hl7.org/CodeSystem/v2-0203",
            "OBI"
        )));
    }

    #[test]
    fn test_scan_same_pair_in_different_arrays_is_not_a_duplicate() {
        let resource = json!({
            "code": {"coding": [{"system": "http://loinc.org", "code": "1"}]},
            "category": [{"coding": [{"system": "http://loinc.org", "code": "1"}]}]
        });

        let scan = scan_codings(&resource);
        assert!(!scan.had_duplicates);
        assert_eq!(scan.codings.len(), 1);
    }

    #[test]
    fn test_scan_reaches_nested_entries() {
        let bundle = json!({
            "resourceType": "Bundle",
            "entry": [{
                "resource": {
                    "code": {"coding": [{"system": "http://snomed.info/sct", "code": "1"}]}
                }
            }]
        });
        let scan = scan_codings(&bundle);
        assert!(scan.codings.contains(&Coding::new("http://snomed.info/sct", "1")));
    }

    #[test]
    fn test_coding_without_system_is_ignored() {
        let scan = scan_codings(&json!({"code": {"coding": [{"code": "x"}]}}));
        assert!(scan.codings.is_empty());
    }
}
