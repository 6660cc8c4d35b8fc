//! Duplicate coding repair
//!
//! The transpiler can emit the same `(system, code)` pair twice in one
//! `coding` array (typically when a rule set and an instance rule both add
//! it). The validator reports those as errors that have nothing to do with
//! the profile under test, so affected instance files are rewritten with the
//! repeats removed before validation. The first occurrence is kept.

use crate::error::ValidatorError;
use crate::result::Result;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

/// Remove repeated codings in place; returns the number removed
pub fn dedupe_codings(value: &mut Value) -> usize {
    match value {
        Value::Object(map) => {
            let mut removed = 0;
            for (key, child) in map.iter_mut() {
                if key == "coding"
                    && let Value::Array(codings) = child
                {
                    removed += dedupe_array(codings);
                }
                removed += dedupe_codings(child);
            }
            removed
        }
        Value::Array(items) => items.iter_mut().map(dedupe_codings).sum(),
        _ => 0,
    }
}

fn dedupe_array(codings: &mut Vec<Value>) -> usize {
    let before = codings.len();
    let mut seen = HashSet::new();
    codings.retain(|coding| {
        let system = coding.get("system").and_then(Value::as_str);
        let code = coding.get("code").and_then(Value::as_str);
        match system {
            Some(system) => seen.insert((system.to_string(), code.unwrap_or_default().to_string())),
            None => true,
        }
    });
    before - codings.len()
}

/// Rewrite `path` without duplicate codings
///
/// Returns whether the file changed.
pub fn repair_file(path: &Path) -> Result<bool> {
    let content = std::fs::read_to_string(path).map_err(|e| ValidatorError::io_error(path, e))?;
    let mut json: Value = serde_json::from_str(&content)
        .map_err(|e| ValidatorError::parse_error(path, format!("Invalid JSON: {e}")))?;

    let removed = dedupe_codings(&mut json);
    if removed == 0 {
        return Ok(false);
    }

    let mut repaired = serde_json::to_string_pretty(&json)
        .map_err(|e| {
            ValidatorError::internal_error(format!("Could not serialize {}: {e}", path.display()))
        })?;
    repaired.push('\n');
    std::fs::write(path, repaired).map_err(|e| ValidatorError::io_error(path, e))?;

    warn!(
        "Removed {} duplicate coding(s) from {}",
        removed,
        path.display()
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::scan_codings;
    use serde_json::json;
    use tempfile::TempDir;

    fn patient() -> Value {
        json!({
            "resourceType": "Patient",
            "id": "pat1",
            "identifier": [{
                "type": {
                    "coding": [
                        { "system": "http://purl.obolibrary.org/obo/obi.owl", "code": "OBI_0001933" },
                        { "system": "http://purl.obolibrary.org/obo/obi.owl", "code": "OBI_0001933" },
                        { "system": "http://terminology.hl7.org/CodeSystem/v2-0203", "code": "MR" }
                    ]
                },
                "value": "12345"
            }]
        })
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let mut value = patient();
        assert_eq!(dedupe_codings(&mut value), 1);

        let codings = value["identifier"][0]["type"]["coding"].as_array().unwrap();
        assert_eq!(codings.len(), 2);
        assert_eq!(codings[1]["code"], "MR");
        assert!(!scan_codings(&value).had_duplicates);
    }

    #[test]
    fn test_clean_resource_is_untouched() {
        let mut value = json!({
            "resourceType": "Observation",
            "code": { "coding": [{ "system": "http://loinc.org", "code": "1" }] },
            "valueCodeableConcept": { "coding": [{ "system": "http://loinc.org", "code": "1" }] }
        });
        let before = value.clone();
        assert_eq!(dedupe_codings(&mut value), 0);
        assert_eq!(value, before);
    }

    #[test]
    fn test_repair_file_rewrites_only_when_needed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("Patient-pat1.json");
        std::fs::write(&path, patient().to_string()).unwrap();

        assert!(repair_file(&path).unwrap());
        let rewritten: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            rewritten["identifier"][0]["type"]["coding"]
                .as_array()
                .unwrap()
                .len(),
            2
        );

        assert!(!repair_file(&path).unwrap());
    }
}
