//! Artifact index over the transpiler output
//!
//! Building the index is the only place generated files are read. It runs in
//! two passes: the first parses every `*.json` file into a raw record and
//! registers StructureDefinition ids and names as alias tokens, the second
//! resolves every profile reference against the finished alias table. Any
//! reference that cannot be resolved aborts the build, because a partially
//! resolved index would silently validate against the wrong profile.

use crate::alias::{AliasTable, AliasTableBuilder, is_alias_token};
use crate::artifact::{Artifact, ArtifactKind, scan_codings};
use crate::config::PackageDependency;
use crate::error::ValidatorError;
use crate::fhir_resources::{core_profile_url, is_core_resource};
use crate::result::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Indexed transpiler output of one project
#[derive(Debug, Clone)]
pub struct ArtifactIndex {
    output_dir: PathBuf,
    artifacts: Vec<Artifact>,
    by_key: HashMap<(ArtifactKind, String), usize>,
    aliases: AliasTable,
    dependencies: Vec<PackageDependency>,
}

/// First-pass record with references still unresolved
#[derive(Debug)]
struct RawArtifact {
    artifact: Artifact,
    raw_derived_from: Option<String>,
    raw_profile: Option<String>,
    raw_entries: Vec<RawEntry>,
}

#[derive(Debug)]
struct RawEntry {
    id: Option<String>,
    resource_type: String,
    raw_profile: Option<String>,
    resource: Value,
}

impl ArtifactIndex {
    /// Index every generated resource below `output_dir`
    ///
    /// `aliases` carries the project's FSH alias declarations; profile ids
    /// and names found in the output are added before the table is frozen.
    pub fn build(output_dir: &Path, mut aliases: AliasTableBuilder) -> Result<Self> {
        if !output_dir.is_dir() {
            return Err(ValidatorError::file_not_found(output_dir));
        }

        info!("Indexing generated resources in {}", output_dir.display());

        let mut raws = Vec::new();
        let mut dependencies = Vec::new();

        for entry in WalkDir::new(output_dir).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(output_dir).to_path_buf();
                ValidatorError::io_error(path, std::io::Error::other(e.to_string()))
            })?;
            let path = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }
            if path.extension().is_none_or(|ext| ext != "json") {
                debug!("Skipping non-JSON output file {}", path.display());
                continue;
            }

            let raw = parse_file(path)?;
            if raw.artifact.kind == ArtifactKind::ImplementationGuide {
                dependencies.extend(read_dependencies(path)?);
            }
            raws.push(raw);
        }

        for raw in &raws {
            let artifact = &raw.artifact;
            if matches!(artifact.kind, ArtifactKind::Profile | ArtifactKind::Extension) {
                register_definition_tokens(&mut aliases, artifact)?;
            }
        }

        let aliases = aliases.build();
        let mut index = Self {
            output_dir: output_dir.to_path_buf(),
            artifacts: Vec::with_capacity(raws.len()),
            by_key: HashMap::new(),
            aliases,
            dependencies,
        };

        let mut pending_entries = Vec::new();
        for raw in raws {
            let mut artifact = raw.artifact;
            artifact.derived_from = raw
                .raw_derived_from
                .map(|r| index.resolve_reference(&r, &artifact.file))
                .transpose()?;
            artifact.profile_ref = raw
                .raw_profile
                .map(|r| index.resolve_reference(&r, &artifact.file))
                .transpose()?;
            if !raw.raw_entries.is_empty() {
                pending_entries.push((artifact.id.clone(), artifact.file.clone(), raw.raw_entries));
            }
            index.insert(artifact)?;
        }

        // Entries become records only when no standalone file exists for them
        for (bundle_id, file, entries) in pending_entries {
            for entry in entries {
                let Some(id) = entry.id else {
                    debug!("Bundle {} has an entry without id, not indexed", bundle_id);
                    continue;
                };
                if index.instance(&id).is_some() {
                    continue;
                }
                let profile_ref = entry
                    .raw_profile
                    .map(|r| index.resolve_reference(&r, &file))
                    .transpose()?;
                let scan = scan_codings(&entry.resource);
                index.insert(Artifact {
                    kind: ArtifactKind::Instance,
                    canonical_id: id.clone(),
                    id,
                    name: None,
                    resource_type: entry.resource_type,
                    derived_from: None,
                    profile_ref,
                    codings: scan.codings,
                    had_duplicate_codings: scan.had_duplicates,
                    is_abstract: false,
                    file: file.clone(),
                    contained_in: Some(bundle_id.clone()),
                })?;
            }
        }

        info!(
            "Indexed {} artifacts ({} profiles, {} instances, {} aliases)",
            index.artifacts.len(),
            index.profiles().count(),
            index.instances().count(),
            index.aliases.len()
        );

        Ok(index)
    }

    fn insert(&mut self, artifact: Artifact) -> Result<()> {
        let key = (artifact.kind, artifact.canonical_id.clone());
        if let Some(&existing) = self.by_key.get(&key) {
            return Err(ValidatorError::parse_error(
                &artifact.file,
                format!(
                    "{} '{}' is also defined in {}",
                    artifact.kind,
                    artifact.canonical_id,
                    self.artifacts[existing].file.display()
                ),
            ));
        }
        self.by_key.insert(key, self.artifacts.len());
        self.artifacts.push(artifact);
        Ok(())
    }

    /// Normalise a profile reference to a canonical URL
    ///
    /// `|version` suffixes are dropped. Alias tokens and bare names must be
    /// known to the alias table (bare core resource names map to their core
    /// StructureDefinition). Full URLs outside the project are kept as
    /// external references.
    fn resolve_reference(&self, reference: &str, file: &Path) -> Result<String> {
        let reference = reference.split('|').next().unwrap_or(reference).trim();

        if is_alias_token(reference) {
            return self
                .aliases
                .resolve(reference)
                .map(str::to_string)
                .ok_or_else(|| {
                    ValidatorError::parse_error(file, format!("Undefined alias '{reference}'"))
                });
        }

        if reference.contains("://") || reference.starts_with("urn:") {
            return Ok(reference.to_string());
        }

        if let Some(url) = self.aliases.resolve(reference) {
            return Ok(url.to_string());
        }
        if is_core_resource(reference) {
            return Ok(core_profile_url(reference));
        }

        Err(ValidatorError::parse_error(
            file,
            format!("Reference '{reference}' does not match any indexed profile"),
        ))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Packages listed in the generated ImplementationGuide
    pub fn dependencies(&self) -> &[PackageDependency] {
        &self.dependencies
    }

    /// Look up an artifact by kind and canonical id
    pub fn get(&self, kind: ArtifactKind, canonical_id: &str) -> Option<&Artifact> {
        self.by_key
            .get(&(kind, canonical_id.to_string()))
            .map(|&i| &self.artifacts[i])
    }

    /// Profile by canonical URL
    pub fn profile(&self, url: &str) -> Option<&Artifact> {
        self.get(ArtifactKind::Profile, url)
    }

    /// Instance or Bundle by resource id
    pub fn instance(&self, id: &str) -> Option<&Artifact> {
        self.get(ArtifactKind::Instance, id)
            .or_else(|| self.get(ArtifactKind::Bundle, id))
    }

    /// All artifacts in file order
    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn profiles(&self) -> impl Iterator<Item = &Artifact> {
        self.of_kind(ArtifactKind::Profile)
    }

    /// Instances and Bundles, including Bundle entries
    pub fn instances(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter().filter(|a| a.kind.is_instance_like())
    }

    pub fn value_sets(&self) -> impl Iterator<Item = &Artifact> {
        self.of_kind(ArtifactKind::ValueSet)
    }

    fn of_kind(&self, kind: ArtifactKind) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter().filter(move |a| a.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

fn register_definition_tokens(aliases: &mut AliasTableBuilder, artifact: &Artifact) -> Result<()> {
    let tokens = std::iter::once(artifact.id.as_str()).chain(artifact.name.as_deref());
    for token in tokens {
        aliases
            .add(token, &artifact.canonical_id, &artifact.file)
            .map_err(|e| ValidatorError::parse_error(&artifact.file, e.to_string()))?;
    }
    Ok(())
}

fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| ValidatorError::io_error(path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| ValidatorError::parse_error(path, format!("Invalid JSON: {e}")))
}

fn str_field<'a>(json: &'a Value, field: &str) -> Option<&'a str> {
    json.get(field).and_then(Value::as_str)
}

fn required_str(json: &Value, field: &str, path: &Path) -> Result<String> {
    str_field(json, field)
        .map(str::to_string)
        .ok_or_else(|| ValidatorError::parse_error(path, format!("Missing '{field}'")))
}

fn first_meta_profile(json: &Value) -> Option<String> {
    json.pointer("/meta/profile/0")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn parse_file(path: &Path) -> Result<RawArtifact> {
    let json = read_json(path)?;
    if !json.is_object() {
        return Err(ValidatorError::parse_error(path, "Expected a JSON object"));
    }

    let resource_type = required_str(&json, "resourceType", path)?;
    let scan = scan_codings(&json);

    let mut artifact = Artifact {
        kind: ArtifactKind::Instance,
        canonical_id: String::new(),
        id: String::new(),
        name: None,
        resource_type: resource_type.clone(),
        derived_from: None,
        profile_ref: None,
        codings: scan.codings,
        had_duplicate_codings: scan.had_duplicates,
        is_abstract: false,
        file: path.to_path_buf(),
        contained_in: None,
    };
    let mut raw_derived_from = None;
    let mut raw_profile = None;
    let mut raw_entries = Vec::new();

    match resource_type.as_str() {
        "StructureDefinition" => {
            let sd_type = required_str(&json, "type", path)?;
            artifact.kind = if sd_type == "Extension" {
                ArtifactKind::Extension
            } else {
                ArtifactKind::Profile
            };
            artifact.canonical_id = required_str(&json, "url", path)?;
            artifact.id = required_str(&json, "id", path)?;
            artifact.name = str_field(&json, "name").map(str::to_string);
            artifact.resource_type = sd_type;
            artifact.is_abstract = json.get("abstract").and_then(Value::as_bool).unwrap_or(false);
            raw_derived_from = str_field(&json, "baseDefinition").map(str::to_string);
        }
        "ValueSet" | "CodeSystem" => {
            artifact.kind = if resource_type == "ValueSet" {
                ArtifactKind::ValueSet
            } else {
                ArtifactKind::CodeSystem
            };
            artifact.canonical_id = required_str(&json, "url", path)?;
            artifact.id = required_str(&json, "id", path)?;
            artifact.name = str_field(&json, "name").map(str::to_string);
        }
        "ImplementationGuide" => {
            artifact.kind = ArtifactKind::ImplementationGuide;
            artifact.id = required_str(&json, "id", path)?;
            artifact.canonical_id = str_field(&json, "url")
                .map(str::to_string)
                .unwrap_or_else(|| artifact.id.clone());
        }
        _ => {
            artifact.kind = if resource_type == "Bundle" {
                ArtifactKind::Bundle
            } else {
                ArtifactKind::Instance
            };
            artifact.id = required_str(&json, "id", path)?;
            artifact.canonical_id = artifact.id.clone();
            raw_profile = first_meta_profile(&json);

            if artifact.kind == ArtifactKind::Bundle
                && let Some(entries) = json.get("entry").and_then(Value::as_array)
            {
                for resource in entries.iter().filter_map(|e| e.get("resource")) {
                    let Some(entry_type) = str_field(resource, "resourceType") else {
                        return Err(ValidatorError::parse_error(
                            path,
                            "Bundle entry resource without 'resourceType'",
                        ));
                    };
                    raw_entries.push(RawEntry {
                        id: str_field(resource, "id").map(str::to_string),
                        resource_type: entry_type.to_string(),
                        raw_profile: first_meta_profile(resource),
                        resource: resource.clone(),
                    });
                }
            }
        }
    }

    Ok(RawArtifact {
        artifact,
        raw_derived_from,
        raw_profile,
        raw_entries,
    })
}

fn read_dependencies(path: &Path) -> Result<Vec<PackageDependency>> {
    let json = read_json(path)?;
    let deps = json
        .get("dependsOn")
        .and_then(Value::as_array)
        .map(|deps| {
            deps.iter()
                .filter_map(|d| {
                    let package_id = str_field(d, "packageId")?;
                    let version = str_field(d, "version")?;
                    Some(PackageDependency::new(package_id, version))
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(deps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Coding;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    const BASE: &str = "http://example.org/fhir/StructureDefinition";

    fn write(dir: &Path, name: &str, value: Value) {
        fs::write(dir.join(name), serde_json::to_string_pretty(&value).unwrap()).unwrap();
    }

    fn profile(id: &str, base: &str, is_abstract: bool) -> Value {
        json!({
            "resourceType": "StructureDefinition",
            "id": id,
            "url": format!("{BASE}/{id}"),
            "name": id.replace('-', "_"),
            "type": "Observation",
            "abstract": is_abstract,
            "baseDefinition": base
        })
    }

    fn output() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        write(
            dir,
            "StructureDefinition-p-base.json",
            profile("p-base", "http://hl7.org/fhir/StructureDefinition/Observation", true),
        );
        write(
            dir,
            "StructureDefinition-p-child.json",
            profile("p-child", &format!("{BASE}/p-base|1.0.0"), false),
        );
        write(
            dir,
            "ValueSet-vs.json",
            json!({
                "resourceType": "ValueSet",
                "id": "vs",
                "url": "http://example.org/fhir/ValueSet/vs"
            }),
        );
        write(
            dir,
            "ImplementationGuide-example.json",
            json!({
                "resourceType": "ImplementationGuide",
                "id": "example",
                "url": "http://example.org/fhir/ImplementationGuide/example",
                "dependsOn": [{"packageId": "hl7.fhir.us.core", "version": "5.0.1"}]
            }),
        );
        write(
            dir,
            "Observation-obs1.json",
            json!({
                "resourceType": "Observation",
                "id": "obs1",
                "meta": {"profile": [format!("{BASE}/p-child")]},
                "code": {"coding": [
                    {"system": "http://loinc.org", "code": "1"},
                    {"system": "http://loinc.org", "code": "1"}
                ]}
            }),
        );
        temp_dir
    }

    #[test]
    fn test_build_classifies_artifacts() {
        let temp_dir = output();
        let index = ArtifactIndex::build(temp_dir.path(), AliasTableBuilder::new()).unwrap();

        assert_eq!(index.profiles().count(), 2);
        assert_eq!(index.value_sets().count(), 1);
        assert_eq!(index.instances().count(), 1);
        assert_eq!(
            index.dependencies(),
            &[PackageDependency::new("hl7.fhir.us.core", "5.0.1")]
        );

        let child = index.profile(&format!("{BASE}/p-child")).unwrap();
        assert_eq!(child.derived_from.as_deref(), Some(format!("{BASE}/p-base").as_str()));
        assert!(!child.is_abstract);
        assert!(index.profile(&format!("{BASE}/p-base")).unwrap().is_abstract);
    }

    #[test]
    fn test_instance_codings_are_deduplicated() {
        let temp_dir = output();
        let index = ArtifactIndex::build(temp_dir.path(), AliasTableBuilder::new()).unwrap();

        let obs = index.instance("obs1").unwrap();
        assert!(obs.had_duplicate_codings);
        assert_eq!(obs.codings.len(), 1);
        assert!(obs.codings.contains(&Coding::new("http://loinc.org", "1")));
    }

    #[test]
    fn test_profile_ids_and_names_become_aliases() {
        let temp_dir = output();
        let index = ArtifactIndex::build(temp_dir.path(), AliasTableBuilder::new()).unwrap();

        let url = format!("{BASE}/p-child");
        assert_eq!(index.aliases().resolve("p-child"), Some(url.as_str()));
        assert_eq!(index.aliases().resolve("p_child"), Some(url.as_str()));
    }

    #[test]
    fn test_alias_token_in_meta_profile() {
        let temp_dir = output();
        write(
            temp_dir.path(),
            "Observation-obs2.json",
            json!({"resourceType": "Observation", "id": "obs2", "meta": {"profile": ["$child"]}}),
        );
        let mut aliases = AliasTableBuilder::new();
        aliases
            .add("$child", format!("{BASE}/p-child"), "aliases.fsh")
            .unwrap();

        let index = ArtifactIndex::build(temp_dir.path(), aliases).unwrap();
        assert_eq!(
            index.instance("obs2").unwrap().profile_ref.as_deref(),
            Some(format!("{BASE}/p-child").as_str())
        );
    }

    #[test]
    fn test_undefined_alias_is_parse_error() {
        let temp_dir = output();
        write(
            temp_dir.path(),
            "Observation-obs2.json",
            json!({"resourceType": "Observation", "id": "obs2", "meta": {"profile": ["$missing"]}}),
        );

        let err = ArtifactIndex::build(temp_dir.path(), AliasTableBuilder::new()).unwrap_err();
        assert!(matches!(err, ValidatorError::ParseError { .. }));
    }

    #[test]
    fn test_unknown_bare_reference_is_parse_error() {
        let temp_dir = output();
        write(
            temp_dir.path(),
            "Observation-obs2.json",
            json!({
                "resourceType": "Observation",
                "id": "obs2",
                "meta": {"profile": ["no-such-profile"]}
            }),
        );

        assert!(ArtifactIndex::build(temp_dir.path(), AliasTableBuilder::new()).is_err());
    }

    #[test]
    fn test_external_url_is_kept() {
        let temp_dir = output();
        let external = "https://www.medizininformatik-initiative.de/fhir/core/modul-labor/StructureDefinition/ObservationLab";
        write(
            temp_dir.path(),
            "Observation-lab.json",
            json!({"resourceType": "Observation", "id": "lab", "meta": {"profile": [external]}}),
        );

        let index = ArtifactIndex::build(temp_dir.path(), AliasTableBuilder::new()).unwrap();
        assert_eq!(index.instance("lab").unwrap().profile_ref.as_deref(), Some(external));
    }

    #[test]
    fn test_bundle_entries_are_indexed_once() {
        let temp_dir = output();
        write(
            temp_dir.path(),
            "Bundle-b1.json",
            json!({
                "resourceType": "Bundle",
                "id": "b1",
                "type": "collection",
                "entry": [
                    {"resource": {"resourceType": "Observation", "id": "obs1"}},
                    {"resource": {
                        "resourceType": "Patient",
                        "id": "inline-patient",
                        "meta": {"profile": ["http://hl7.org/fhir/StructureDefinition/Patient"]}
                    }}
                ]
            }),
        );

        let index = ArtifactIndex::build(temp_dir.path(), AliasTableBuilder::new()).unwrap();

        let bundle = index.instance("b1").unwrap();
        assert_eq!(bundle.kind, ArtifactKind::Bundle);

        // obs1 keeps its standalone record
        assert!(index.instance("obs1").unwrap().is_standalone());

        let inline = index.instance("inline-patient").unwrap();
        assert_eq!(inline.contained_in.as_deref(), Some("b1"));
        assert_eq!(inline.resource_type, "Patient");
        assert_eq!(
            inline.profile_ref.as_deref(),
            Some("http://hl7.org/fhir/StructureDefinition/Patient")
        );
    }

    #[test]
    fn test_duplicate_instance_id_is_parse_error() {
        let temp_dir = output();
        write(
            temp_dir.path(),
            "Observation-obs1-copy.json",
            json!({"resourceType": "Observation", "id": "obs1"}),
        );
        let err = ArtifactIndex::build(temp_dir.path(), AliasTableBuilder::new()).unwrap_err();
        assert!(err.to_string().contains("also defined"));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let temp_dir = output();
        fs::write(temp_dir.path().join("broken.json"), "{ not json").unwrap();
        let err = ArtifactIndex::build(temp_dir.path(), AliasTableBuilder::new()).unwrap_err();
        assert!(matches!(err, ValidatorError::ParseError { .. }));
    }

    #[test]
    fn test_missing_output_dir() {
        let temp_dir = TempDir::new().unwrap();
        let err = ArtifactIndex::build(&temp_dir.path().join("nope"), AliasTableBuilder::new())
            .unwrap_err();
        assert!(matches!(err, ValidatorError::FileNotFound { .. }));
    }
}
