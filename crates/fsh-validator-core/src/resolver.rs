//! Profile inheritance resolution
//!
//! Derivation is an explicit reference graph over canonical URLs: every
//! profile points at its `baseDefinition`. Chains are walked iteratively with
//! a visited set; the walk stops at the first base that is not part of the
//! project (a core or dependency StructureDefinition).

use crate::artifact::Artifact;
use crate::error::ValidatorError;
use crate::index::ArtifactIndex;
use crate::result::Result;
use std::collections::HashSet;

/// A profile together with its in-project ancestry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProfile {
    /// Canonical URL of the resolved profile
    pub url: String,

    /// In-project chain, the profile itself first
    pub chain: Vec<String>,

    /// First base outside the project, if any
    pub external_base: Option<String>,

    /// Constrained resource type
    pub resource_type: String,

    /// Root-most concrete profile of the in-project chain
    pub root_concrete: Option<String>,

    is_abstract: bool,
}

impl ResolvedProfile {
    /// Explicit `abstract` flag on the profile itself
    ///
    /// Ancestors do not matter: a concrete profile below an abstract one is a
    /// normal validation target.
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }
}

/// Resolves profiles against one index
#[derive(Debug, Clone, Copy)]
pub struct ProfileResolver<'a> {
    index: &'a ArtifactIndex,
}

impl<'a> ProfileResolver<'a> {
    pub fn new(index: &'a ArtifactIndex) -> Self {
        Self { index }
    }

    /// Whether the URL names a profile defined in the project
    pub fn is_local(&self, url: &str) -> bool {
        self.index.profile(url).is_some()
    }

    /// Resolve a profile and walk its derivation chain
    ///
    /// Fails with `UnknownProfile` when `profile_url` is not indexed and with
    /// `CyclicDerivation` when the chain revisits a profile.
    pub fn resolve(&self, profile_url: &str) -> Result<ResolvedProfile> {
        let profile = self
            .index
            .profile(profile_url)
            .ok_or_else(|| ValidatorError::unknown_profile(profile_url))?;

        let chain = self.walk(profile)?;
        let external_base = chain
            .last()
            .and_then(|p| p.derived_from.clone())
            .filter(|base| !self.is_local(base));

        let resource_type = chain
            .iter()
            .map(|p| p.resource_type.as_str())
            .find(|t| !t.is_empty())
            .unwrap_or_default()
            .to_string();

        let root_concrete = chain
            .iter()
            .rev()
            .find(|p| !p.is_abstract)
            .map(|p| p.canonical_id.clone());

        Ok(ResolvedProfile {
            url: profile.canonical_id.clone(),
            chain: chain.iter().map(|p| p.canonical_id.clone()).collect(),
            external_base,
            resource_type,
            root_concrete,
            is_abstract: profile.is_abstract,
        })
    }

    fn walk(&self, start: &'a Artifact) -> Result<Vec<&'a Artifact>> {
        let mut chain = vec![start];
        let mut visited = HashSet::from([start.canonical_id.as_str()]);
        let mut current = start;

        while let Some(base) = current.derived_from.as_deref() {
            let Some(parent) = self.index.profile(base) else {
                break;
            };

            if !visited.insert(parent.canonical_id.as_str()) {
                let mut cycle: Vec<String> =
                    chain.iter().map(|p| p.canonical_id.clone()).collect();
                cycle.push(parent.canonical_id.clone());
                return Err(ValidatorError::CyclicDerivation { chain: cycle });
            }

            chain.push(parent);
            current = parent;
        }

        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::AliasTableBuilder;
    use serde_json::json;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const BASE: &str = "http://example.org/fhir/StructureDefinition";

    fn write_profile(dir: &Path, id: &str, base: &str, is_abstract: bool) {
        let value = json!({
            "resourceType": "StructureDefinition",
            "id": id,
            "url": format!("{BASE}/{id}"),
            "type": "Observation",
            "abstract": is_abstract,
            "baseDefinition": base
        });
        fs::write(
            dir.join(format!("StructureDefinition-{id}.json")),
            value.to_string(),
        )
        .unwrap();
    }

    fn url(id: &str) -> String {
        format!("{BASE}/{id}")
    }

    #[test]
    fn test_resolve_chain_within_project() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        write_profile(dir, "a", "http://hl7.org/fhir/StructureDefinition/Observation", false);
        write_profile(dir, "b", &url("a"), true);
        write_profile(dir, "c", &url("b"), false);

        let index = ArtifactIndex::build(dir, AliasTableBuilder::new()).unwrap();
        let resolved = ProfileResolver::new(&index).resolve(&url("c")).unwrap();

        assert_eq!(resolved.chain, vec![url("c"), url("b"), url("a")]);
        assert_eq!(
            resolved.external_base.as_deref(),
            Some("http://hl7.org/fhir/StructureDefinition/Observation")
        );
        assert_eq!(resolved.resource_type, "Observation");
        assert_eq!(resolved.root_concrete, Some(url("a")));
        assert!(!resolved.is_abstract());
    }

    #[test]
    fn test_abstract_profile() {
        let temp_dir = TempDir::new().unwrap();
        write_profile(
            temp_dir.path(),
            "p-abstract-base",
            "http://hl7.org/fhir/StructureDefinition/Observation",
            true,
        );

        let index = ArtifactIndex::build(temp_dir.path(), AliasTableBuilder::new()).unwrap();
        let resolved = ProfileResolver::new(&index)
            .resolve(&url("p-abstract-base"))
            .unwrap();
        assert!(resolved.is_abstract());
        assert_eq!(resolved.root_concrete, None);
    }

    #[test]
    fn test_cycle_is_detected() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        write_profile(dir, "x", &url("y"), false);
        write_profile(dir, "y", &url("z"), false);
        write_profile(dir, "z", &url("x"), false);

        let index = ArtifactIndex::build(dir, AliasTableBuilder::new()).unwrap();
        let err = ProfileResolver::new(&index).resolve(&url("x")).unwrap_err();

        match err {
            ValidatorError::CyclicDerivation { chain } => {
                assert_eq!(chain, vec![url("x"), url("y"), url("z"), url("x")]);
            }
            other => panic!("expected cyclic derivation, got {other:?}"),
        }
    }

    #[test]
    fn test_self_derivation_is_a_cycle() {
        let temp_dir = TempDir::new().unwrap();
        write_profile(temp_dir.path(), "self", &url("self"), false);

        let index = ArtifactIndex::build(temp_dir.path(), AliasTableBuilder::new()).unwrap();
        assert!(matches!(
            ProfileResolver::new(&index).resolve(&url("self")),
            Err(ValidatorError::CyclicDerivation { .. })
        ));
    }

    #[test]
    fn test_unknown_profile() {
        let temp_dir = TempDir::new().unwrap();
        let index = ArtifactIndex::build(temp_dir.path(), AliasTableBuilder::new()).unwrap();
        assert!(matches!(
            ProfileResolver::new(&index).resolve(&url("missing")),
            Err(ValidatorError::UnknownProfile { .. })
        ));
    }
}
