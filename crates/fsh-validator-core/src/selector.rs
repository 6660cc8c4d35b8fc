//! Instance selection
//!
//! Turns a user filter (explicit FSH file names or a subdirectory scope) into
//! an ordered stream of validation tasks and skipped results. Candidates are
//! the instances declared in the selected FSH files that the transpiler
//! actually emitted; they are visited in (source path, declaration order).

use crate::artifact::{Artifact, ArtifactKind};
use crate::error::ValidatorError;
use crate::exclusion::ExclusionPolicy;
use crate::fhir_resources::{core_profile_url, is_core_resource};
use crate::fsh_source::{FshSourceFile, FshSources, InstanceDecl, ProfileDecl};
use crate::index::ArtifactIndex;
use crate::resolver::ProfileResolver;
use crate::result::Result;
use crate::task::{SkipReason, TargetProfile, ValidationResult, ValidationTask};
use std::path::{Component, PathBuf};
use tracing::{debug, warn};

/// Which FSH files to take instances from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionFilter {
    /// Every FSH file below `input/fsh/<subdir>`; an empty path means all
    All { subdir: PathBuf },

    /// FSH files named by base name
    Files(Vec<String>),
}

impl SelectionFilter {
    /// Every FSH file of the project
    pub fn all() -> Self {
        SelectionFilter::All {
            subdir: PathBuf::new(),
        }
    }

    /// Every FSH file below a subdirectory of `input/fsh/`
    ///
    /// `.` components are dropped, so `./labs` scopes like `labs` and `.`
    /// selects everything.
    pub fn all_in(subdir: impl Into<PathBuf>) -> Result<Self> {
        let subdir = subdir.into();
        let escapes = subdir.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes {
            return Err(ValidatorError::invalid_file_name(
                subdir.display().to_string(),
                "subdirectory must stay inside input/fsh",
            ));
        }
        let subdir = subdir
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect();
        Ok(SelectionFilter::All { subdir })
    }

    /// Explicit FSH file names
    ///
    /// Names are base names. Anything that could address a file outside the
    /// FSH input tree is rejected here, before any project file is read.
    pub fn files<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        for name in &names {
            validate_basename(name)?;
        }
        Ok(SelectionFilter::Files(names))
    }
}

/// Reject anything that is not a plain file name
pub fn validate_basename(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some("file name is empty")
    } else if name == "." || name == ".." {
        Some("file name must not be a directory reference")
    } else if name.contains('/') || name.contains('\\') {
        Some("file name must not contain a path separator")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ValidatorError::invalid_file_name(name, reason)),
        None => Ok(()),
    }
}

/// One item of a selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selected {
    Task(ValidationTask),
    Skipped(ValidationResult),
}

impl Selected {
    pub fn seq(&self) -> usize {
        match self {
            Selected::Task(task) => task.seq,
            Selected::Skipped(result) => result.seq,
        }
    }
}

/// Concrete profile declared in FSH without any instance in the same file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UncoveredProfile {
    /// Profile id
    pub profile: String,

    /// Canonical URL when the profile was indexed
    pub url: Option<String>,

    /// FSH file, relative to `input/fsh/`
    pub source: PathBuf,
}

#[derive(Debug, Clone, Copy)]
struct Candidate<'a> {
    artifact: &'a Artifact,
    source: &'a FshSourceFile,
}

/// Selects validation candidates from one index
#[derive(Debug, Clone, Copy)]
pub struct InstanceSelector<'a> {
    index: &'a ArtifactIndex,
    sources: &'a FshSources,
    policy: &'a ExclusionPolicy,
    resolver: ProfileResolver<'a>,
    project_canonical: Option<&'a str>,
}

impl<'a> InstanceSelector<'a> {
    pub fn new(
        index: &'a ArtifactIndex,
        sources: &'a FshSources,
        policy: &'a ExclusionPolicy,
    ) -> Self {
        Self {
            index,
            sources,
            policy,
            resolver: ProfileResolver::new(index),
            project_canonical: None,
        }
    }

    /// Canonical base of the project
    ///
    /// Declared profiles below this base must be part of the index; any other
    /// full URL is treated as a profile from a dependency package.
    pub fn with_project_canonical(mut self, canonical: Option<&'a str>) -> Self {
        self.project_canonical = canonical.map(|c| c.trim_end_matches('/'));
        self
    }

    /// Start a selection
    ///
    /// Filter errors (unknown or ambiguous file names, missing scope
    /// directory) are returned here. Profile resolution errors surface as
    /// `Err` items of the returned iterator.
    pub fn select(&self, filter: &SelectionFilter) -> Result<Selection<'a>> {
        let files = self.selected_files(filter)?;

        let mut candidates = Vec::new();
        for source in files {
            for decl in &source.instances {
                if let Some(artifact) = self.candidate_artifact(source, decl) {
                    candidates.push(Candidate { artifact, source });
                }
            }
        }

        debug!("Selected {} candidate instances", candidates.len());
        Ok(Selection {
            selector: *self,
            candidates: candidates.into_iter(),
            next_seq: 0,
        })
    }

    /// Concrete profiles of the selected files lacking an instance
    pub fn uncovered_profiles(&self, filter: &SelectionFilter) -> Result<Vec<UncoveredProfile>> {
        let files = self.selected_files(filter)?;
        let aliases = self.index.aliases();

        let mut uncovered = Vec::new();
        for source in files {
            for decl in &source.profiles {
                let url = aliases
                    .resolve(&decl.id)
                    .or_else(|| aliases.resolve(&decl.name))
                    .map(str::to_string);
                let indexed = url.as_deref().and_then(|u| self.index.profile(u));
                if indexed.is_some_and(|p| p.is_abstract) {
                    continue;
                }
                if !has_instance_of(source, decl, url.as_deref(), self.index) {
                    uncovered.push(UncoveredProfile {
                        profile: decl.id.clone(),
                        url,
                        source: source.relative.clone(),
                    });
                }
            }
        }
        Ok(uncovered)
    }

    fn selected_files(&self, filter: &SelectionFilter) -> Result<Vec<&'a FshSourceFile>> {
        let mut files = match filter {
            SelectionFilter::All { subdir } => {
                let scope = self.sources.root().join(subdir);
                if !scope.is_dir() {
                    return Err(ValidatorError::file_not_found(scope));
                }
                self.sources.under(subdir)
            }
            SelectionFilter::Files(names) => {
                let mut files = Vec::with_capacity(names.len());
                for name in names {
                    validate_basename(name)?;
                    let matches = self.sources.find_by_basename(name);
                    match matches.as_slice() {
                        [] => {
                            return Err(ValidatorError::file_not_found(
                                self.sources.root().join(name),
                            ));
                        }
                        [file] => files.push(*file),
                        several => {
                            let paths: Vec<String> = several
                                .iter()
                                .map(|f| f.relative.display().to_string())
                                .collect();
                            return Err(ValidatorError::invalid_file_name(
                                name.as_str(),
                                format!("ambiguous, matches {}", paths.join(", ")),
                            ));
                        }
                    }
                }
                files
            }
        };

        files.sort_by(|a, b| a.relative.cmp(&b.relative));
        files.dedup_by(|a, b| a.relative == b.relative);
        Ok(files)
    }

    fn candidate_artifact(
        &self,
        source: &FshSourceFile,
        decl: &InstanceDecl,
    ) -> Option<&'a Artifact> {
        match self.index.instance(&decl.id) {
            Some(artifact) if artifact.is_standalone() => Some(artifact),
            Some(_) => {
                debug!("Instance {} is only emitted inside a Bundle", decl.id);
                None
            }
            None if decl.is_inline() => {
                debug!("Inline instance {} has no generated file", decl.id);
                None
            }
            None => {
                if let Some(resource) = self.conformance_resource(&decl.id) {
                    return Some(resource);
                }
                warn!(
                    "Instance {} declared in {}:{} was not found in the generated resources",
                    decl.id,
                    source.relative.display(),
                    decl.line
                );
                None
            }
        }
    }

    /// Conformance resource (value set, code system, ...) written as an
    /// FSH `Instance:`
    fn conformance_resource(&self, id: &str) -> Option<&'a Artifact> {
        self.index
            .artifacts()
            .iter()
            .find(|a| a.id == id && !a.kind.is_instance_like())
    }

    fn evaluate(&self, seq: usize, candidate: Candidate<'a>) -> Result<Selected> {
        let artifact = candidate.artifact;

        if !artifact.kind.is_instance_like() {
            let reason = SkipReason::NotAnInstance {
                generated_as: artifact.kind,
            };
            return Ok(self.skip(seq, artifact, None, reason));
        }

        let target = match artifact.profile_ref.as_deref() {
            Some(url) => {
                if self.resolver.is_local(url) {
                    let resolved = self.resolver.resolve(url)?;
                    if resolved.is_abstract() {
                        let reason = SkipReason::AbstractProfileTarget {
                            profile: resolved.url,
                        };
                        return Ok(self.skip(seq, artifact, Some(url), reason));
                    }
                } else if self.is_project_url(url) {
                    return Err(ValidatorError::unknown_profile(url));
                }
                TargetProfile::Declared {
                    url: url.to_string(),
                }
            }
            None if is_core_resource(&artifact.resource_type) => TargetProfile::BaseType {
                resource_type: artifact.resource_type.clone(),
                url: core_profile_url(&artifact.resource_type),
            },
            None => {
                return Ok(self.skip(
                    seq,
                    artifact,
                    None,
                    SkipReason::UnresolvedProfile {
                        resource_type: artifact.resource_type.clone(),
                    },
                ));
            }
        };

        if let Some(reason) = self.policy.should_skip(artifact) {
            return Ok(self.skip(seq, artifact, Some(target.url()), reason));
        }

        Ok(Selected::Task(ValidationTask {
            seq,
            instance: artifact.id.clone(),
            resource_type: artifact.resource_type.clone(),
            file: artifact.file.clone(),
            source: candidate.source.relative.clone(),
            target,
        }))
    }

    fn skip(
        &self,
        seq: usize,
        artifact: &Artifact,
        profile: Option<&str>,
        reason: SkipReason,
    ) -> Selected {
        debug!("Skipping {}: {}", artifact.id, reason);
        Selected::Skipped(ValidationResult::skipped(
            seq,
            artifact.id.clone(),
            profile.map(str::to_string),
            reason,
        ))
    }

    fn is_project_url(&self, url: &str) -> bool {
        self.project_canonical
            .is_some_and(|base| url.starts_with(&format!("{base}/StructureDefinition/")))
    }
}

fn has_instance_of(
    source: &FshSourceFile,
    profile: &ProfileDecl,
    url: Option<&str>,
    index: &ArtifactIndex,
) -> bool {
    source.instances.iter().any(|instance| {
        let Some(target) = instance.instance_of.as_deref() else {
            return false;
        };
        if target == profile.name || target == profile.id {
            return true;
        }
        url.is_some_and(|u| {
            index.aliases().resolve(target) == Some(u)
                || index.get(ArtifactKind::Profile, target).is_some_and(|p| p.canonical_id == u)
        })
    })
}

/// Lazy, single-pass selection result
///
/// Yields items in selection order. Sequence numbers are assigned as items
/// are produced and are dense from zero.
#[derive(Debug)]
pub struct Selection<'a> {
    selector: InstanceSelector<'a>,
    candidates: std::vec::IntoIter<Candidate<'a>>,
    next_seq: usize,
}

impl Iterator for Selection<'_> {
    type Item = Result<Selected>;

    fn next(&mut self) -> Option<Self::Item> {
        let candidate = self.candidates.next()?;
        let seq = self.next_seq;
        self.next_seq += 1;
        Some(self.selector.evaluate(seq, candidate))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.candidates.size_hint()
    }
}
