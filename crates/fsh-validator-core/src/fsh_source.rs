//! Lightweight scan of FSH sources
//!
//! The generated JSON does not say which FSH file an instance came from, so
//! the sources are scanned for the few declarations the selector needs:
//! `Alias:`, `Profile:` (with `Parent:` and `Id:`) and `Instance:` (with
//! `InstanceOf:`, `Usage:` and an optional `* id = ...` rule). Everything else
//! is skipped.

use crate::alias::AliasTableBuilder;
use crate::error::ValidatorError;
use crate::result::Result;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;
use walkdir::WalkDir;

static KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<kw>[A-Za-z]+):\s*(?P<value>\S+)(?:\s*=\s*(?P<target>\S+))?").unwrap()
});

static ID_RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\*\s+id\s*=\s*"?(?P<id>[A-Za-z0-9\-\.]+)"?"#).unwrap());

/// `Profile:` declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileDecl {
    pub name: String,
    pub parent: Option<String>,
    /// Explicit `Id:` or the name
    pub id: String,
    pub line: usize,
}

/// `Instance:` declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceDecl {
    pub name: String,
    pub instance_of: Option<String>,
    /// `* id = ...` rule or the name
    pub id: String,
    pub usage: Option<String>,
    pub line: usize,
}

impl InstanceDecl {
    /// Inline instances are only emitted inside their containing resource
    pub fn is_inline(&self) -> bool {
        self.usage.as_deref() == Some("#inline")
    }
}

/// `Alias:` declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasDecl {
    pub name: String,
    pub url: String,
}

/// Declarations found in one FSH file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FshSourceFile {
    /// Absolute path
    pub path: PathBuf,
    /// Path relative to `input/fsh/`
    pub relative: PathBuf,
    pub aliases: Vec<AliasDecl>,
    pub profiles: Vec<ProfileDecl>,
    pub instances: Vec<InstanceDecl>,
}

enum Current {
    Profile(usize),
    Instance(usize),
    Other,
}

impl FshSourceFile {
    /// Parse declarations from file content
    pub fn parse(path: impl Into<PathBuf>, relative: impl Into<PathBuf>, content: &str) -> Self {
        let mut file = FshSourceFile {
            path: path.into(),
            relative: relative.into(),
            aliases: Vec::new(),
            profiles: Vec::new(),
            instances: Vec::new(),
        };

        let mut current = Current::Other;
        let mut in_block_comment = false;

        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();

            if in_block_comment {
                if line.contains("*/") {
                    in_block_comment = false;
                }
                continue;
            }
            if line.starts_with("/*") {
                in_block_comment = !line.contains("*/");
                continue;
            }
            if line.is_empty() || line.starts_with("//") {
                continue;
            }

            if let Some(caps) = ID_RULE.captures(line) {
                if let Current::Instance(i) = current {
                    file.instances[i].id = caps["id"].to_string();
                }
                continue;
            }

            let Some(caps) = KEYWORD.captures(line) else {
                continue;
            };
            let value = caps["value"].to_string();

            match &caps["kw"] {
                "Alias" => {
                    if let Some(target) = caps.name("target") {
                        file.aliases.push(AliasDecl {
                            name: value,
                            url: target.as_str().to_string(),
                        });
                    }
                    current = Current::Other;
                }
                "Profile" => {
                    file.profiles.push(ProfileDecl {
                        id: value.clone(),
                        name: value,
                        parent: None,
                        line: idx + 1,
                    });
                    current = Current::Profile(file.profiles.len() - 1);
                }
                "Instance" => {
                    file.instances.push(InstanceDecl {
                        id: value.clone(),
                        name: value,
                        instance_of: None,
                        usage: None,
                        line: idx + 1,
                    });
                    current = Current::Instance(file.instances.len() - 1);
                }
                "Parent" => {
                    if let Current::Profile(i) = current {
                        file.profiles[i].parent = Some(value);
                    }
                }
                "Id" => {
                    if let Current::Profile(i) = current {
                        file.profiles[i].id = value;
                    }
                }
                "InstanceOf" => {
                    if let Current::Instance(i) = current {
                        file.instances[i].instance_of = Some(value);
                    }
                }
                "Usage" => {
                    if let Current::Instance(i) = current {
                        file.instances[i].usage = Some(value);
                    }
                }
                "Extension" | "Logical" | "Resource" | "ValueSet" | "CodeSystem"
                | "Invariant" | "RuleSet" | "Mapping" => current = Current::Other,
                _ => {}
            }
        }

        file
    }
}

/// All FSH sources of a project, sorted by relative path
#[derive(Debug, Clone, Default)]
pub struct FshSources {
    root: PathBuf,
    files: Vec<FshSourceFile>,
}

impl FshSources {
    /// Scan every `*.fsh` file below `input_dir`
    pub fn scan(input_dir: &Path) -> Result<Self> {
        if !input_dir.is_dir() {
            return Err(ValidatorError::file_not_found(input_dir));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(input_dir).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(input_dir).to_path_buf();
                ValidatorError::io_error(path, std::io::Error::other(e.to_string()))
            })?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "fsh") {
                continue;
            }

            let content =
                std::fs::read_to_string(path).map_err(|e| ValidatorError::io_error(path, e))?;
            let relative = path.strip_prefix(input_dir).unwrap_or(path);
            files.push(FshSourceFile::parse(path, relative, &content));
        }

        files.sort_by(|a, b| a.relative.cmp(&b.relative));
        debug!("Scanned {} FSH files in {}", files.len(), input_dir.display());
        Ok(Self {
            root: input_dir.to_path_buf(),
            files,
        })
    }

    pub fn from_files(root: impl Into<PathBuf>, mut files: Vec<FshSourceFile>) -> Self {
        files.sort_by(|a, b| a.relative.cmp(&b.relative));
        Self {
            root: root.into(),
            files,
        }
    }

    /// The `input/fsh/` directory the sources were scanned from
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &[FshSourceFile] {
        &self.files
    }

    /// Files whose base name equals `name`
    pub fn find_by_basename(&self, name: &str) -> Vec<&FshSourceFile> {
        self.files
            .iter()
            .filter(|f| f.relative.file_name().is_some_and(|n| n == name))
            .collect()
    }

    /// Files located below `subdir` (relative to `input/fsh/`)
    pub fn under(&self, subdir: &Path) -> Vec<&FshSourceFile> {
        self.files
            .iter()
            .filter(|f| f.relative.starts_with(subdir))
            .collect()
    }

    /// Register every `Alias:` declaration
    pub fn collect_aliases(&self, builder: &mut AliasTableBuilder) -> Result<()> {
        for file in &self.files {
            for alias in &file.aliases {
                builder
                    .add(&alias.name, &alias.url, &file.path)
                    .map_err(|e| ValidatorError::parse_error(&file.path, e.to_string()))?;
            }
        }
        Ok(())
    }
}
