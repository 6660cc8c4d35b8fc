//! Alias resolution
//!
//! Maps short tokens to canonical URLs. Two kinds of tokens end up here:
//!
//! - FSH aliases such as `$SCT` from `Alias: $SCT = http://snomed.info/sct`
//! - the `id` and `name` of every generated StructureDefinition, so that a
//!   reference like `p-thoracic-drainage` finds its canonical URL
//!
//! The table is assembled once through [`AliasTableBuilder`] and is immutable
//! afterwards; lookups are exact-key only.
//!
//! ```rust
//! use fsh_validator_core::alias::AliasTableBuilder;
//! use std::path::PathBuf;
//!
//! let mut builder = AliasTableBuilder::new();
//! builder
//!     .add("$SCT", "http://snomed.info/sct", PathBuf::from("aliases.fsh"))
//!     .unwrap();
//! let table = builder.build();
//!
//! assert_eq!(table.resolve("$SCT"), Some("http://snomed.info/sct"));
//! assert_eq!(table.resolve("$LNC"), None);
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// A token mapped to a canonical URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    /// Token as written in references
    pub name: String,

    /// Canonical URL the token stands for
    pub url: String,

    /// File the mapping was taken from
    pub source_file: PathBuf,
}

/// Errors that can occur while assembling the table
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AliasError {
    /// The same token points at two different URLs
    #[error("Alias '{name}' is ambiguous: '{url1}' ({file1:?}) vs '{url2}' ({file2:?})")]
    Conflicting {
        name: String,
        url1: String,
        file1: PathBuf,
        url2: String,
        file2: PathBuf,
    },

    /// Empty token
    #[error("Empty alias name")]
    EmptyName,

    /// Empty target URL
    #[error("Alias '{0}' has an empty URL")]
    InvalidUrl(String),
}

/// Collects aliases before the table is frozen
#[derive(Debug, Default)]
pub struct AliasTableBuilder {
    aliases: HashMap<String, Alias>,
}

impl AliasTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mapping
    ///
    /// Re-adding an identical mapping is a no-op; a token mapped to a second,
    /// different URL is rejected.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        url: impl Into<String>,
        source_file: impl Into<PathBuf>,
    ) -> Result<&mut Self, AliasError> {
        let name = name.into();
        let url = url.into();
        let source_file = source_file.into();

        if name.is_empty() {
            return Err(AliasError::EmptyName);
        }
        if url.is_empty() {
            return Err(AliasError::InvalidUrl(name));
        }

        if let Some(existing) = self.aliases.get(&name) {
            if existing.url == url {
                return Ok(self);
            }
            return Err(AliasError::Conflicting {
                name,
                url1: existing.url.clone(),
                file1: existing.source_file.clone(),
                url2: url,
                file2: source_file,
            });
        }

        self.aliases.insert(
            name.clone(),
            Alias {
                name,
                url,
                source_file,
            },
        );
        Ok(self)
    }

    /// Freeze the table
    pub fn build(self) -> AliasTable {
        AliasTable {
            aliases: self.aliases,
        }
    }
}

/// Immutable token -> canonical URL lookup
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    aliases: HashMap<String, Alias>,
}

impl AliasTable {
    /// Resolve a token to its URL
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(|a| a.url.as_str())
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

/// Whether a reference is an alias token rather than a URL or plain type name
pub fn is_alias_token(reference: &str) -> bool {
    reference.starts_with('$')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_resolve() {
        let mut builder = AliasTableBuilder::new();
        builder
            .add("$LNC", "http://loinc.org", "aliases.fsh")
            .unwrap()
            .add(
                "p-thoracic-drainage",
                "http://example.org/StructureDefinition/p-thoracic-drainage",
                "SD.json",
            )
            .unwrap();
        let table = builder.build();

        assert_eq!(table.len(), 2);
        assert_eq!(table.resolve("$LNC"), Some("http://loinc.org"));
        assert_eq!(
            table.resolve("p-thoracic-drainage"),
            Some("http://example.org/StructureDefinition/p-thoracic-drainage")
        );
    }

    #[test]
    fn test_identical_redefinition_is_tolerated() {
        let mut builder = AliasTableBuilder::new();
        builder.add("$SCT", "http://snomed.info/sct", "a.fsh").unwrap();
        builder.add("$SCT", "http://snomed.info/sct", "b.fsh").unwrap();
        assert_eq!(builder.build().len(), 1);
    }

    #[test]
    fn test_conflicting_definition() {
        let mut builder = AliasTableBuilder::new();
        builder.add("$SCT", "http://snomed.info/sct", "a.fsh").unwrap();
        let err = builder
            .add("$SCT", "http://different.url", "b.fsh")
            .unwrap_err();
        assert!(matches!(err, AliasError::Conflicting { .. }));
    }

    #[test]
    fn test_empty_url() {
        let mut builder = AliasTableBuilder::new();
        assert_eq!(
            builder.add("$TEST", "", "a.fsh").unwrap_err(),
            AliasError::InvalidUrl("$TEST".to_string())
        );
    }

    #[test]
    fn test_is_alias_token() {
        assert!(is_alias_token("$SCT"));
        assert!(!is_alias_token("http://loinc.org"));
        assert!(!is_alias_token("Observation"));
    }
}
