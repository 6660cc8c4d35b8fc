//! Error types for discovery and validation orchestration

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for validation runs
///
/// Every variant here aborts the run. Per-instance problems (skips, failed
/// validator batches) are never errors; they end up as results in the report.
#[derive(Debug, Error)]
pub enum ValidatorError {
    /// Malformed or unresolvable generated artifact
    #[error("Parse error in '{}': {message}", path.display())]
    ParseError { path: PathBuf, message: String },

    /// A profile referenced by an instance or a derivation is not indexed
    #[error("Unknown profile '{profile}'")]
    UnknownProfile { profile: String },

    /// A derived-from chain revisits a profile
    #[error("Cyclic derivation: {}", chain.join(" → "))]
    CyclicDerivation { chain: Vec<String> },

    /// Explicit filename that is not a plain basename
    #[error("Invalid file name '{name}': {reason}")]
    InvalidFileName { name: String, reason: String },

    /// A requested file or directory does not exist
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// Configuration loading or validation errors
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// The transpiler could not be run or reported a failure
    #[error("Transpiler error: {message}")]
    TranspilerError { message: String },

    /// File system I/O errors
    #[error("IO error for path '{}': {source}", path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl ValidatorError {
    /// Create a parse error for a generated artifact
    pub fn parse_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an unknown profile error
    pub fn unknown_profile(profile: impl Into<String>) -> Self {
        Self::UnknownProfile {
            profile: profile.into(),
        }
    }

    /// Create an invalid file name error
    pub fn invalid_file_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFileName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a file not found error
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a transpiler error
    pub fn transpiler_error(message: impl Into<String>) -> Self {
        Self::TranspilerError {
            message: message.into(),
        }
    }

    /// Create an IO error with path context
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            source,
        }
    }

    /// Create an internal error
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for ValidatorError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError {
            path: PathBuf::new(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_culprit() {
        assert_eq!(
            ValidatorError::unknown_profile("p-missing").to_string(),
            "Unknown profile 'p-missing'"
        );
        assert!(
            ValidatorError::invalid_file_name("../a.fsh", "path separator")
                .to_string()
                .contains("'../a.fsh'")
        );
    }

    #[test]
    fn test_cyclic_message_shows_chain() {
        let err = ValidatorError::CyclicDerivation {
            chain: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "Cyclic derivation: a → b → a");
    }
}
