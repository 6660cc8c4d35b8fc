//! Result type alias for validation orchestration

use crate::error::ValidatorError;

/// Standard Result type for validation orchestration
pub type Result<T> = std::result::Result<T, ValidatorError>;
