//! CLI command implementations

pub mod download;
pub mod validate;
