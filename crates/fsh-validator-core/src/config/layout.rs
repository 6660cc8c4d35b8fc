//! SUSHI project directory layout
//!
//! FSH sources live in `<base>/input/fsh/`, generated resources in
//! `<base>/fsh-generated/resources/`.

use crate::error::ValidatorError;
use crate::result::Result;
use std::path::{Component, Path, PathBuf};

/// Resolved directories of one FSH project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    base_path: PathBuf,
}

impl ProjectLayout {
    /// Use `base_path` as the project root without probing the file system
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Locate the project root from the root itself, from `input/`, or from
    /// any path inside `input/fsh/`
    pub fn discover(path: &Path) -> Result<Self> {
        let path = std::path::absolute(path).map_err(|e| ValidatorError::io_error(path, e))?;

        if path.join("input").join("fsh").is_dir() {
            return Ok(Self::new(path));
        }

        if path.file_name().is_some_and(|name| name == "input")
            && path.join("fsh").is_dir()
            && let Some(parent) = path.parent()
        {
            return Ok(Self::new(parent));
        }

        let components: Vec<Component<'_>> = path.components().collect();
        for i in 0..components.len().saturating_sub(1) {
            if components[i].as_os_str() == "input" && components[i + 1].as_os_str() == "fsh" {
                let base: PathBuf = components[..i].iter().collect();
                return Ok(Self::new(base));
            }
        }

        Err(ValidatorError::config_error(format!(
            "Could not find fsh input path (input/fsh/) in \"{}\"",
            path.display()
        )))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Directory holding the FSH sources
    pub fn input_dir(&self) -> PathBuf {
        self.base_path.join("input").join("fsh")
    }

    /// Directory holding the transpiler output
    pub fn output_dir(&self) -> PathBuf {
        self.base_path.join("fsh-generated").join("resources")
    }
}
