//! SUSHI invocation

use crate::error::ValidatorError;
use crate::result::Result;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Default transpiler binary
pub const SUSHI: &str = "sushi";

/// Runs the FSH transpiler on a project
#[derive(Debug, Clone)]
pub struct Transpiler {
    program: PathBuf,
}

impl Default for Transpiler {
    fn default() -> Self {
        Self::new(SUSHI)
    }
}

impl Transpiler {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Transpile `base_path`, regenerating `fsh-generated/resources`
    pub async fn run(&self, base_path: &Path) -> Result<()> {
        info!("Running {} on {}", self.program.display(), base_path.display());

        let output = Command::new(&self.program)
            .arg(base_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ValidatorError::transpiler_error(format!(
                        "{} not found; install it with `npm install -g fsh-sushi`",
                        self.program.display()
                    ))
                } else {
                    ValidatorError::transpiler_error(format!(
                        "could not start {}: {e}",
                        self.program.display()
                    ))
                }
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines() {
            debug!("sushi: {}", line);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr
                .lines()
                .chain(stdout.lines())
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("no output");
            return Err(ValidatorError::transpiler_error(format!(
                "{} failed ({}): {}",
                self.program.display(),
                output.status,
                detail.trim()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_transpiler_error() {
        let transpiler = Transpiler::new("/does/not/exist/sushi");
        let err = transpiler.run(Path::new(".")).await.unwrap_err();
        assert!(matches!(err, ValidatorError::TranspilerError { .. }));
        assert!(err.to_string().contains("not found"));
    }
}
