//! Validator download

use fsh_validator_core::config::VALIDATOR_JAR;
use fsh_validator_core::{Result, ValidatorError};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Latest HL7 validator CLI release
pub const VALIDATOR_URL: &str =
    "https://github.com/hapifhir/org.hl7.fhir.core/releases/latest/download/validator_cli.jar";

/// Make sure `validator` exists, downloading the jar from `url` when it is
/// missing
///
/// Only the standard jar name is downloaded; a missing custom validator is
/// an error. Progress goes to stderr, stdout is reserved for the report.
pub async fn ensure_validator(validator: &Path, url: &str) -> Result<()> {
    if validator.is_file() {
        return Ok(());
    }
    if validator.file_name().is_none_or(|name| name != VALIDATOR_JAR) {
        return Err(ValidatorError::file_not_found(validator));
    }

    eprintln!("Downloading FHIR validator to {}", validator.display());
    download_validator(url, validator).await
}

/// Fetch the validator jar from `url` to `target`
pub async fn download_validator(url: &str, target: &Path) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(600))
        .build()
        .map_err(|e| ValidatorError::config_error(format!("Failed to build HTTP client: {e}")))?;

    info!("Downloading {}...", url);
    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| ValidatorError::config_error(format!("HTTP error: {e}")))?;

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ValidatorError::config_error(format!("Failed to read response: {e}")))?;

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ValidatorError::io_error(parent, e))?;
    }

    // A partial download must never be mistaken for a usable jar
    let partial = target.with_extension("jar.part");
    tokio::fs::write(&partial, &bytes)
        .await
        .map_err(|e| ValidatorError::io_error(&partial, e))?;
    tokio::fs::rename(&partial, target)
        .await
        .map_err(|e| ValidatorError::io_error(target, e))?;

    info!("Downloaded {} bytes to {}", bytes.len(), target.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_existing_validator_is_kept() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let jar = temp_dir.path().join(VALIDATOR_JAR);
        std::fs::write(&jar, b"jar").unwrap();
        ensure_validator(&jar, VALIDATOR_URL).await.unwrap();
        assert_eq!(std::fs::read(&jar).unwrap(), b"jar");
    }

    #[tokio::test]
    async fn test_missing_custom_validator_is_an_error() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let err = ensure_validator(&temp_dir.path().join("my-validator"), VALIDATOR_URL)
            .await
            .unwrap_err();
        assert!(matches!(err, ValidatorError::FileNotFound { .. }));
    }
}
