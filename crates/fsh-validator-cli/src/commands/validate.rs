//! Validate command

use crate::Cli;
use crate::commands::download::ensure_validator;
use crate::output::ReportPrinter;
use fsh_validator_core::config::VALIDATOR_JAR;
use fsh_validator_core::{
    Pipeline, ProjectLayout, Result, SelectionFilter, ValidatorConfig, ValidatorError,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Run a validation and print the report; returns the process exit code
pub async fn validate_command(cli: &Cli) -> Result<i32> {
    // File names are checked before anything on disk is touched
    let filter = selection_filter(cli)?;

    let project = match &cli.project {
        Some(path) => path.clone(),
        None => std::env::current_dir().map_err(|e| ValidatorError::io_error(".", e))?,
    };
    let layout = ProjectLayout::discover(&project)?;
    info!("FSH project: {}", layout.base_path().display());

    let config = build_config(cli, layout)?;
    debug!("Run options: {:?}", config);

    ensure_validator(&config.validator, &cli.validator_url).await?;

    let report = Pipeline::new(config).run(&filter).await?;
    ReportPrinter::new(cli.format).print(&report)?;

    Ok(report.exit_code())
}

fn selection_filter(cli: &Cli) -> Result<SelectionFilter> {
    if cli.all {
        match &cli.subdir {
            Some(subdir) => SelectionFilter::all_in(subdir),
            None => Ok(SelectionFilter::all()),
        }
    } else {
        SelectionFilter::files(cli.filenames.iter().cloned())
    }
}

fn build_config(cli: &Cli, layout: ProjectLayout) -> Result<ValidatorConfig> {
    let mut config = ValidatorConfig::new(layout);

    if let Some(path) = &cli.validator_path {
        config.validator = validator_location(path)?;
    }
    if let Some(java) = &cli.java {
        config.java = java.clone();
    }
    if let Some(batch_size) = cli.batch_size {
        config.max_batch_size = batch_size as usize;
    }
    if let Some(timeout) = cli.timeout {
        config.batch_timeout = Duration::from_secs(timeout);
    }
    if let Some(log_path) = &cli.log_path {
        config.log_dir = Some(absolute(log_path)?);
    }
    config.concurrency = cli.jobs as usize;
    config.run_transpiler = !cli.no_sushi;
    config.verbose = cli.verbose > 0;

    Ok(config)
}

/// An existing file is the validator itself; anything else is the
/// directory that holds (or will hold) the validator jar
fn validator_location(path: &Path) -> Result<PathBuf> {
    let path = absolute(path)?;
    if path.is_file() {
        Ok(path)
    } else {
        Ok(path.join(VALIDATOR_JAR))
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|e| ValidatorError::io_error(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("fsh-validator").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_filter_from_filenames() {
        let cli = parse(&["a.fsh", "b.fsh"]);
        assert_eq!(
            selection_filter(&cli).unwrap(),
            SelectionFilter::Files(vec!["a.fsh".into(), "b.fsh".into()])
        );
    }

    #[test]
    fn test_filter_rejects_paths() {
        let cli = parse(&["../secret.fsh"]);
        assert!(matches!(
            selection_filter(&cli),
            Err(ValidatorError::InvalidFileName { .. })
        ));
    }

    #[test]
    fn test_filter_for_subdir() {
        let cli = parse(&["--all", "--subdir", "labs"]);
        assert_eq!(
            selection_filter(&cli).unwrap(),
            SelectionFilter::All {
                subdir: PathBuf::from("labs")
            }
        );
    }

    #[test]
    fn test_config_from_flags() {
        let cli = parse(&[
            "--all",
            "--no-sushi",
            "--batch-size",
            "10",
            "-j",
            "3",
            "--timeout",
            "60",
            "--validator-path",
            "/opt/validators",
        ]);
        let config = build_config(&cli, ProjectLayout::new("/project")).unwrap();

        assert!(!config.run_transpiler);
        assert_eq!(config.max_batch_size, 10);
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.batch_timeout, Duration::from_secs(60));
        assert_eq!(
            config.validator,
            PathBuf::from("/opt/validators").join(VALIDATOR_JAR)
        );
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["--all"]);
        let config = build_config(&cli, ProjectLayout::new("/project")).unwrap();
        assert!(config.run_transpiler);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.validator, PathBuf::from("/project").join(VALIDATOR_JAR));
    }
}
