//! Batched execution of the external FHIR validator
//!
//! Tasks are grouped by the `-profile` argument they need and chunked into
//! batches. Each batch is one validator process with its own temporary
//! workspace. Batches run with bounded concurrency; results come back in
//! task order whatever the completion order.

use crate::config::{PackageDependency, ValidatorConfig};
use crate::task::{Outcome, ValidationResult, ValidationTask};
use crate::validator_output::{OutputBlock, parse_output};
use futures::stream::{self, StreamExt};
use indexmap::IndexMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Settings shared by every batch of a run
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Validator jar or executable
    pub validator: PathBuf,

    /// Java binary used for `.jar` validators
    pub java: PathBuf,

    pub fhir_version: String,

    /// Generated resources, passed to the validator as an IG
    pub output_dir: PathBuf,

    /// Packages passed as `-ig package#version`
    pub dependencies: Vec<PackageDependency>,

    pub max_batch_size: usize,

    /// Batches running at the same time
    pub concurrency: usize,

    /// Wall-clock limit per validator process
    pub timeout: Duration,

    /// Directory for one log file per batch
    pub log_dir: Option<PathBuf>,

    /// Echo raw validator output to the log
    pub verbose: bool,
}

impl BatchOptions {
    pub fn from_config(
        config: &ValidatorConfig,
        fhir_version: impl Into<String>,
        dependencies: Vec<PackageDependency>,
    ) -> Self {
        Self {
            validator: config.validator.clone(),
            java: config.java.clone(),
            fhir_version: fhir_version.into(),
            output_dir: config.layout.output_dir(),
            dependencies,
            max_batch_size: config.max_batch_size,
            concurrency: config.concurrency,
            timeout: config.batch_timeout,
            log_dir: config.log_dir.clone(),
            verbose: config.verbose,
        }
    }
}

/// Tasks sharing one validator invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// 1-based position in the run
    pub number: usize,

    /// `-profile` argument, if any
    pub profile: Option<String>,

    pub tasks: Vec<ValidationTask>,
}

/// Group tasks by `-profile` argument and chunk the groups
///
/// Groups appear in order of their first task; tasks keep their order
/// within a group.
pub fn plan_batches(tasks: Vec<ValidationTask>, max_batch_size: usize) -> Vec<Batch> {
    let max_batch_size = max_batch_size.max(1);

    let mut groups: IndexMap<Option<String>, Vec<ValidationTask>> = IndexMap::new();
    for task in tasks {
        let key = task.target.profile_argument().map(str::to_string);
        groups.entry(key).or_default().push(task);
    }

    let mut batches = Vec::new();
    for (profile, tasks) in groups {
        for chunk in tasks.chunks(max_batch_size) {
            batches.push(Batch {
                number: batches.len() + 1,
                profile: profile.clone(),
                tasks: chunk.to_vec(),
            });
        }
    }
    batches
}

/// Runs validator batches
#[derive(Debug, Clone)]
pub struct BatchValidator {
    options: BatchOptions,
}

impl BatchValidator {
    pub fn new(options: BatchOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// Validate all tasks and return one result per task, ordered by `seq`
    pub async fn run(&self, tasks: Vec<ValidationTask>) -> Vec<ValidationResult> {
        if tasks.is_empty() {
            return Vec::new();
        }

        let batches = plan_batches(tasks, self.options.max_batch_size);
        info!(
            "Validating in {} batch(es), up to {} at a time",
            batches.len(),
            self.options.concurrency.max(1)
        );

        let per_batch: Vec<Vec<ValidationResult>> = stream::iter(batches)
            .map(|batch| self.run_batch(batch))
            .buffered(self.options.concurrency.max(1))
            .collect()
            .await;

        let mut results: Vec<ValidationResult> = per_batch.into_iter().flatten().collect();
        results.sort_by_key(|r| r.seq);
        results
    }

    /// Program and arguments for one batch
    pub fn command_line(&self, batch: &Batch, workspace: &Path) -> (PathBuf, Vec<OsString>) {
        let mut args: Vec<OsString> = Vec::new();

        let is_jar = self
            .options
            .validator
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jar"));
        let program = if is_jar {
            args.push("-jar".into());
            args.push(self.options.validator.clone().into());
            self.options.java.clone()
        } else {
            self.options.validator.clone()
        };

        args.push("-version".into());
        args.push(self.options.fhir_version.clone().into());
        args.push("-txLog".into());
        args.push(workspace.join("txlog.html").into());
        for dependency in &self.options.dependencies {
            args.push("-ig".into());
            args.push(dependency.coordinate().into());
        }
        args.push("-ig".into());
        args.push(self.options.output_dir.clone().into());
        if let Some(profile) = &batch.profile {
            args.push("-profile".into());
            args.push(profile.into());
        }
        args.extend(batch.tasks.iter().map(|t| t.file.clone().into_os_string()));

        (program, args)
    }

    async fn run_batch(&self, batch: Batch) -> Vec<ValidationResult> {
        let label = batch.profile.as_deref().unwrap_or("declared profiles");
        info!(
            "Batch {}: {} instance(s) against {}",
            batch.number,
            batch.tasks.len(),
            label
        );

        let workspace = match tempfile::Builder::new()
            .prefix("fsh-validator-batch-")
            .tempdir()
        {
            Ok(dir) => dir,
            Err(e) => {
                let message = format!("could not create batch workspace: {e}");
                return fail_all(&batch, &message, None);
            }
        };

        let (program, args) = self.command_line(&batch, workspace.path());
        debug!("Running {} {:?}", program.display(), args);

        let mut command = Command::new(&program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let run = tokio::time::timeout(self.options.timeout, command.output()).await;
        let (results, output) = match run {
            Err(_) => {
                warn!(
                    "Batch {} timed out after {}s",
                    batch.number,
                    self.options.timeout.as_secs()
                );
                let message = format!(
                    "validator timed out after {}s",
                    self.options.timeout.as_secs()
                );
                (fail_all(&batch, &message, None), message)
            }
            Ok(Err(e)) => {
                warn!(
                    "Batch {}: could not start {}: {}",
                    batch.number,
                    program.display(),
                    e
                );
                let message = format!("could not start validator {}: {e}", program.display());
                (fail_all(&batch, &message, None), message)
            }
            Ok(Ok(output)) => {
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stderr.trim().is_empty() {
                    text.push('\n');
                    text.push_str(&stderr);
                }
                if self.options.verbose {
                    for line in text.lines() {
                        info!("[batch {}] {}", batch.number, line);
                    }
                }
                (interpret(&batch, output.status, &text), text)
            }
        };

        self.write_batch_log(&batch, &program, &args, &output).await;
        results
    }

    async fn write_batch_log(
        &self,
        batch: &Batch,
        program: &Path,
        args: &[OsString],
        output: &str,
    ) {
        let Some(log_dir) = &self.options.log_dir else {
            return;
        };

        let command = std::iter::once(program.as_os_str())
            .chain(args.iter().map(OsString::as_os_str))
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        let content = format!("$ {command}\n\n{output}\n");
        let path = log_dir.join(format!("batch-{:03}.log", batch.number));

        let written = async {
            tokio::fs::create_dir_all(log_dir).await?;
            tokio::fs::write(&path, content).await
        };
        if let Err(e) = written.await {
            warn!("Could not write batch log {}: {}", path.display(), e);
        }
    }
}

/// Map one finished process to per-task results
///
/// Exit code 1 together with complete, matching output that reports at
/// least one failing file is how the validator signals validation errors;
/// any other non-zero exit fails the whole batch.
fn interpret(batch: &Batch, status: ExitStatus, output: &str) -> Vec<ValidationResult> {
    let raw = Some(output.to_string());

    let blocks = match parse_output(output) {
        Ok(blocks) => blocks,
        Err(e) if status.success() => {
            return fail_all(batch, &format!("could not parse validator output: {e}"), raw);
        }
        Err(_) => return fail_all(batch, &exit_message(status), raw),
    };

    if let Err(message) = check_blocks(batch, &blocks) {
        let message = if status.success() {
            message
        } else {
            exit_message(status)
        };
        return fail_all(batch, &message, raw);
    }

    let reports_failures = blocks.iter().any(OutputBlock::failed);
    if !status.success() && !(status.code() == Some(1) && reports_failures) {
        return fail_all(batch, &exit_message(status), raw);
    }

    batch
        .tasks
        .iter()
        .zip(blocks)
        .map(|(task, block)| block_result(task, block))
        .collect()
}

fn check_blocks(batch: &Batch, blocks: &[OutputBlock]) -> Result<(), String> {
    if blocks.len() != batch.tasks.len() {
        return Err(format!(
            "validator reported {} result(s) for {} file(s)",
            blocks.len(),
            batch.tasks.len()
        ));
    }

    for (task, block) in batch.tasks.iter().zip(blocks) {
        let expected = task
            .file
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        if block.file_name() != expected {
            return Err(format!(
                "validator output for {} does not match submitted file {}",
                block.file_name(),
                expected
            ));
        }
    }
    Ok(())
}

fn block_result(task: &ValidationTask, block: OutputBlock) -> ValidationResult {
    let outcome = if block.failed() {
        let diagnostics = if block.errors.is_empty() {
            vec![block.summary()]
        } else {
            block.errors
        };
        Outcome::Failed { diagnostics }
    } else {
        Outcome::Passed {
            warnings: block.warnings,
            notes: block.notes,
        }
    };

    ValidationResult {
        seq: task.seq,
        instance: task.instance.clone(),
        profile: Some(task.target.url().to_string()),
        outcome,
        output: Some(block.raw),
    }
}

fn exit_message(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("validator exited with status {code}"),
        None => "validator was terminated by a signal".to_string(),
    }
}

fn fail_all(batch: &Batch, diagnostic: &str, output: Option<String>) -> Vec<ValidationResult> {
    warn!("Batch {} failed: {}", batch.number, diagnostic);
    batch
        .tasks
        .iter()
        .map(|task| ValidationResult::batch_failure(task, diagnostic, output.clone()))
        .collect()
}
