//! Parser for the FHIR validator's console output
//!
//! When several files are validated in one run the validator prints one block
//! per file, separated by lines of dashes:
//!
//! ```text
//! -- /out/Observation-obs1.json -------------------------
//! Success: 0 errors, 1 warnings, 0 notes
//!   Warning @ Observation.code (line 12, col 4): ...
//! -------------------------------------------------------
//! ```
//!
//! A single-file run has no header and names the file on an indented
//! `Validate <file>` line instead. Blocks without a status line (the banner,
//! the trailing timing summary) are ignored.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

static BLOCK_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n-{4,}").unwrap());

static FILE_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^-- (?P<file>.*?) -{4,}\s*$").unwrap());

static VALIDATE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^  Validate (?P<file>\S.*?)\s*$").unwrap());

static STATUS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?P<status>\*FAILURE\*|Success): (?P<errors>\d+) errors, (?P<warnings>\d+) warnings, (?P<notes>\d+) notes",
    )
    .unwrap()
});

static MESSAGE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^  (?P<message>(?P<level>Error|Warning|Information) @ .*?)\s*$").unwrap()
});

/// Overall status of one validated file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    Success,
    Failure,
}

/// Errors while reading validator output
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutputError {
    #[error("validator output block {block} has a status line but no file name")]
    MissingFileName { block: usize },

    #[error("validator output block {block} names more than one file")]
    MultipleFileNames { block: usize },

    #[error("validator output contains no result")]
    Empty,
}

/// Result for one validated file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputBlock {
    /// File name as printed by the validator
    pub file: String,
    pub status: BlockStatus,
    pub n_errors: usize,
    pub n_warnings: usize,
    pub n_notes: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub notes: Vec<String>,
    /// Raw text of the block
    pub raw: String,
}

impl OutputBlock {
    /// Parse one block; `Ok(None)` when it holds no status line
    fn parse(block: &str, position: usize) -> Result<Option<Self>, OutputError> {
        let Some(status) = STATUS_LINE.captures(block) else {
            return Ok(None);
        };

        let file = match FILE_HEADER.captures(block) {
            Some(caps) => caps["file"].trim().to_string(),
            None => {
                let mut names = VALIDATE_LINE.captures_iter(block);
                let first = names
                    .next()
                    .ok_or(OutputError::MissingFileName { block: position })?;
                if names.next().is_some() {
                    return Err(OutputError::MultipleFileNames { block: position });
                }
                first["file"].to_string()
            }
        };

        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut notes = Vec::new();
        for caps in MESSAGE_LINE.captures_iter(block) {
            let message = caps["message"].to_string();
            match &caps["level"] {
                "Error" => errors.push(message),
                "Warning" => warnings.push(message),
                _ => notes.push(message),
            }
        }

        let count = |name: &str| status[name].parse::<usize>().unwrap_or_default();
        Ok(Some(OutputBlock {
            file,
            status: if &status["status"] == "Success" {
                BlockStatus::Success
            } else {
                BlockStatus::Failure
            },
            n_errors: count("errors"),
            n_warnings: count("warnings"),
            n_notes: count("notes"),
            errors,
            warnings,
            notes,
            raw: block.trim_matches('\n').to_string(),
        }))
    }

    pub fn failed(&self) -> bool {
        self.status == BlockStatus::Failure
    }

    /// Base name of the validated file
    pub fn file_name(&self) -> &str {
        Path::new(&self.file)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.file)
    }

    /// Status line as printed by the validator
    pub fn summary(&self) -> String {
        format!(
            "{}: {} errors, {} warnings, {} notes",
            if self.failed() { "*FAILURE*" } else { "Success" },
            self.n_errors,
            self.n_warnings,
            self.n_notes
        )
    }
}

/// Split validator output into per-file blocks, in output order
pub fn parse_output(output: &str) -> Result<Vec<OutputBlock>, OutputError> {
    let normalized = output.replace("\r\n", "\n");
    let mut blocks = Vec::new();
    for (position, block) in BLOCK_SEPARATOR.split(&normalized).enumerate() {
        if block.trim().is_empty() {
            continue;
        }
        if let Some(parsed) = OutputBlock::parse(block, position)? {
            blocks.push(parsed);
        }
    }

    if blocks.is_empty() {
        return Err(OutputError::Empty);
    }
    Ok(blocks)
}
