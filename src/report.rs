use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::patch::Patch;
use crate::program::Program;

/// Modification point summary for one target file.
#[derive(Debug, Serialize)]
pub struct FileInspect {
    pub file: PathBuf,
    pub points: usize,
}

/// Machine-readable description of a loaded program.
#[derive(Debug, Serialize)]
pub struct InspectReport {
    pub tool: &'static str,
    pub version: &'static str,
    pub program_root: PathBuf,
    pub test_command: String,
    pub files: Vec<FileInspect>,
}

impl InspectReport {
    pub fn new(program: &Program) -> Self {
        let files = program
            .target_files()
            .iter()
            .map(|file| FileInspect {
                file: file.clone(),
                points: program.modification_points()[file].len(),
            })
            .collect();

        Self {
            tool: "graft",
            version: env!("CARGO_PKG_VERSION"),
            program_root: program.path().to_path_buf(),
            test_command: program.test_command().to_string(),
            files,
        }
    }
}

/// Machine-readable outcome of evaluating one patch.
#[derive(Debug, Serialize)]
pub struct EvaluationReport {
    pub tool: &'static str,
    pub version: &'static str,
    pub program_root: PathBuf,
    pub patch: String,
    pub edits: usize,
    pub atomics: usize,
    pub compiled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fitness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvaluationReport {
    pub fn from_patch(program_root: &Path, patch: &Patch<'_>) -> Self {
        Self {
            tool: "graft",
            version: env!("CARGO_PKG_VERSION"),
            program_root: program_root.to_path_buf(),
            patch: patch.to_string(),
            edits: patch.len(),
            atomics: patch.atomics(None).len(),
            compiled: patch.compiled(),
            fitness: patch.fitness(),
            elapsed_ms: patch
                .elapsed_time()
                .map(|elapsed| elapsed.as_millis() as u64),
            error: None,
        }
    }

    /// Report for a run that failed before any patch could be evaluated.
    pub fn failure(program_root: &Path, error: String) -> Self {
        Self {
            tool: "graft",
            version: env!("CARGO_PKG_VERSION"),
            program_root: program_root.to_path_buf(),
            patch: String::new(),
            edits: 0,
            atomics: 0,
            compiled: false,
            fitness: None,
            elapsed_ms: None,
            error: Some(error),
        }
    }
}
