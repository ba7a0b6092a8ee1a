use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Captured outcome of one external test command run.
#[derive(Debug)]
pub struct TestOutput {
    /// Exit code of the command (if it exited normally).
    pub exit_code: Option<i32>,

    /// Did the command succeed (exit status 0)?
    pub success: bool,

    /// Captured standard output of the command.
    pub stdout: String,

    /// Captured standard error of the command.
    pub stderr: String,

    /// How long the command ran.
    pub duration: Duration,
}

/// Run `command` inside `workdir` and capture its streams.
///
/// The command is split on whitespace; the first token is the executable.
/// Returns an error only when the command is empty or the process cannot be
/// spawned. A non-zero exit is a result, not an error.
pub fn run_test_command(command: &str, workdir: &Path) -> Result<TestOutput> {
    let mut parts = command.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| Error::Validation("test command is empty".to_string()))?;

    let started = Instant::now();
    let output = Command::new(program)
        .args(parts)
        .current_dir(workdir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()?;
    let duration = started.elapsed();

    Ok(TestOutput {
        exit_code: output.status.code(),
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        duration,
    })
}

/// Default fitness parser: the whole of stdout, stripped, as one float.
pub fn parse_fitness(stdout: &str, _stderr: &str) -> Result<f64> {
    let text = stdout.trim();
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(Error::InvalidPatch(format!(
            "test output {text:?} is not a fitness value"
        ))),
    }
}
