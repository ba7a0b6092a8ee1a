use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the engine.
///
/// Construction and argument errors are returned eagerly. Failures of the
/// external test command are not errors at all: they are absorbed into the
/// evaluation state of the patch being run (see `Patch::run_test`).
#[derive(Debug, Error)]
pub enum Error {
    /// A target file or config file could not be read or parsed.
    #[error("failed to parse {}: {reason}", file.display())]
    Parse { file: PathBuf, reason: String },

    /// Invalid argument: unknown target file, malformed weights, and so on.
    #[error("{0}")]
    Validation(String),

    /// The test command's output could not be turned into a fitness value.
    #[error("{0}")]
    InvalidPatch(String),

    /// An edit index that no longer exists in the patch.
    #[error("edit index {index} out of range for patch of length {len}")]
    StaleIndex { index: usize, len: usize },

    #[error(transparent)]
    Io(#[from] io::Error),
}
