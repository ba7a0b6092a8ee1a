//! Engine for search-based program transformation.
//!
//! A [`program::Program`] is loaded from a root directory and a config
//! naming its test command and target files. Source is parsed into
//! addressable modification points, [`edit::Edit`]s rearrange those points,
//! and a [`patch::Patch`] collects edits and evaluates the resulting variant
//! by running the test command in an isolated workspace copy. Randomness is
//! injected by the caller, so searches are reproducible from a seed.

pub mod cli;
pub mod config;
pub mod contents;
pub mod edit;
pub mod error;
pub mod log;
pub mod patch;
pub mod program;
pub mod report;
pub mod runner;
pub mod select;
pub mod variant;
pub mod workspace;

pub use error::{Error, Result};
