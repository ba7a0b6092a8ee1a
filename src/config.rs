use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Name of the config file looked up in a program's root directory.
pub const DEFAULT_CONFIG_FILE: &str = ".graft.json";

/// Evaluation contract for one program, read from its config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Command run inside a workspace to score a variant.
    pub test_command: String,

    /// Files eligible for modification, relative to the program root.
    pub target_files: Vec<PathBuf>,
}

impl Config {
    /// Read the default config file from a program root.
    pub fn load(program_root: &Path) -> Result<Self> {
        Self::from_file(&program_root.join(DEFAULT_CONFIG_FILE))
    }

    /// Read a config from an explicit path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::Parse {
            file: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        serde_json::from_str(&text).map_err(|e| Error::Parse {
            file: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_reads_default_config_file() {
        let dir = TempDir::new().expect("TempDir should create");
        std::fs::write(
            dir.path().join(DEFAULT_CONFIG_FILE),
            r#"{"test_command": "pytest -q", "target_files": ["src/app.py"]}"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).expect("config should load");
        assert_eq!(config.test_command, "pytest -q");
        assert_eq!(config.target_files, [PathBuf::from("src/app.py")]);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let dir = TempDir::new().expect("TempDir should create");
        let path = dir.path().join("other.json");
        std::fs::write(
            &path,
            r#"{"test_command": "true", "target_files": [], "comment": "scratch"}"#,
        )
        .unwrap();

        let config = Config::from_file(&path).expect("config should load");
        assert_eq!(config.test_command, "true");
        assert!(config.target_files.is_empty());
    }

    #[test]
    fn missing_key_is_a_parse_error() {
        let dir = TempDir::new().expect("TempDir should create");
        let path = dir.path().join("broken.json");
        std::fs::write(&path, r#"{"test_command": "true"}"#).unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }), "got {err:?}");
    }

    #[test]
    fn missing_file_is_a_parse_error() {
        let dir = TempDir::new().expect("TempDir should create");

        let err = Config::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }), "got {err:?}");
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = Config {
            test_command: "make check".to_string(),
            target_files: vec![PathBuf::from("lib/core.c"), PathBuf::from("lib/util.c")],
        };

        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
