use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::Config;
use crate::contents::{Element, FileContents, Granularity};
use crate::edit::Point;
use crate::error::{Error, Result};
use crate::log::Log;
use crate::select::{self, SelectionMethod};
use crate::workspace::Workspace;

/// A program under transformation.
///
/// Loading parses every target file once and derives its modification
/// points; both stay immutable for the lifetime of the value. Each program
/// owns a private workspace directory where variants are materialised, so
/// evaluation never touches the original tree.
#[derive(Debug)]
pub struct Program {
    name: String,
    path: PathBuf,
    timestamp: u64,
    test_command: String,
    target_files: Vec<PathBuf>,
    granularity: Granularity,
    contents: BTreeMap<PathBuf, FileContents>,
    modification_points: BTreeMap<PathBuf, Vec<usize>>,
    modification_weights: BTreeMap<PathBuf, Vec<f64>>,
    workspace: Workspace,
    log: Log,
}

impl Program {
    /// Load a program from its configuration file in `root`.
    pub fn load(root: &Path, granularity: Granularity, log: Log) -> Result<Self> {
        let config = Config::load(root)?;
        Self::from_config(root, config, granularity, log)
    }

    /// Load a program from an already parsed configuration.
    pub fn from_config(
        root: &Path,
        config: Config,
        granularity: Granularity,
        log: Log,
    ) -> Result<Self> {
        let path = root.canonicalize().map_err(|err| {
            Error::Validation(format!(
                "program root {} is not accessible: {err}",
                root.display()
            ))
        })?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::Validation(format!("program root {} has no name", path.display()))
            })?;

        let test_command = config.test_command.trim().to_string();
        if test_command.is_empty() {
            return Err(Error::Validation("test command is empty".to_string()));
        }

        let mut target_files = Vec::new();
        for file in config.target_files {
            if file.is_absolute() || file.components().any(|c| c == Component::ParentDir) {
                return Err(Error::Validation(format!(
                    "target file {} escapes the program root",
                    file.display()
                )));
            }
            if !target_files.contains(&file) {
                target_files.push(file);
            }
        }
        if target_files.is_empty() {
            return Err(Error::Validation("no target files configured".to_string()));
        }

        let mut contents = BTreeMap::new();
        let mut modification_points = BTreeMap::new();
        for file in &target_files {
            let text = fs::read_to_string(path.join(file)).map_err(|err| Error::Parse {
                file: file.clone(),
                reason: err.to_string(),
            })?;
            let parsed = granularity.parse(&text);
            modification_points.insert(file.clone(), parsed.modification_points());
            contents.insert(file.clone(), parsed);
        }

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        let workspace = Workspace::create(&path, &name, timestamp)?;
        log.info(&format!(
            "program variants workspace: {}",
            workspace.path().display()
        ));

        Ok(Self {
            name,
            path,
            timestamp,
            test_command,
            target_files,
            granularity,
            contents,
            modification_points,
            modification_weights: BTreeMap::new(),
            workspace,
            log,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical root of the original program tree.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn test_command(&self) -> &str {
        &self.test_command
    }

    pub fn target_files(&self) -> &[PathBuf] {
        &self.target_files
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Pristine parsed contents of every target file.
    pub fn contents(&self) -> &BTreeMap<PathBuf, FileContents> {
        &self.contents
    }

    /// Modification point tables, one per target file.
    pub fn modification_points(&self) -> &BTreeMap<PathBuf, Vec<usize>> {
        &self.modification_points
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn log(&self) -> &Log {
        &self.log
    }

    /// Element behind a modification point in the pristine contents.
    pub fn element_at(&self, point: &Point) -> Option<Element> {
        let index = *self.modification_points.get(&point.file)?.get(point.index)?;
        self.contents.get(&point.file)?.element(index)
    }

    /// Draw a modification point at random.
    ///
    /// With no `target_file` the file itself is drawn uniformly first. A
    /// weighted draw on a file with no weights set degrades to uniform
    /// rather than failing, so callers can opt into weighting per file.
    pub fn random_target(
        &self,
        rng: &mut fastrand::Rng,
        target_file: Option<&Path>,
        method: SelectionMethod,
    ) -> Result<Point> {
        let file = match target_file {
            Some(file) => file.to_path_buf(),
            None => {
                if self.target_files.is_empty() {
                    return Err(Error::Validation("no target files configured".to_string()));
                }
                self.target_files[select::uniform_index(rng, self.target_files.len())].clone()
            }
        };

        let points = self.modification_points.get(&file).ok_or_else(|| {
            Error::Validation(format!("{} is not a target file", file.display()))
        })?;
        if points.is_empty() {
            return Err(Error::Validation(format!(
                "{} has no modification points",
                file.display()
            )));
        }

        let index = match self.modification_weights.get(&file) {
            Some(weights) if method == SelectionMethod::Weighted => {
                select::weighted_index(rng, weights)
            }
            _ => select::uniform_index(rng, points.len()),
        };
        Ok(Point::new(file, index))
    }

    /// Attach per-point selection weights to a target file.
    ///
    /// Each weight must lie in `[0, 1]` and the table must keep at least one
    /// positive entry, otherwise a weighted draw would have nothing to pick.
    pub fn set_modification_weights(&mut self, file: &Path, weights: &[f64]) -> Result<()> {
        let points = self.modification_points.get(file).ok_or_else(|| {
            Error::Validation(format!("{} is not a target file", file.display()))
        })?;
        if weights.len() != points.len() {
            return Err(Error::Validation(format!(
                "{} weights for {} modification points in {}",
                weights.len(),
                points.len(),
                file.display()
            )));
        }
        if weights.iter().any(|w| !(0.0..=1.0).contains(w)) {
            return Err(Error::Validation(format!(
                "weights for {} must lie in [0, 1]",
                file.display()
            )));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(Error::Validation(format!(
                "weights for {} sum to zero",
                file.display()
            )));
        }
        self.modification_weights
            .insert(file.to_path_buf(), weights.to_vec());
        Ok(())
    }

    /// Write variant contents into the workspace copy of the program.
    ///
    /// Only target files may be written; everything else in the workspace
    /// stays as copied from the original tree.
    pub fn materialize(&self, files: &BTreeMap<PathBuf, FileContents>) -> Result<()> {
        for file in files.keys() {
            if !self.target_files.contains(file) {
                return Err(Error::Validation(format!(
                    "{} is not a target file",
                    file.display()
                )));
            }
        }
        for (file, contents) in files {
            self.workspace.write_file(file, &contents.to_source())?;
        }
        Ok(())
    }

    /// Log every modification point of a file, or the given subset.
    pub fn print_modification_points(
        &self,
        file: &Path,
        indices: Option<&[usize]>,
    ) -> Result<()> {
        let points = self.modification_points.get(file).ok_or_else(|| {
            Error::Validation(format!("{} is not a target file", file.display()))
        })?;

        let all: Vec<usize> = (0..points.len()).collect();
        for &index in indices.unwrap_or(&all) {
            let point = Point::new(file, index);
            match self.element_at(&point) {
                Some(element) => self.log.info(&format!("{point}: {}", element.as_text())),
                None => self.log.warning(&format!("{point}: no such point")),
            }
        }
        Ok(())
    }

    /// Drop the workspace directory. Safe to call more than once.
    pub fn dispose(&mut self) -> Result<()> {
        self.workspace.dispose()
    }
}
