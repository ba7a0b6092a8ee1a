use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::contents::FileContents;
use crate::edit::{Edit, EditKind};
use crate::error::{Error, Result};
use crate::program::Program;
use crate::runner;
use crate::variant::VariantContents;

/// An ordered list of edits against one program, plus its evaluation state.
///
/// A patch never mutates the program it points at. Evaluation state is
/// tracked alongside the edits: `compiled` starts out true and only turns
/// false when a test run fails, and any change to the edit list resets the
/// whole evaluation, so stale fitness values cannot leak.
#[derive(Debug)]
pub struct Patch<'a> {
    program: &'a Program,
    edit_list: Vec<Edit>,
    fitness: Option<f64>,
    compiled: bool,
    elapsed_time: Option<Duration>,
}

impl<'a> Patch<'a> {
    /// Empty patch: applying it reproduces the program as parsed.
    pub fn new(program: &'a Program) -> Self {
        Self {
            program,
            edit_list: Vec::new(),
            fitness: None,
            compiled: true,
            elapsed_time: None,
        }
    }

    pub fn program(&self) -> &'a Program {
        self.program
    }

    pub fn edit_list(&self) -> &[Edit] {
        &self.edit_list
    }

    pub fn len(&self) -> usize {
        self.edit_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edit_list.is_empty()
    }

    /// Fitness from the last test run, if it produced one.
    pub fn fitness(&self) -> Option<f64> {
        self.fitness
    }

    /// False only when the last test run failed to produce a fitness.
    pub fn compiled(&self) -> bool {
        self.compiled
    }

    /// Wall-clock duration of the last completed test command run.
    pub fn elapsed_time(&self) -> Option<Duration> {
        self.elapsed_time
    }

    /// Append an edit. Invalidates any previous evaluation.
    pub fn add(&mut self, edit: Edit) {
        self.edit_list.push(edit);
        self.reset_evaluation();
    }

    /// Remove and return the edit at `index`. Invalidates any previous
    /// evaluation.
    pub fn remove(&mut self, index: usize) -> Result<Edit> {
        if index >= self.edit_list.len() {
            return Err(Error::StaleIndex {
                index,
                len: self.edit_list.len(),
            });
        }
        let edit = self.edit_list.remove(index);
        self.reset_evaluation();
        Ok(edit)
    }

    /// Copy of this patch with the same edits against the same program.
    /// Evaluation state is not copied; the copy starts unevaluated.
    pub fn clone(&self) -> Patch<'a> {
        Self {
            program: self.program,
            edit_list: self.edit_list.clone(),
            fitness: None,
            compiled: true,
            elapsed_time: None,
        }
    }

    /// Flatten the edit list into atomic edits, optionally keeping only one
    /// kind. Composite edits contribute each of their constituents.
    pub fn atomics(&self, kind: Option<EditKind>) -> Vec<Edit> {
        self.edit_list
            .iter()
            .flat_map(Edit::atomic_operators)
            .filter(|atomic| kind.map_or(true, |kind| atomic.kind() == kind))
            .collect()
    }

    /// Apply every edit in order to pristine contents.
    ///
    /// Returns only the files the patch actually touches; callers merge the
    /// result over the remaining target files when they need a full variant.
    pub fn apply(&self) -> BTreeMap<PathBuf, FileContents> {
        let mut touched = BTreeSet::new();
        for edit in &self.edit_list {
            for atomic in edit.atomic_operators() {
                touched.insert(atomic.target().file.clone());
            }
        }

        let mut variant =
            VariantContents::checkout(self.program, touched.iter().map(PathBuf::as_path));
        for edit in &self.edit_list {
            variant = edit.apply(self.program, variant);
        }
        variant.into_files()
    }

    /// Evaluate this patch with the default fitness parser: the test
    /// command's stdout, stripped, read as one float.
    pub fn run_test(&mut self) -> Result<()> {
        self.run_test_with(runner::parse_fitness)
    }

    /// Evaluate this patch, parsing fitness out of the test command's
    /// streams with `parser`.
    ///
    /// The variant is materialised into the program's workspace, with
    /// untouched target files restored to their pristine contents, and the
    /// configured test command runs there. Failures of the command itself
    /// are absorbed: the patch ends up with `compiled() == false` and no
    /// fitness. Only failures to write the workspace propagate as errors.
    pub fn run_test_with(&mut self, parser: impl Fn(&str, &str) -> Result<f64>) -> Result<()> {
        self.reset_evaluation();

        let mut files = self.apply();
        for file in self.program.target_files() {
            if !files.contains_key(file) {
                if let Some(pristine) = self.program.contents().get(file) {
                    files.insert(file.clone(), pristine.clone());
                }
            }
        }
        self.program.materialize(&files)?;

        let log = self.program.log();
        let output = match runner::run_test_command(
            self.program.test_command(),
            self.program.workspace().path(),
        ) {
            Ok(output) => output,
            Err(err) => {
                log.warning(format!("test command did not run: {err}"));
                self.compiled = false;
                return Ok(());
            }
        };
        self.elapsed_time = Some(output.duration);

        if !output.success {
            log.debug(format!(
                "test command exited with status {:?}",
                output.exit_code
            ));
            self.compiled = false;
            return Ok(());
        }

        match parser(&output.stdout, &output.stderr) {
            Ok(fitness) => self.fitness = Some(fitness),
            Err(err) => {
                log.debug(format!("fitness not parsed: {err}"));
                self.compiled = false;
            }
        }
        Ok(())
    }

    fn reset_evaluation(&mut self) {
        self.fitness = None;
        self.compiled = true;
        self.elapsed_time = None;
    }
}

/// Patches are equal when they address the same program root and their
/// edit lists match element for element. Programs loaded separately from
/// one root count as the same program; evaluation state never counts.
impl PartialEq for Patch<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.program.path() == other.program.path() && self.edit_list == other.edit_list
    }
}

impl fmt::Display for Patch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.edit_list.iter().map(Edit::to_string).collect();
        write!(f, "{}", rendered.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::contents::Granularity;
    use crate::edit::Point;
    use crate::log::Log;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn sample_program(lines: &[&str], test_command: &str) -> (TempDir, Program) {
        let dir = TempDir::new().expect("TempDir should create");
        fs::write(dir.path().join("app.txt"), format!("{}\n", lines.join("\n"))).unwrap();
        let config = Config {
            test_command: test_command.to_string(),
            target_files: vec![PathBuf::from("app.txt")],
        };
        let program = Program::from_config(dir.path(), config, Granularity::Line, Log::silent())
            .expect("program should load");
        (dir, program)
    }

    fn point(index: usize) -> Point {
        Point::new("app.txt", index)
    }

    fn source_of(files: &BTreeMap<PathBuf, FileContents>) -> String {
        files[Path::new("app.txt")].to_source()
    }

    #[test]
    fn new_patch_is_empty_and_unevaluated() {
        let (_dir, program) = sample_program(&["a"], "echo 1");
        let patch = Patch::new(&program);

        assert!(patch.is_empty());
        assert_eq!(patch.len(), 0);
        assert!(patch.compiled());
        assert_eq!(patch.fitness(), None);
        assert_eq!(patch.elapsed_time(), None);
        assert_eq!(patch.to_string(), "");
    }

    #[test]
    fn display_joins_edits_in_order() {
        let (_dir, program) = sample_program(&["a", "b", "c"], "echo 1");
        let mut patch = Patch::new(&program);
        patch.add(Edit::Deletion { target: point(0) });
        patch.add(Edit::Moving {
            source: point(1),
            destination: point(2),
        });

        insta::assert_snapshot!(
            patch.to_string(),
            @"Deletion(app.txt:0) | Moving(app.txt:1 -> app.txt:2)"
        );
    }

    #[test]
    fn equality_spans_programs_loaded_from_the_same_root() {
        let (_dir, program) = sample_program(&["a", "b"], "echo 1");
        let reloaded = Program::from_config(
            program.path(),
            Config {
                test_command: "echo 1".to_string(),
                target_files: vec![PathBuf::from("app.txt")],
            },
            Granularity::Line,
            Log::silent(),
        )
        .expect("program should load");

        assert_eq!(Patch::new(&program), Patch::new(&reloaded));

        let mut first = Patch::new(&program);
        let mut second = Patch::new(&reloaded);
        first.add(Edit::Deletion { target: point(0) });
        second.add(Edit::Deletion { target: point(0) });
        assert_eq!(first, second);

        second.add(Edit::Deletion { target: point(1) });
        assert_ne!(first, second);
    }

    #[test]
    fn equality_distinguishes_programs_at_different_roots() {
        let (_dir_a, program_a) = sample_program(&["a", "b"], "echo 1");
        let (_dir_b, program_b) = sample_program(&["a", "b"], "echo 1");

        let mut one = Patch::new(&program_a);
        let mut other = Patch::new(&program_b);
        one.add(Edit::Deletion { target: point(0) });
        other.add(Edit::Deletion { target: point(0) });

        assert_ne!(one, other);
    }

    #[test]
    fn clone_shares_the_program_and_resets_evaluation() {
        let (_dir, program) = sample_program(&["a", "b"], "echo 2.5");
        let mut patch = Patch::new(&program);
        patch.add(Edit::Deletion { target: point(0) });
        patch.run_test().unwrap();
        assert_eq!(patch.fitness(), Some(2.5));

        let copy = patch.clone();
        assert_eq!(copy, patch);
        assert_eq!(copy.fitness(), None);
        assert!(copy.compiled());
        assert_eq!(copy.elapsed_time(), None);
    }

    #[test]
    fn mutating_the_edit_list_resets_evaluation() {
        let (_dir, program) = sample_program(&["a", "b"], "echo 4.0");
        let mut patch = Patch::new(&program);
        patch.run_test().unwrap();
        assert_eq!(patch.fitness(), Some(4.0));
        assert!(patch.elapsed_time().is_some());

        patch.add(Edit::Deletion { target: point(0) });
        assert_eq!(patch.fitness(), None);
        assert!(patch.compiled());
        assert_eq!(patch.elapsed_time(), None);

        patch.run_test().unwrap();
        assert_eq!(patch.fitness(), Some(4.0));
        patch.remove(0).unwrap();
        assert_eq!(patch.fitness(), None);
        assert!(patch.compiled());
    }

    #[test]
    fn remove_returns_the_edit_and_rejects_stale_indices() {
        let (_dir, program) = sample_program(&["a", "b"], "echo 1");
        let mut patch = Patch::new(&program);
        patch.add(Edit::Deletion { target: point(0) });
        patch.add(Edit::Deletion { target: point(1) });

        let removed = patch.remove(0).unwrap();
        assert_eq!(removed, Edit::Deletion { target: point(0) });
        assert_eq!(patch.edit_list(), [Edit::Deletion { target: point(1) }]);

        let err = patch.remove(5).unwrap_err();
        assert!(
            matches!(err, Error::StaleIndex { index: 5, len: 1 }),
            "got {err:?}"
        );
    }

    #[test]
    fn atomics_flatten_composites_and_filter_by_kind() {
        let (_dir, program) = sample_program(&["a", "b", "c"], "echo 1");
        let mut patch = Patch::new(&program);
        patch.add(Edit::Deletion { target: point(0) });
        patch.add(Edit::Moving {
            source: point(1),
            destination: point(2),
        });

        assert_eq!(patch.len(), 2);
        assert_eq!(patch.atomics(None).len(), 3);
        assert_eq!(patch.atomics(Some(EditKind::Deletion)).len(), 2);
        assert_eq!(patch.atomics(Some(EditKind::Insertion)).len(), 1);
        assert_eq!(patch.atomics(Some(EditKind::Replacement)).len(), 0);
        assert_eq!(patch.atomics(Some(EditKind::Moving)).len(), 0);
    }

    #[test]
    fn insertion_grows_the_file_by_one() {
        let (_dir, program) = sample_program(&["a", "b", "c"], "echo 1");
        let mut patch = Patch::new(&program);
        patch.add(Edit::Insertion {
            target: point(0),
            ingredient: point(0),
        });

        let files = patch.apply();
        assert_eq!(files[Path::new("app.txt")].len(), 4);
        assert_eq!(source_of(&files), "a\na\nb\nc\n");
    }

    #[test]
    fn deletion_shrinks_the_file_by_one() {
        let (_dir, program) = sample_program(&["a", "b", "c"], "echo 1");
        let mut patch = Patch::new(&program);
        patch.add(Edit::Deletion { target: point(1) });

        let files = patch.apply();
        assert_eq!(files[Path::new("app.txt")].len(), 2);
        assert_eq!(source_of(&files), "a\nc\n");
    }

    #[test]
    fn moving_relocates_the_source_element() {
        let (_dir, program) = sample_program(&["a", "b", "c"], "echo 1");
        let mut patch = Patch::new(&program);
        patch.add(Edit::Moving {
            source: point(0),
            destination: point(2),
        });

        assert_eq!(source_of(&patch.apply()), "b\na\nc\n");
    }

    #[test]
    fn deletion_then_moving_applies_in_order() {
        let (_dir, program) = sample_program(&["a", "b", "c"], "echo 1");
        let mut patch = Patch::new(&program);
        patch.add(Edit::Deletion { target: point(0) });
        patch.add(Edit::Moving {
            source: point(1),
            destination: point(2),
        });

        assert_eq!(patch.len(), 2);
        assert_eq!(patch.atomics(None).len(), 3);
        assert_eq!(source_of(&patch.apply()), "b\nc\n");
    }

    #[test]
    fn apply_returns_only_touched_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.txt"), "a\nb\n").unwrap();
        fs::write(dir.path().join("lib.txt"), "x\ny\n").unwrap();
        let config = Config {
            test_command: "echo 1".to_string(),
            target_files: vec![PathBuf::from("app.txt"), PathBuf::from("lib.txt")],
        };
        let program = Program::from_config(dir.path(), config, Granularity::Line, Log::silent())
            .expect("program should load");

        let mut patch = Patch::new(&program);
        patch.add(Edit::Deletion { target: point(0) });

        let files = patch.apply();
        assert_eq!(files.len(), 1);
        assert!(files.contains_key(Path::new("app.txt")));

        let empty = Patch::new(&program);
        assert!(empty.apply().is_empty());
    }

    #[test]
    fn run_test_parses_fitness_from_stdout() {
        let (_dir, program) = sample_program(&["a", "b"], "echo 4.2");
        let mut patch = Patch::new(&program);

        patch.run_test().unwrap();
        assert!(patch.compiled());
        assert_eq!(patch.fitness(), Some(4.2));
        assert!(patch.elapsed_time().is_some());
    }

    #[test]
    fn failing_test_command_marks_the_patch_not_compiled() {
        let (_dir, program) = sample_program(&["a", "b"], "false");
        let mut patch = Patch::new(&program);

        patch.run_test().expect("a failing command is not an error");
        assert!(!patch.compiled());
        assert_eq!(patch.fitness(), None);
        assert!(patch.elapsed_time().is_some());
    }

    #[test]
    fn unparseable_output_marks_the_patch_not_compiled() {
        let (_dir, program) = sample_program(&["a", "b"], "echo not-a-score");
        let mut patch = Patch::new(&program);

        patch.run_test().unwrap();
        assert!(!patch.compiled());
        assert_eq!(patch.fitness(), None);
    }

    #[test]
    fn missing_test_binary_marks_the_patch_not_compiled() {
        let (_dir, program) = sample_program(&["a", "b"], "graft-no-such-binary-xyz");
        let mut patch = Patch::new(&program);

        patch.run_test().expect("a missing binary is not an error");
        assert!(!patch.compiled());
        assert_eq!(patch.fitness(), None);
        assert_eq!(patch.elapsed_time(), None);
    }

    #[test]
    fn custom_parser_overrides_fitness_extraction() {
        let (_dir, program) = sample_program(&["a", "b"], "echo score 10 of 30");
        let mut patch = Patch::new(&program);

        patch
            .run_test_with(|stdout, _stderr| {
                stdout
                    .split_whitespace()
                    .nth(1)
                    .and_then(|token| token.parse().ok())
                    .ok_or_else(|| Error::InvalidPatch("no score in output".to_string()))
            })
            .unwrap();
        assert!(patch.compiled());
        assert_eq!(patch.fitness(), Some(10.0));
    }

    #[test]
    fn empty_patch_run_materialises_pristine_contents() {
        let (_dir, program) = sample_program(&["alpha", "beta"], "echo 1");
        let mut patch = Patch::new(&program);

        patch.run_test().unwrap();
        assert!(patch.compiled());
        assert_eq!(patch.fitness(), Some(1.0));
        assert_eq!(
            fs::read_to_string(program.workspace().path().join("app.txt")).unwrap(),
            "alpha\nbeta\n"
        );
    }

    #[test]
    fn reevaluation_restores_untouched_files() {
        let (_dir, program) = sample_program(&["alpha", "beta"], "echo 1");
        let workspace_file = program.workspace().path().join("app.txt");

        let mut deleting = Patch::new(&program);
        deleting.add(Edit::Deletion { target: point(0) });
        deleting.run_test().unwrap();
        assert_eq!(fs::read_to_string(&workspace_file).unwrap(), "beta\n");

        let mut baseline = Patch::new(&program);
        baseline.run_test().unwrap();
        assert_eq!(fs::read_to_string(&workspace_file).unwrap(), "alpha\nbeta\n");
    }
}
