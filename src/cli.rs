use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::config::Config;
use crate::contents::Granularity;
use crate::edit::Edit;
use crate::log::Log;
use crate::patch::Patch;
use crate::program::Program;
use crate::report::{EvaluationReport, InspectReport};
use crate::select::SelectionMethod;

const EXIT_OK: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_NOT_COMPILED: i32 = 2;

/// Top-level CLI arguments for the `graft` binary.
#[derive(Debug, Parser)]
#[command(
    name = "graft",
    version,
    about = "Search-based program transformation and patch evaluation"
)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands supported by `graft`.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load a program and list its target files and modification points.
    Inspect {
        /// Path to the program root.
        #[arg(long, default_value = ".")]
        program: PathBuf,

        /// Config file to use instead of `.graft.json` in the program root.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print every modification point with its source text.
        #[arg(long)]
        points: bool,

        /// Only list points of this target file (implies --points).
        #[arg(long)]
        file: Option<PathBuf>,

        /// Emit a machine-readable JSON report to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Evaluate the unmodified program with its test command.
    Baseline {
        /// Path to the program root.
        #[arg(long, default_value = ".")]
        program: PathBuf,

        /// Config file to use instead of `.graft.json` in the program root.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Emit a machine-readable JSON report to stdout.
        #[arg(long)]
        json: bool,

        /// Also write a log file into this directory.
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// Show diagnostic detail on the terminal.
        #[arg(long, short = 'v')]
        verbose: bool,
    },

    /// Draw random edits into a patch and optionally evaluate it.
    Sample {
        /// Path to the program root.
        #[arg(long, default_value = ".")]
        program: PathBuf,

        /// Config file to use instead of `.graft.json` in the program root.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of random edits to draw.
        #[arg(long, default_value_t = 1)]
        edits: usize,

        /// Seed for the random draws; the same seed reproduces the patch.
        #[arg(long)]
        seed: Option<u64>,

        /// Run the test command on the sampled patch.
        #[arg(long)]
        eval: bool,

        /// Emit a machine-readable JSON report to stdout.
        #[arg(long)]
        json: bool,

        /// Also write a log file into this directory.
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// Show diagnostic detail on the terminal.
        #[arg(long, short = 'v')]
        verbose: bool,
    },
}

fn print_json_and_exit<T: Serialize>(report: &T, exit_code: i32) -> ! {
    let json = serde_json::to_string_pretty(report).expect("serialize report to json");
    println!("{json}");
    std::process::exit(exit_code);
}

/// Build the logging sink for a run. With a log directory, everything is
/// mirrored into `<dir>/<program>_<timestamp>.log`.
fn make_log(json: bool, verbose: bool, log_dir: Option<&Path>, root: &Path) -> Result<Log> {
    let log = Log::new(json).verbose(verbose);
    let Some(dir) = log_dir else {
        return Ok(log);
    };

    let name = root
        .canonicalize()
        .ok()
        .and_then(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "program".to_string());
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    let path = dir.join(format!("{name}_{timestamp}.log"));

    log.with_file(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}

fn load_program(root: &Path, config: Option<&Path>, log: &Log) -> Result<Program> {
    let config = match config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => Config::load(root)
            .with_context(|| format!("failed to read config in {}", root.display()))?,
    };

    Program::from_config(root, config, Granularity::Line, log.clone())
        .with_context(|| format!("failed to load program at {}", root.display()))
}

/// Draw one edit of a uniformly chosen kind.
fn random_edit(program: &Program, rng: &mut fastrand::Rng) -> crate::error::Result<Edit> {
    match rng.usize(0..4) {
        0 => Edit::random_insertion(program, rng, None, SelectionMethod::Random),
        1 => Edit::random_deletion(program, rng, None, SelectionMethod::Random),
        2 => Edit::random_replacement(program, rng, None, SelectionMethod::Random),
        _ => Edit::random_moving(program, rng, None, SelectionMethod::Random),
    }
}

/// Parse CLI arguments and dispatch the selected command.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Inspect {
            program,
            config,
            points,
            file,
            json,
        } => {
            let log = Log::new(json);
            let root = program;
            let mut program = load_program(&root, config.as_deref(), &log)?;

            log.info(format!("program: {}", program.path().display()));
            log.info(format!("test command: {}", program.test_command()));
            for target in program.target_files() {
                log.info(format!(
                    "{}: {} modification points",
                    target.display(),
                    program.modification_points()[target].len()
                ));
            }

            if points || file.is_some() {
                match &file {
                    Some(file) => program.print_modification_points(file, None)?,
                    None => {
                        for target in program.target_files() {
                            program.print_modification_points(target, None)?;
                        }
                    }
                }
            }

            let report = InspectReport::new(&program);
            program.dispose().context("failed to clean up workspace")?;

            if json {
                print_json_and_exit(&report, EXIT_OK);
            }
            Ok(())
        }

        Command::Baseline {
            program,
            config,
            json,
            log_dir,
            verbose,
        } => {
            let log = make_log(json, verbose, log_dir.as_deref(), &program)?;
            let root = program;

            log.info("graft: baseline");
            log.info(format!("program: {}", root.display()));

            let mut program = match load_program(&root, config.as_deref(), &log) {
                Ok(program) => program,
                Err(err) => {
                    if json {
                        let report = EvaluationReport::failure(&root, format!("{err:#}"));
                        print_json_and_exit(&report, EXIT_ERROR);
                    }
                    return Err(err);
                }
            };

            log.info(format!("test command: {}", program.test_command()));

            let mut patch = Patch::new(&program);
            if let Err(err) = patch.run_test() {
                let cleanup = program.dispose();
                if json {
                    let report = EvaluationReport::failure(&root, format!("{err:#}"));
                    print_json_and_exit(&report, EXIT_ERROR);
                }
                cleanup.context("failed to clean up workspace")?;
                return Err(err).context("failed to evaluate the baseline");
            }

            let report = EvaluationReport::from_patch(program.path(), &patch);
            match report.fitness {
                Some(fitness) => log.info(format!("baseline fitness: {fitness}")),
                None => log.error("baseline failed: the test command produced no fitness"),
            }
            if let Some(elapsed_ms) = report.elapsed_ms {
                log.debug(format!("test command took {elapsed_ms} ms"));
            }

            program.dispose().context("failed to clean up workspace")?;

            let exit_code = if report.compiled {
                EXIT_OK
            } else {
                EXIT_NOT_COMPILED
            };
            if json {
                print_json_and_exit(&report, exit_code);
            }
            if exit_code != EXIT_OK {
                std::process::exit(exit_code);
            }
            Ok(())
        }

        Command::Sample {
            program,
            config,
            edits,
            seed,
            eval,
            json,
            log_dir,
            verbose,
        } => {
            let log = make_log(json, verbose, log_dir.as_deref(), &program)?;
            let root = program;

            log.info("graft: sample");
            log.info(format!("program: {}", root.display()));

            let mut program = match load_program(&root, config.as_deref(), &log) {
                Ok(program) => program,
                Err(err) => {
                    if json {
                        let report = EvaluationReport::failure(&root, format!("{err:#}"));
                        print_json_and_exit(&report, EXIT_ERROR);
                    }
                    return Err(err);
                }
            };

            let mut rng = match seed {
                Some(seed) => fastrand::Rng::with_seed(seed),
                None => fastrand::Rng::new(),
            };

            let mut patch = Patch::new(&program);
            for _ in 0..edits {
                match random_edit(&program, &mut rng) {
                    Ok(edit) => {
                        log.debug(format!("drew {edit}"));
                        patch.add(edit);
                    }
                    Err(err) => {
                        let cleanup = program.dispose();
                        if json {
                            let report = EvaluationReport::failure(&root, format!("{err:#}"));
                            print_json_and_exit(&report, EXIT_ERROR);
                        }
                        cleanup.context("failed to clean up workspace")?;
                        return Err(err).context("failed to draw a random edit");
                    }
                }
            }
            log.info(format!("patch: {patch}"));

            if eval {
                if let Err(err) = patch.run_test() {
                    let cleanup = program.dispose();
                    if json {
                        let report = EvaluationReport::failure(&root, format!("{err:#}"));
                        print_json_and_exit(&report, EXIT_ERROR);
                    }
                    cleanup.context("failed to clean up workspace")?;
                    return Err(err).context("failed to evaluate the sampled patch");
                }
                match patch.fitness() {
                    Some(fitness) => log.info(format!("fitness: {fitness}")),
                    None => log.warning("the sampled patch did not produce a fitness"),
                }
            }

            let report = EvaluationReport::from_patch(program.path(), &patch);
            program.dispose().context("failed to clean up workspace")?;

            if json {
                print_json_and_exit(&report, EXIT_OK);
            }
            Ok(())
        }
    }
}
