use std::env;
use std::fmt::Display;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use console::{Term, style};

use crate::error::Result;

/// Logging sink the engine reports through. Constructed by the caller and
/// threaded into `Program`; there is no global logger.
///
/// - normal mode: human output to stdout, warnings and errors to stderr
/// - `json` mode: ALL human output to stderr (stdout stays machine-readable)
/// - fancy styling only on a real TTY and when NO_COLOR/CI are not set
/// - with a file attached, every line is mirrored as `[LEVEL] message`
#[derive(Debug, Clone)]
pub struct Log {
    out: Term,
    err: Term,
    fancy: bool,
    enabled: bool,
    verbose: bool,
    file: Option<Arc<Mutex<File>>>,
}

impl Log {
    pub fn new(json: bool) -> Self {
        // In json mode, keep stdout clean for JSON and send all human output to stderr.
        let out = if json { Term::stderr() } else { Term::stdout() };
        let err = Term::stderr();

        // Fancy output must only activate when the stream used for human output is a TTY.
        let out_is_tty = out.is_term();

        let no_color = env::var_os("NO_COLOR").is_some();
        let in_ci = env::var_os("CI").is_some();

        Self {
            out,
            err,
            fancy: out_is_tty && !no_color && !in_ci,
            enabled: true,
            verbose: false,
            file: None,
        }
    }

    /// Sink that writes to no terminal. Useful for tests and embedding.
    pub fn silent() -> Self {
        Self {
            out: Term::stdout(),
            err: Term::stderr(),
            fancy: false,
            enabled: false,
            verbose: false,
            file: None,
        }
    }

    /// Also show debug lines on the terminal.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Mirror every line into the file at `path`, one `[LEVEL] message` per
    /// line. Parent directories are created as needed.
    pub fn with_file(mut self, path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        self.file = Some(Arc::new(Mutex::new(File::create(path)?)));
        Ok(self)
    }

    fn write_out(&self, s: &str) {
        if self.enabled {
            let _ = self.out.write_line(s);
        }
    }

    fn write_err(&self, s: &str) {
        if self.enabled {
            let _ = self.err.write_line(s);
        }
    }

    fn write_file(&self, level: &str, msg: &str) {
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = writeln!(file, "[{level}] {msg}");
            }
        }
    }

    /// Diagnostic detail. Always lands in the log file; shown on the
    /// terminal only in verbose mode.
    pub fn debug(&self, msg: impl Display) {
        let s = msg.to_string();
        self.write_file("DEBUG", &s);
        if !self.verbose {
            return;
        }
        if self.fancy {
            self.write_out(&style(s).dim().to_string());
        } else {
            self.write_out(&s);
        }
    }

    pub fn info(&self, msg: impl Display) {
        let s = msg.to_string();
        self.write_file("INFO", &s);
        self.write_out(&s);
    }

    pub fn warning(&self, msg: impl Display) {
        let s = msg.to_string();
        self.write_file("WARNING", &s);
        if self.fancy {
            self.write_err(&style(s).yellow().to_string());
        } else {
            self.write_err(&s);
        }
    }

    pub fn error(&self, msg: impl Display) {
        let s = msg.to_string();
        self.write_file("ERROR", &s);
        if self.fancy {
            self.write_err(&style(s).red().bold().to_string());
        } else {
            self.write_err(&s);
        }
    }
}
