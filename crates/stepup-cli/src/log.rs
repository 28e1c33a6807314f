use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::Local;
use indicatif::ProgressBar;

use crate::render::{self, OutputStyle};

/// Tee for user-visible output: the terminal (unless quiet) plus the
/// timestamped append-only log file. `Description:` lines never reach the
/// file.
pub struct RunLog {
    file: Option<File>,
    quiet: bool,
    style: OutputStyle,
    progress: Option<ProgressBar>,
}

impl RunLog {
    /// Opens the log for appending. When the file cannot be opened the log
    /// degrades to terminal-only output; the returned warning says why.
    pub fn open(path: &Path, quiet: bool, style: OutputStyle) -> (Self, Option<String>) {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let mut warning = None;
        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(file),
            Err(err) => {
                warning = Some(format!(
                    "cannot open log file '{}': {err}; continuing without file logging",
                    path.display()
                ));
                None
            }
        };
        (
            Self {
                file,
                quiet,
                style,
                progress: None,
            },
            warning,
        )
    }

    pub fn style(&self) -> OutputStyle {
        self.style
    }

    /// Routes terminal output through `bar` while a progress bar is live, so
    /// streamed script lines print above it instead of clobbering it.
    pub fn attach_progress(&mut self, bar: Option<ProgressBar>) {
        self.progress = bar;
    }

    /// A user-visible line: terminal plus log file.
    pub fn message(&mut self, text: &str) {
        self.to_terminal(text.to_string());
        self.to_file(text);
    }

    /// A status-prefixed line, colored in rich mode.
    pub fn status(&mut self, status: &str, text: &str) {
        self.to_terminal(render::render_status_line(self.style, status, text));
        self.to_file(&format!("{status}: {text}"));
    }

    /// Terminal only; the log file never records description text.
    pub fn description(&mut self, text: &str) {
        self.to_terminal(format!("Description: {text}"));
    }

    /// Log file only; used for fatal reports that already went to stderr.
    pub fn record(&mut self, text: &str) {
        self.to_file(text);
    }

    fn to_terminal(&self, text: String) {
        if self.quiet {
            return;
        }
        match &self.progress {
            Some(bar) => bar.println(text),
            None => println!("{text}"),
        }
    }

    fn to_file(&mut self, text: &str) {
        // Best effort: a failing log write must not abort an upgrade.
        if let Some(file) = self.file.as_mut() {
            let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
            let _ = writeln!(file, "[{stamp}] {text}");
        }
    }
}
