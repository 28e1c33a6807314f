use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::descriptor::{RunMode, ScriptDescriptor};
use crate::error::HistoryError;

/// Append-only record of the "once" steps that have completed.
///
/// Persisted as one file name per line; the file is never rewritten or
/// compacted.
#[derive(Debug)]
pub struct History {
    path: PathBuf,
    done: BTreeSet<String>,
}

impl History {
    /// Loads the history file; a missing file means nothing is done yet.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, HistoryError> {
        let path = path.into();
        let done = match fs::read_to_string(&path) {
            Ok(raw) => raw
                .lines()
                .map(|line| line.trim().to_string())
                .filter(|line| !line.is_empty())
                .collect(),
            Err(source) if source.kind() == ErrorKind::NotFound => BTreeSet::new(),
            Err(source) => return Err(HistoryError::Read { path, source }),
        };
        Ok(Self { path, done })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// "always" steps are never considered done, regardless of the file.
    pub fn is_done(&self, step: &ScriptDescriptor) -> bool {
        step.run == RunMode::Once && self.done.contains(&step.file_name)
    }

    /// Appends the step's file name; a no-op for "always" steps and steps
    /// already recorded.
    pub fn mark_done(&mut self, step: &ScriptDescriptor) -> Result<(), HistoryError> {
        if step.run == RunMode::Always || self.done.contains(&step.file_name) {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| HistoryError::Append {
                path: self.path.clone(),
                step: step.file_name.clone(),
                source,
            })?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| HistoryError::Append {
                path: self.path.clone(),
                step: step.file_name.clone(),
                source,
            })?;
        writeln!(file, "{}", step.file_name).map_err(|source| HistoryError::Append {
            path: self.path.clone(),
            step: step.file_name.clone(),
            source,
        })?;
        self.done.insert(step.file_name.clone());
        Ok(())
    }
}
