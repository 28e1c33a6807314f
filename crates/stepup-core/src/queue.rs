use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::deployment::Deployment;
use crate::descriptor::ScriptDescriptor;
use crate::error::QueueError;
use crate::history::History;

/// Why a directory entry was left out of the queue without being parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Directory,
    NotExecutable,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::NotExecutable => "not executable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// The ordered steps left after deployment and history filtering, plus the
/// entries that were set aside before parsing.
#[derive(Debug)]
pub struct QueueReport {
    pub steps: Vec<ScriptDescriptor>,
    pub skipped: Vec<SkippedEntry>,
}

/// Builds the execution queue for one run.
///
/// Directories and non-executable files are recorded as skipped, not fatal.
/// A malformed header in any remaining entry fails the whole build. The
/// resulting order is the lexicographic order of file names, which is also
/// the execution order.
pub fn build_queue(
    dir: &Path,
    deployment: Deployment,
    history: &History,
) -> Result<QueueReport, QueueError> {
    let entries = fs::read_dir(dir).map_err(|source| QueueError::ListDir {
        dir: dir.to_path_buf(),
        source,
    })?;

    let mut candidates = Vec::new();
    let mut skipped = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| QueueError::ListDir {
            dir: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let metadata = fs::metadata(&path).map_err(|source| QueueError::Inspect {
            path: path.clone(),
            source,
        })?;
        if metadata.is_dir() {
            skipped.push(SkippedEntry {
                path,
                reason: SkipReason::Directory,
            });
            continue;
        }
        if metadata.permissions().mode() & 0o111 == 0 {
            skipped.push(SkippedEntry {
                path,
                reason: SkipReason::NotExecutable,
            });
            continue;
        }
        candidates.push(path);
    }

    // Directory listing order is not stable across filesystems.
    candidates.sort();
    skipped.sort_by(|left, right| left.path.cmp(&right.path));

    let mut steps = Vec::new();
    for path in candidates {
        let step = ScriptDescriptor::from_path(&path)?;
        if step.is_applicable(deployment) && !history.is_done(&step) {
            steps.push(step);
        }
    }

    Ok(QueueReport { steps, skipped })
}
