use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Validation failures for one step file's comment header.
#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("step '{}' is missing required header '{field}'", path.display())]
    MissingField { path: PathBuf, field: &'static str },
    #[error("step '{}' has invalid run mode '{value}': expected 'once' or 'always'", path.display())]
    InvalidRunMode { path: PathBuf, value: String },
    #[error("step '{}' declares an empty apply list", path.display())]
    EmptyApplyList { path: PathBuf },
    #[error("failed to read step '{}'", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error("failed to read deployment configuration '{}'", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to read history file '{}'", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to record '{step}' in history file '{}'", path.display())]
    Append {
        path: PathBuf,
        step: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Header(#[from] HeaderError),
    #[error("failed to list step directory '{}'", dir.display())]
    ListDir {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to inspect step entry '{}'", path.display())]
    Inspect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
