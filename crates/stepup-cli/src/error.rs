use thiserror::Error;

use stepup_core::{DeploymentError, HeaderError, HistoryError, QueueError};

/// The fixed exit code enumeration for the whole tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    /// The run stopped early but is safe to resume: an operator "no" or a
    /// failed step.
    Interrupted,
    General,
    NotRoot,
    ServiceStop,
    OptionParse,
    Validation,
    DeploymentDetect,
    /// A step was terminated by a signal.
    ExternallyStopped,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Interrupted => 1,
            Self::General => 2,
            Self::NotRoot => 3,
            Self::ServiceStop => 4,
            Self::OptionParse => 101,
            Self::Validation => 102,
            Self::DeploymentDetect => 103,
            Self::ExternallyStopped => 127,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Interrupted => "interrupted",
            Self::General => "general-error",
            Self::NotRoot => "not-root",
            Self::ServiceStop => "stop-error",
            Self::OptionParse => "option-parse-error",
            Self::Validation => "validation-error",
            Self::DeploymentDetect => "deployment-detection-error",
            Self::ExternallyStopped => "externally-stopped",
        }
    }
}

/// Fatal failures; each variant maps to one taxonomy code.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("stepup must run as root (pass --skip-root-check to override)")]
    NotRoot,
    #[error("failed to stop managed services: {0:#}")]
    ServiceStop(anyhow::Error),
    #[error("managed services are still running: {0:#} (pass --skip-service-check to override)")]
    ServicesRunning(anyhow::Error),
    #[error(transparent)]
    Validation(#[from] HeaderError),
    #[error(transparent)]
    DeploymentDetect(#[from] DeploymentError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    General(#[from] anyhow::Error),
}

impl FatalError {
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            Self::NotRoot => ExitStatus::NotRoot,
            Self::ServiceStop(_) | Self::ServicesRunning(_) => ExitStatus::ServiceStop,
            Self::Validation(_) => ExitStatus::Validation,
            Self::DeploymentDetect(_) => ExitStatus::DeploymentDetect,
            Self::History(_) | Self::General(_) => ExitStatus::General,
        }
    }
}

impl From<QueueError> for FatalError {
    fn from(err: QueueError) -> Self {
        match err {
            // A malformed step header is a validation failure; everything
            // else the queue can hit is generic I/O.
            QueueError::Header(err) => Self::Validation(err),
            other => Self::General(anyhow::Error::new(other)),
        }
    }
}

/// Error text with the full source chain inlined, for single-line reporting.
pub fn render_error_chain(err: &FatalError) -> String {
    let mut rendered = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
