mod config;
mod deployment;
mod descriptor;
mod digest;
mod error;
mod history;
mod queue;

pub use config::{Settings, DEFAULT_SETTINGS_FILE};
pub use deployment::Deployment;
pub use descriptor::{HeaderLine, RunMode, ScriptDescriptor};
pub use digest::sha256_hex_file;
pub use error::{DeploymentError, HeaderError, HistoryError, QueueError};
pub use history::History;
pub use queue::{build_queue, QueueReport, SkipReason, SkippedEntry};
