use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

pub const DEFAULT_SETTINGS_FILE: &str = "/etc/stepup.conf";

const DEFAULT_SCRIPTS_DIR: &str = "/usr/share/stepup/scripts";
const DEFAULT_HISTORY_FILE: &str = "/var/lib/stepup/history";
const DEFAULT_LOG_FILE: &str = "/var/log/stepup/upgrade.log";
const DEFAULT_DEPLOYMENT_FILE: &str = "/etc/katello/katello-configure.conf";

/// Everything the tool needs to know about the machine it runs on.
///
/// Defaults point at the installed locations; any field can be overridden
/// through the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub scripts_dir: PathBuf,
    pub history_file: PathBuf,
    pub log_file: PathBuf,
    pub deployment_file: PathBuf,
    /// Argv vector that stops managed services.
    pub stop_command: Vec<String>,
    /// Argv vector that verifies all managed services are stopped.
    pub status_command: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scripts_dir: PathBuf::from(DEFAULT_SCRIPTS_DIR),
            history_file: PathBuf::from(DEFAULT_HISTORY_FILE),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            deployment_file: PathBuf::from(DEFAULT_DEPLOYMENT_FILE),
            stop_command: vec!["katello-service".to_string(), "stop".to_string()],
            status_command: vec!["katello-service".to_string(), "allstopped".to_string()],
        }
    }
}

impl Settings {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let settings: Self = toml::from_str(input).context("failed to parse settings")?;
        if settings.stop_command.is_empty() {
            bail!("stop_command must not be empty");
        }
        if settings.status_command.is_empty() {
            bail!("status_command must not be empty");
        }
        Ok(settings)
    }

    /// Loads `path` when given (the file must exist), otherwise the default
    /// settings file when present, otherwise built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
                Self::from_toml_str(&raw)
                    .with_context(|| format!("invalid settings file '{}'", path.display()))
            }
            None => {
                let default = Path::new(DEFAULT_SETTINGS_FILE);
                match fs::read_to_string(default) {
                    Ok(raw) => Self::from_toml_str(&raw)
                        .with_context(|| format!("invalid settings file '{}'", default.display())),
                    Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
                    Err(err) => Err(err).with_context(|| {
                        format!("failed to read settings file '{}'", default.display())
                    }),
                }
            }
        }
    }
}
