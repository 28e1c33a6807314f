use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::DeploymentError;

/// Which product variant the target installation is configured as.
///
/// The variant gates which steps apply: a step's `apply` list must contain
/// the active deployment's name for the step to be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Deployment {
    Katello,
    Headpin,
}

impl Deployment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Katello => "katello",
            Self::Headpin => "headpin",
        }
    }

    /// Accepts the identifiers operators use on the command line. `sam`
    /// installs report as the headpin variant.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "katello" => Some(Self::Katello),
            "headpin" | "sam" => Some(Self::Headpin),
            _ => None,
        }
    }

    /// Classifies the installation from the product configuration file.
    pub fn detect(config: &Path) -> Result<Self, DeploymentError> {
        let raw = fs::read_to_string(config).map_err(|source| DeploymentError::Unreadable {
            path: config.to_path_buf(),
            source,
        })?;
        Ok(Self::from_config_str(&raw))
    }

    /// Scans for a `deployment = <value>` assignment. The values `headpin`
    /// and `sam` classify the target as the alternate variant; anything
    /// else, including no assignment at all, is the default.
    pub fn from_config_str(raw: &str) -> Self {
        for line in raw.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            if key.trim() != "deployment" {
                continue;
            }
            let value = value.trim().trim_matches(|ch| ch == '"' || ch == '\'');
            if matches!(value, "headpin" | "sam") {
                return Self::Headpin;
            }
        }
        Self::Katello
    }
}
