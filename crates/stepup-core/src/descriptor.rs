use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::HeaderError;

/// How often a step is applied across repeated invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Applied exactly one time; completion is tracked in the history file.
    Once,
    /// Re-applied on every invocation; never recorded as done.
    Always,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Once => "once",
            Self::Always => "always",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "once" => Some(Self::Once),
            "always" => Some(Self::Always),
            _ => None,
        }
    }
}

/// One classified line from the top of a step file.
///
/// Header scanning works on these instead of matching patterns inline: the
/// builder folds a sequence of `HeaderLine`s and stops at the first `Code`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderLine<'a> {
    Name(&'a str),
    Apply(Vec<&'a str>),
    Run(&'a str),
    Description(&'a str),
    /// A comment that is not a marker; continues an open description block.
    Comment(&'a str),
    /// The first non-comment line; ends header scanning.
    Code,
}

impl<'a> HeaderLine<'a> {
    pub fn classify(line: &'a str) -> Self {
        let trimmed = line.trim_start();
        if !trimmed.starts_with('#') {
            return Self::Code;
        }
        let body = trimmed.trim_start_matches('#').trim();
        if let Some(value) = body.strip_prefix("name:") {
            Self::Name(value.trim())
        } else if let Some(value) = body.strip_prefix("apply:") {
            Self::Apply(value.split_whitespace().collect())
        } else if let Some(value) = body.strip_prefix("run:") {
            Self::Run(value.trim())
        } else if let Some(value) = body.strip_prefix("description:") {
            Self::Description(value.trim())
        } else {
            Self::Comment(body)
        }
    }
}

/// A step script plus the metadata parsed from its leading comment header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptDescriptor {
    pub path: PathBuf,
    /// Base file name; the identity used by the history file.
    pub file_name: String,
    pub name: String,
    pub apply: BTreeSet<String>,
    pub run: RunMode,
    pub description: Option<String>,
}

impl ScriptDescriptor {
    pub fn from_path(path: &Path) -> Result<Self, HeaderError> {
        let raw = fs::read_to_string(path).map_err(|source| HeaderError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_header(path, &raw)
    }

    /// Folds classified header lines into a descriptor.
    ///
    /// Scanning stops at the first non-comment line. A marker or code line
    /// ends an open description block; plain comment lines continue it and
    /// are joined with newline separators.
    pub fn from_header(path: &Path, raw: &str) -> Result<Self, HeaderError> {
        let mut name = None;
        let mut apply: Option<BTreeSet<String>> = None;
        let mut run = None;
        let mut description: Option<Vec<&str>> = None;
        let mut description_open = false;

        for line in raw.lines() {
            match HeaderLine::classify(line) {
                HeaderLine::Name(value) => {
                    name = Some(value.to_string());
                    description_open = false;
                }
                HeaderLine::Apply(values) => {
                    apply = Some(values.into_iter().map(str::to_string).collect());
                    description_open = false;
                }
                HeaderLine::Run(value) => {
                    run = Some(value.to_string());
                    description_open = false;
                }
                HeaderLine::Description(value) => {
                    description = Some(vec![value]);
                    description_open = true;
                }
                HeaderLine::Comment(text) => {
                    if description_open {
                        if let Some(block) = description.as_mut() {
                            block.push(text);
                        }
                    }
                }
                HeaderLine::Code => break,
            }
        }

        let name = name
            .filter(|value| !value.is_empty())
            .ok_or_else(|| HeaderError::MissingField {
                path: path.to_path_buf(),
                field: "name",
            })?;
        let apply = apply.ok_or_else(|| HeaderError::MissingField {
            path: path.to_path_buf(),
            field: "apply",
        })?;
        if apply.is_empty() {
            return Err(HeaderError::EmptyApplyList {
                path: path.to_path_buf(),
            });
        }
        let run = run
            .filter(|value: &String| !value.is_empty())
            .ok_or_else(|| HeaderError::MissingField {
                path: path.to_path_buf(),
                field: "run",
            })?;
        let run = match RunMode::parse(&run) {
            Some(mode) => mode,
            None => {
                return Err(HeaderError::InvalidRunMode {
                    path: path.to_path_buf(),
                    value: run,
                })
            }
        };
        let description = description
            .map(|block| block.join("\n").trim().to_string())
            .filter(|text| !text.is_empty());

        let file_name = path
            .file_name()
            .map(|value| value.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            name,
            apply,
            run,
            description,
        })
    }

    pub fn is_applicable(&self, deployment: crate::Deployment) -> bool {
        self.apply.contains(deployment.as_str())
    }
}
