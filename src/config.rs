//! Job configuration types.
//!
//! A [`JobConfig`] is the already-validated document emitted by the external
//! config compiler. Processor ids are normalised to [`ProcessorId`] here so the
//! rest of the crate only ever sees one representation.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Free-form parameters handed to a processor untouched.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

/// Built-in processor ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorKind {
    /// Persist the item verbatim.
    SaveOnly,
    /// Persist, then write a recognised-text artifact next to it.
    PdfToTextOcr,
    /// Persist, then extract the archive.
    UnzipFile,
    /// Subject-routed mail handling driven by an external rule table.
    MailWorkflow,
}

impl ProcessorKind {
    pub const ALL: [ProcessorKind; 4] = [
        ProcessorKind::SaveOnly,
        ProcessorKind::PdfToTextOcr,
        ProcessorKind::UnzipFile,
        ProcessorKind::MailWorkflow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SaveOnly => "save_only",
            Self::PdfToTextOcr => "pdf_to_text_ocr",
            Self::UnzipFile => "unzip_file",
            Self::MailWorkflow => "mail_workflow",
        }
    }
}

impl fmt::Display for ProcessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical string key into the processor registry.
///
/// Deserialised ids go through [`ProcessorId::new`], so surrounding
/// whitespace never reaches the registry or the run report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ProcessorId(String);

impl ProcessorId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<ProcessorKind> for ProcessorId {
    fn from(kind: ProcessorKind) -> Self {
        Self(kind.as_str().to_string())
    }
}

impl From<&str> for ProcessorId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ProcessorId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl From<ProcessorId> for String {
    fn from(id: ProcessorId) -> Self {
        id.0
    }
}

impl PartialEq<ProcessorKind> for ProcessorId {
    fn eq(&self, other: &ProcessorKind) -> bool {
        self.0 == other.as_str()
    }
}

impl fmt::Display for ProcessorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which item source the binary reads from (`MAILROUTE_SOURCE_KIND`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceKind {
    /// A directory of `.eml` files.
    #[default]
    Mail,
    /// A plain directory tree.
    Files,
}

impl SourceKind {
    pub const ENV_KEY: &'static str = "MAILROUTE_SOURCE_KIND";

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mail => "mail",
            Self::Files => "files",
        }
    }
}

impl FromStr for SourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mail" => Ok(Self::Mail),
            "files" => Ok(Self::Files),
            other => Err(ConfigError::InvalidValue {
                key: Self::ENV_KEY.into(),
                message: format!("{other:?} is not a source kind (expected mail or files)"),
            }),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binds an item extension to a processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Extension including the leading dot, e.g. `.pdf`. Compared case-insensitively.
    pub extension: String,
    pub processor_id: ProcessorId,
    #[serde(default)]
    pub parameters: Parameters,
}

impl Rule {
    pub fn new(extension: impl Into<String>, processor_id: impl Into<ProcessorId>) -> Self {
        Self {
            extension: extension.into(),
            processor_id: processor_id.into(),
            parameters: Parameters::new(),
        }
    }

    /// Attach processor parameters. Non-object values are ignored.
    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = parameters {
            self.parameters = map;
        }
        self
    }
}

fn default_domain() -> String {
    "common".to_string()
}

/// One routing job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub job_name: String,
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default)]
    pub search_keywords: Vec<String>,
    pub destination_path: PathBuf,
    /// Ordered; the first matching rule wins.
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl JobConfig {
    pub fn new(job_name: impl Into<String>, destination_path: impl Into<PathBuf>) -> Self {
        Self {
            job_name: job_name.into(),
            domain: default_domain(),
            search_keywords: Vec::new(),
            destination_path: destination_path.into(),
            rules: Vec::new(),
        }
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.search_keywords.push(keyword.into());
        self
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Parse a compiled job document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.check()?;
        Ok(config)
    }

    /// Read and parse a compiled job document from disk.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.job_name.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "job_name".into(),
                hint: "Every job needs a name for its logs.".into(),
            });
        }
        if self.destination_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "destination_path".into(),
                hint: "Set the root directory processors write into.".into(),
            });
        }
        Ok(())
    }
}
