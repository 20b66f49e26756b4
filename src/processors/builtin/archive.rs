//! Persist an archive, then extract it next to itself.
//!
//! The `mode` parameter selects where the password comes from:
//! - `auto` (default): no password
//! - `fixed`: the `password` parameter, which must be a string when present
//! - `manual`: asked on the console; the whole run waits for the answer

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{info, warn};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::config::{Parameters, ProcessorKind};
use crate::error::ProcessorError;
use crate::items::Item;
use crate::processors::processor::{Processor, param_str_or};

/// Source of archive passwords for `manual` mode. Implementations may block.
pub trait PasswordPrompt: Send + Sync {
    fn ask(&self, archive_name: &str) -> Result<SecretString, ProcessorError>;
}

/// Interactive console prompt.
#[derive(Debug, Default)]
pub struct ConsolePasswordPrompt;

impl PasswordPrompt for ConsolePasswordPrompt {
    fn ask(&self, archive_name: &str) -> Result<SecretString, ProcessorError> {
        let password = dialoguer::Password::new()
            .with_prompt(format!("Password for {archive_name}"))
            .allow_empty_password(true)
            .interact()
            .map_err(|e| ProcessorError::Prompt(e.to_string()))?;
        Ok(SecretString::from(password))
    }
}

/// How the archive password is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordMode {
    Auto,
    Fixed,
    Manual,
}

impl PasswordMode {
    pub fn from_params(params: &Parameters) -> Self {
        match param_str_or(params, "mode", "auto").trim().to_ascii_lowercase().as_str() {
            "auto" => Self::Auto,
            "fixed" => Self::Fixed,
            "manual" => Self::Manual,
            other => {
                warn!(mode = %other, "Unknown unzip mode, extracting without password");
                Self::Auto
            }
        }
    }
}

pub struct UnzipProcessor {
    prompt: Arc<dyn PasswordPrompt>,
}

impl UnzipProcessor {
    pub fn new(prompt: Arc<dyn PasswordPrompt>) -> Self {
        Self { prompt }
    }

    async fn password(
        &self,
        mode: PasswordMode,
        item: &dyn Item,
        params: &Parameters,
    ) -> Result<Option<SecretString>, ProcessorError> {
        match mode {
            PasswordMode::Auto => Ok(None),
            PasswordMode::Fixed => match params.get("password") {
                Some(Value::String(password)) => Ok(Some(SecretString::from(password.clone()))),
                None | Some(Value::Null) => {
                    warn!(
                        item = %item.name(),
                        "Mode is fixed but no password was configured, extracting without one"
                    );
                    Ok(None)
                }
                Some(_) => Err(ProcessorError::InvalidParameters {
                    processor: self.id().to_string(),
                    reason: "password must be a string".into(),
                }),
            },
            PasswordMode::Manual => {
                let prompt = Arc::clone(&self.prompt);
                let name = item.name().to_string();
                let password = tokio::task::spawn_blocking(move || prompt.ask(&name))
                    .await
                    .map_err(|e| ProcessorError::Prompt(e.to_string()))??;
                Ok(Some(password))
            }
        }
    }
}

impl Default for UnzipProcessor {
    fn default() -> Self {
        Self::new(Arc::new(ConsolePasswordPrompt))
    }
}

#[async_trait]
impl Processor for UnzipProcessor {
    fn id(&self) -> &str {
        ProcessorKind::UnzipFile.as_str()
    }

    fn description(&self) -> &str {
        "Save a zip archive and extract it into a sibling directory"
    }

    async fn process(
        &self,
        item: &dyn Item,
        output_dir: &Path,
        params: &Parameters,
    ) -> Result<(), ProcessorError> {
        let mode = PasswordMode::from_params(params);
        let saved = item.persist(output_dir).await?;
        let password = self.password(mode, item, params).await?;
        let target = extraction_dir(output_dir, &saved);

        info!(
            item = %item.name(),
            mode = ?mode,
            target = %target.display(),
            "Extracting archive"
        );

        let archive = saved.clone();
        let dest = target.clone();
        let extracted =
            tokio::task::spawn_blocking(move || extract_zip(&archive, &dest, password.as_ref()))
                .await
                .map_err(|e| ProcessorError::Extraction {
                    archive: saved.clone(),
                    reason: e.to_string(),
                })??;

        info!(item = %item.name(), entries = extracted, "Archive extracted");
        Ok(())
    }
}

/// `<output_dir>/<archive file stem>`.
fn extraction_dir(output_dir: &Path, archive: &Path) -> PathBuf {
    let stem = archive
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "extracted".to_string());
    output_dir.join(stem)
}

/// Extract every entry of `archive` into `target`, returning the number of files written.
///
/// Entries whose path would escape `target` are skipped.
pub fn extract_zip(
    archive: &Path,
    target: &Path,
    password: Option<&SecretString>,
) -> Result<usize, ProcessorError> {
    let extraction_error = |reason: String| ProcessorError::Extraction {
        archive: archive.to_path_buf(),
        reason,
    };

    let file = File::open(archive)?;
    let mut zip = ZipArchive::new(file).map_err(|e| extraction_error(e.to_string()))?;
    std::fs::create_dir_all(target)?;

    let mut extracted = 0;
    for index in 0..zip.len() {
        let entry = match password {
            Some(password) => zip.by_index_decrypt(index, password.expose_secret().as_bytes()),
            None => zip.by_index(index),
        };
        let mut entry = entry.map_err(|e| match e {
            ZipError::InvalidPassword => ProcessorError::InvalidPassword {
                archive: archive.to_path_buf(),
            },
            other => extraction_error(other.to_string()),
        })?;

        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = %entry.name(), "Skipping archive entry with unsafe path");
            continue;
        };
        let out_path = target.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        std::io::copy(&mut entry, &mut out).map_err(|e| extraction_error(e.to_string()))?;
        extracted += 1;
    }

    Ok(extracted)
}
