//! Persist a document and write its recognised text next to it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::{Parameters, ProcessorKind};
use crate::error::ProcessorError;
use crate::items::Item;
use crate::processors::processor::{Processor, param_str_or};

/// Appended to the saved file name to form the text artifact's name.
pub const TEXT_ARTIFACT_SUFFIX: &str = ".ocr.txt";

const DEFAULT_LANG: &str = "eng";

/// Shortest run of printable characters kept by [`EmbeddedTextRecognizer`].
const MIN_TEXT_RUN: usize = 4;

/// Turns a saved document into text.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, document: &Path, lang: &str) -> Result<String, ProcessorError>;
}

/// Pulls the printable text runs already embedded in a file.
///
/// No image recognition happens here; scanned pages yield little or nothing.
#[derive(Debug, Default)]
pub struct EmbeddedTextRecognizer;

#[async_trait]
impl TextRecognizer for EmbeddedTextRecognizer {
    async fn recognize(&self, document: &Path, _lang: &str) -> Result<String, ProcessorError> {
        let bytes = tokio::fs::read(document).await?;
        Ok(printable_runs(&bytes, MIN_TEXT_RUN).join("\n"))
    }
}

/// Runs of at least `min_len` consecutive printable characters.
pub fn printable_runs(bytes: &[u8], min_len: usize) -> Vec<String> {
    let text = String::from_utf8_lossy(bytes);
    let mut runs = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        if (c.is_control() && c != '\t') || c == char::REPLACEMENT_CHARACTER {
            if current.trim().chars().count() >= min_len {
                runs.push(current.trim().to_string());
            }
            current.clear();
        } else {
            current.push(c);
        }
    }
    if current.trim().chars().count() >= min_len {
        runs.push(current.trim().to_string());
    }
    runs
}

pub struct OcrProcessor {
    recognizer: Arc<dyn TextRecognizer>,
}

impl OcrProcessor {
    pub fn new(recognizer: Arc<dyn TextRecognizer>) -> Self {
        Self { recognizer }
    }
}

impl Default for OcrProcessor {
    fn default() -> Self {
        Self::new(Arc::new(EmbeddedTextRecognizer))
    }
}

/// `<saved file name>.ocr.txt` in the same directory.
pub fn text_artifact_path(saved: &Path) -> PathBuf {
    let mut name = saved
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(TEXT_ARTIFACT_SUFFIX);
    saved.with_file_name(name)
}

#[async_trait]
impl Processor for OcrProcessor {
    fn id(&self) -> &str {
        ProcessorKind::PdfToTextOcr.as_str()
    }

    fn description(&self) -> &str {
        "Save a document and write its recognised text alongside it"
    }

    async fn process(
        &self,
        item: &dyn Item,
        output_dir: &Path,
        params: &Parameters,
    ) -> Result<(), ProcessorError> {
        let lang = param_str_or(params, "lang", DEFAULT_LANG);
        let saved = item.persist(output_dir).await?;
        let text = self.recognizer.recognize(&saved, lang).await?;
        let artifact = text_artifact_path(&saved);
        tokio::fs::write(&artifact, text.as_bytes()).await?;

        info!(
            item = %item.name(),
            lang = %lang,
            chars = text.chars().count(),
            artifact = %artifact.display(),
            "Text extracted"
        );
        Ok(())
    }
}
