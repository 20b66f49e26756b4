//! Built-in processors: save, unzip, text extraction and the mail workflow.

pub mod archive;
pub mod ocr;
pub mod save;
pub mod workflow;

use std::sync::Arc;

pub use archive::{ConsolePasswordPrompt, PasswordPrompt, UnzipProcessor};
pub use ocr::{EmbeddedTextRecognizer, OcrProcessor, TextRecognizer};
pub use save::SaveOnlyProcessor;
pub use workflow::MailWorkflowProcessor;

use crate::error::RegistryError;
use crate::processors::processor::Processor;
use crate::processors::registry::ProcessorRegistry;

/// Collaborators the built-in processors delegate to.
pub struct BuiltinOptions {
    pub password_prompt: Arc<dyn PasswordPrompt>,
    pub recognizer: Arc<dyn TextRecognizer>,
}

impl Default for BuiltinOptions {
    fn default() -> Self {
        Self {
            password_prompt: Arc::new(ConsolePasswordPrompt),
            recognizer: Arc::new(EmbeddedTextRecognizer),
        }
    }
}

/// Register every built-in processor with default collaborators.
pub fn register_builtins(registry: &ProcessorRegistry) -> Result<(), RegistryError> {
    register_builtins_with(registry, BuiltinOptions::default())
}

/// Register every built-in processor.
///
/// The mail workflow shares the same save/ocr/unzip instances that are
/// registered under their own ids.
pub fn register_builtins_with(
    registry: &ProcessorRegistry,
    options: BuiltinOptions,
) -> Result<(), RegistryError> {
    let save: Arc<dyn Processor> = Arc::new(SaveOnlyProcessor);
    let ocr: Arc<dyn Processor> = Arc::new(OcrProcessor::new(options.recognizer));
    let unzip: Arc<dyn Processor> = Arc::new(UnzipProcessor::new(options.password_prompt));
    let workflow: Arc<dyn Processor> = Arc::new(MailWorkflowProcessor::new(
        Arc::clone(&save),
        Arc::clone(&ocr),
        Arc::clone(&unzip),
    ));

    for processor in [save, ocr, unzip, workflow] {
        registry.register(processor)?;
    }
    Ok(())
}

impl ProcessorRegistry {
    /// A registry that loads the built-ins on its first lookup miss.
    pub fn with_builtins() -> Self {
        Self::with_loader(register_builtins)
    }
}
