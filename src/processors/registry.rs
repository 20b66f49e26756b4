//! Processor registry: processor id → processor.
//!
//! Populated during startup, read-only while the engine dispatches. A
//! registry may carry a loader that is run once on the first lookup miss;
//! after it has run, lookups behave exactly as if everything had been
//! registered up front, including any error the loader returned.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

use tracing::{debug, error};

use crate::error::RegistryError;
use crate::processors::processor::Processor;

type Loader = Box<dyn FnOnce(&ProcessorRegistry) -> Result<(), RegistryError> + Send>;

/// Registry of available processors.
pub struct ProcessorRegistry {
    processors: RwLock<HashMap<String, Arc<dyn Processor>>>,
    /// Taken out before it runs, so it runs at most once.
    loader: Mutex<Option<Loader>>,
    load_outcome: OnceLock<Result<(), RegistryError>>,
}

impl ProcessorRegistry {
    /// Create an empty registry without a loader.
    pub fn new() -> Self {
        Self {
            processors: RwLock::new(HashMap::new()),
            loader: Mutex::new(None),
            load_outcome: OnceLock::new(),
        }
    }

    /// Create an empty registry that runs `loader` on the first lookup miss.
    ///
    /// The loader runs without any registry lock held. Lookups it makes
    /// itself see only what has been registered so far and never re-run it.
    /// A loader error is returned by every later lookup of an id it did not
    /// manage to register.
    pub fn with_loader<F>(loader: F) -> Self
    where
        F: FnOnce(&ProcessorRegistry) -> Result<(), RegistryError> + Send + 'static,
    {
        Self {
            loader: Mutex::new(Some(Box::new(loader))),
            ..Self::new()
        }
    }

    /// Bind a processor under its own id. Rebinding an id is an error.
    pub fn register(&self, processor: Arc<dyn Processor>) -> Result<(), RegistryError> {
        let id = processor.id().trim().to_string();
        if !is_valid_processor_id(&id) {
            return Err(RegistryError::InvalidId(id));
        }

        let mut processors = self
            .processors
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if processors.contains_key(&id) {
            return Err(RegistryError::DuplicateRegistration(id));
        }
        debug!(processor = %id, "Registered processor");
        processors.insert(id, processor);
        Ok(())
    }

    /// Look up a processor, running the loader once if the id is missing.
    pub fn resolve(&self, id: &str) -> Result<Arc<dyn Processor>, RegistryError> {
        let id = id.trim();
        if let Some(processor) = self.get(id) {
            return Ok(processor);
        }

        self.run_loader(id);
        if let Some(processor) = self.get(id) {
            return Ok(processor);
        }

        match self.load_outcome.get() {
            Some(Err(e)) => Err(e.clone()),
            _ => Err(RegistryError::UnknownProcessor(id.to_string())),
        }
    }

    fn run_loader(&self, missing: &str) {
        let loader = self
            .loader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(loader) = loader else {
            return;
        };

        debug!(processor = %missing, "Processor missing, running registry loader");
        let outcome = loader(self);
        if let Err(e) = &outcome {
            error!(error = %e, "Registry loader failed");
        }
        let _ = self.load_outcome.set(outcome);
    }

    /// Look up a processor without triggering the loader.
    pub fn get(&self, id: &str) -> Option<Arc<dyn Processor>> {
        self.processors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id.trim())
            .cloned()
    }

    /// Check if a processor is bound.
    pub fn has(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Sorted list of bound ids.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .processors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Number of bound processors.
    pub fn count(&self) -> usize {
        self.processors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn is_valid_processor_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Parameters;
    use crate::error::ProcessorError;
    use crate::items::Item;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockProcessor {
        id: String,
    }

    impl MockProcessor {
        fn arc(id: &str) -> Arc<dyn Processor> {
            Arc::new(Self { id: id.to_string() })
        }
    }

    #[async_trait]
    impl Processor for MockProcessor {
        fn id(&self) -> &str {
            &self.id
        }
        fn description(&self) -> &str {
            "A mock processor for testing"
        }
        async fn process(
            &self,
            _item: &dyn Item,
            _output_dir: &Path,
            _params: &Parameters,
        ) -> Result<(), ProcessorError> {
            Ok(())
        }
    }

    #[test]
    fn register_and_resolve() {
        let registry = ProcessorRegistry::new();
        registry.register(MockProcessor::arc("save_only")).unwrap();

        assert!(registry.has("save_only"));
        assert!(!registry.has("nonexistent"));
        assert_eq!(registry.resolve("save_only").unwrap().id(), "save_only");
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = ProcessorRegistry::new();
        registry.register(MockProcessor::arc("a")).unwrap();
        let err = registry.register(MockProcessor::arc("a")).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateRegistration("a".into()));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn invalid_ids_are_rejected() {
        let registry = ProcessorRegistry::new();
        assert!(matches!(
            registry.register(MockProcessor::arc("  ")),
            Err(RegistryError::InvalidId(_))
        ));
        assert!(matches!(
            registry.register(MockProcessor::arc("has space")),
            Err(RegistryError::InvalidId(_))
        ));
    }

    #[test]
    fn unknown_id_on_empty_registry() {
        let registry = ProcessorRegistry::new();
        let err = registry.resolve("nonexistent_id").err().unwrap();
        assert_eq!(err, RegistryError::UnknownProcessor("nonexistent_id".into()));
    }

    #[test]
    fn repeated_resolves_return_the_same_processor() {
        let registry = ProcessorRegistry::new();
        registry.register(MockProcessor::arc("a")).unwrap();
        let first = registry.resolve("a").unwrap();
        let second = registry.resolve("a").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn loader_runs_once_on_first_miss() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let registry = ProcessorRegistry::with_loader(move |registry| {
            counter.fetch_add(1, Ordering::SeqCst);
            registry.register(MockProcessor::arc("lazy"))
        });

        assert!(registry.is_empty());
        assert_eq!(registry.resolve("lazy").unwrap().id(), "lazy");
        assert!(registry.resolve("still_missing").is_err());
        assert_eq!(registry.resolve("lazy").unwrap().id(), "lazy");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn loader_is_not_run_for_registered_ids() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let registry = ProcessorRegistry::with_loader(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        registry.register(MockProcessor::arc("eager")).unwrap();
        registry.resolve("eager").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn loader_error_is_returned_by_later_lookups() {
        let registry = ProcessorRegistry::with_loader(|registry| {
            registry.register(MockProcessor::arc("first"))?;
            registry.register(MockProcessor::arc("taken"))?;
            registry.register(MockProcessor::arc("never_reached"))
        });
        registry.register(MockProcessor::arc("taken")).unwrap();

        let expected = RegistryError::DuplicateRegistration("taken".into());
        assert_eq!(registry.resolve("never_reached").err(), Some(expected.clone()));
        assert_eq!(registry.resolve("missing").err(), Some(expected));
        assert_eq!(registry.resolve("first").unwrap().id(), "first");
    }

    #[test]
    fn loader_may_resolve_without_deadlocking() {
        let seen_during_load = Arc::new(Mutex::new(None));
        let seen = Arc::clone(&seen_during_load);
        let registry = ProcessorRegistry::with_loader(move |registry| {
            *seen.lock().unwrap() = Some(registry.resolve("lazy").err());
            registry.register(MockProcessor::arc("lazy"))
        });

        assert_eq!(registry.resolve("lazy").unwrap().id(), "lazy");
        assert_eq!(
            *seen_during_load.lock().unwrap(),
            Some(Some(RegistryError::UnknownProcessor("lazy".into())))
        );
    }

    #[test]
    fn ids_are_sorted() {
        let registry = ProcessorRegistry::new();
        registry.register(MockProcessor::arc("b")).unwrap();
        registry.register(MockProcessor::arc("a")).unwrap();
        assert_eq!(registry.ids(), vec!["a", "b"]);
    }
}
