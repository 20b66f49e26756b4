//! Recursive rule-dispatch engine.
//!
//! For every configured keyword the engine asks the item source for root
//! items and walks each one depth-first:
//! 1. look the item's extension up in the rule list
//! 2. on a match, hand the item to the rule's processor and stop there
//! 3. otherwise descend into the children of a container, in order
//! 4. otherwise (an unmatched leaf) do nothing
//!
//! Failures are isolated per node: an unknown processor or a failing
//! processor is logged and recorded, and the walk moves on.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, error, info};

use crate::config::{JobConfig, Rule};
use crate::error::EngineError;
use crate::items::{Item, ItemSource};
use crate::pipeline::rules::RuleMatcher;
use crate::pipeline::types::{Dispatch, DispatchOutcome, KeywordHits, RunReport};
use crate::processors::ProcessorRegistry;

/// Walks item trees and dispatches matching items to processors.
pub struct Engine {
    config: JobConfig,
    matcher: RuleMatcher,
    registry: Arc<ProcessorRegistry>,
    source: Arc<dyn ItemSource>,
    shutdown: Arc<AtomicBool>,
}

impl Engine {
    pub fn new(
        config: JobConfig,
        registry: Arc<ProcessorRegistry>,
        source: Arc<dyn ItemSource>,
    ) -> Self {
        let matcher = RuleMatcher::new(config.rules.clone());
        Self {
            config,
            matcher,
            registry,
            source,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop visiting new nodes once `flag` is set.
    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = flag;
        self
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Run the job to completion.
    ///
    /// The only error is an unusable destination root; everything that goes
    /// wrong below that is recorded in the report.
    pub async fn run(&self) -> Result<RunReport, EngineError> {
        let destination = &self.config.destination_path;
        info!(
            job = %self.config.job_name,
            domain = %self.config.domain,
            keywords = self.config.search_keywords.len(),
            rules = self.config.rules.len(),
            destination = %destination.display(),
            "Engine start"
        );

        tokio::fs::create_dir_all(destination)
            .await
            .map_err(|source| EngineError::Destination {
                path: destination.clone(),
                source,
            })?;

        let mut report = RunReport::new(&self.config.job_name);

        for keyword in &self.config.search_keywords {
            if self.is_shutdown() {
                report.cancelled = true;
                break;
            }

            let items = self.source.search(keyword).await;
            info!(
                source = %self.source.name(),
                keyword = %keyword,
                hits = items.len(),
                "Search complete"
            );
            report.keywords.push(KeywordHits {
                keyword: keyword.clone(),
                hits: items.len(),
            });

            for item in &items {
                self.process(item.as_ref(), &mut report).await;
            }
        }

        report.finish();
        info!(
            job = %self.config.job_name,
            run_id = %report.run_id,
            dispatched = report.dispatches.len(),
            failed = report.failed(),
            cancelled = report.cancelled,
            "Engine finished"
        );
        Ok(report)
    }

    /// Handle one node and, when no rule claims it, its subtree.
    pub fn process<'a>(
        &'a self,
        item: &'a dyn Item,
        report: &'a mut RunReport,
    ) -> BoxFuture<'a, ()> {
        async move {
            if self.is_shutdown() {
                report.cancelled = true;
                return;
            }

            let extension = item.extension();
            if let Some(rule) = self.matcher.find(&extension) {
                // The processor owns the subtree from here on.
                self.dispatch(item, &extension, rule, report).await;
                return;
            }

            if item.is_container() {
                debug!(item = %item.name(), extension = %extension, "Opening container");
                report.containers_opened += 1;
                for child in item.children().await {
                    self.process(child.as_ref(), report).await;
                }
            } else {
                debug!(item = %item.name(), extension = %extension, "No rule, skipping");
                report.leaves_skipped += 1;
            }
        }
        .boxed()
    }

    async fn dispatch(
        &self,
        item: &dyn Item,
        extension: &str,
        rule: &Rule,
        report: &mut RunReport,
    ) {
        let processor_id = rule.processor_id.as_str();
        info!(
            processor = %processor_id,
            item = %item.name(),
            extension = %extension,
            "Running rule"
        );

        let outcome = match self.registry.resolve(processor_id) {
            Ok(processor) => match processor
                .process(item, &self.config.destination_path, &rule.parameters)
                .await
            {
                Ok(()) => DispatchOutcome::Completed,
                Err(e) => {
                    error!(
                        processor = %processor_id,
                        item = %item.name(),
                        error = %e,
                        "Processor failed"
                    );
                    DispatchOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            },
            Err(e) => {
                error!(
                    processor = %processor_id,
                    item = %item.name(),
                    error = %e,
                    "Processor lookup failed"
                );
                DispatchOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        report.dispatches.push(Dispatch {
            item: item.name().to_string(),
            extension: extension.to_string(),
            processor_id: processor_id.to_string(),
            outcome,
        });
    }
}
