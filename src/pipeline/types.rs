//! Run report produced by the engine.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Outcome of one processor invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Completed,
    /// Resolution or execution failed; the node was skipped.
    Failed { error: String },
}

impl DispatchOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}

/// One matched item and what happened to it.
#[derive(Debug, Clone, Serialize)]
pub struct Dispatch {
    pub item: String,
    pub extension: String,
    pub processor_id: String,
    pub outcome: DispatchOutcome,
}

/// How many root items one keyword produced.
#[derive(Debug, Clone, Serialize)]
pub struct KeywordHits {
    pub keyword: String,
    pub hits: usize,
}

/// Summary of an engine run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub job_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub keywords: Vec<KeywordHits>,
    /// Processor invocations in dispatch order.
    pub dispatches: Vec<Dispatch>,
    /// Unmatched containers whose children were visited.
    pub containers_opened: usize,
    /// Unmatched leaves.
    pub leaves_skipped: usize,
    pub cancelled: bool,
}

impl RunReport {
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            job_name: job_name.into(),
            started_at: Utc::now(),
            finished_at: None,
            keywords: Vec::new(),
            dispatches: Vec::new(),
            containers_opened: 0,
            leaves_skipped: 0,
            cancelled: false,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.dispatches
            .iter()
            .filter(|d| d.outcome == DispatchOutcome::Completed)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.dispatches.len() - self.succeeded()
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}
