//! Rule-dispatch pipeline.
//!
//! Every root item returned by the source flows through:
//! 1. `RuleMatcher::find()`: first rule whose extension matches
//! 2. `ProcessorRegistry::resolve()`: rule's processor id to a processor
//! 3. `Processor::process()`: the processor takes over the whole subtree
//!
//! Items no rule claims are descended into when they are containers and
//! skipped when they are leaves.

pub mod engine;
pub mod rules;
pub mod types;

pub use engine::Engine;
pub use rules::{RuleMatcher, match_rule};
pub use types::{Dispatch, DispatchOutcome, KeywordHits, RunReport};
