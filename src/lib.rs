//! Mailroute: rule-driven routing of mail and attachments to processors.

pub mod config;
pub mod error;
pub mod items;
pub mod pipeline;
pub mod processors;

pub use error::{Error, Result};
