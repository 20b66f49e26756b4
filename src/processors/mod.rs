//! Pluggable processing logic, looked up by symbolic id.

pub mod builtin;
pub mod processor;
pub mod registry;

pub use processor::*;
pub use registry::ProcessorRegistry;
