//! The processor contract.

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::Parameters;
use crate::error::ProcessorError;
use crate::items::Item;

/// Side-effecting handler for a matched item.
///
/// A processor owns the whole subtree of the item it is given: the engine
/// never descends into the children of a dispatched item.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Registry key.
    fn id(&self) -> &str;

    /// One-line description for logs and listings.
    fn description(&self) -> &str;

    /// Handle `item`, writing under `output_dir`.
    ///
    /// Missing parameters fall back to defaults; they are never an error on
    /// their own.
    async fn process(
        &self,
        item: &dyn Item,
        output_dir: &Path,
        params: &Parameters,
    ) -> Result<(), ProcessorError>;
}

/// Read an optional string parameter.
pub fn param_str<'a>(params: &'a Parameters, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

/// Read a string parameter, falling back to `default`.
pub fn param_str_or<'a>(params: &'a Parameters, key: &str, default: &'a str) -> &'a str {
    param_str(params, key).unwrap_or(default)
}

/// Interpret a loosely-typed boolean: JSON booleans, `"true"`/`"false"`
/// strings in any case, and 0/1 numbers.
pub fn loose_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        _ => None,
    }
}
