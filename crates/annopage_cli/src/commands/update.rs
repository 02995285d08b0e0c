//! Update command implementation.

use super::{finish, CliError, OutputFormat, StoreOptions};
use annopage_adapter::AdapterError;
use serde_json::Value;

/// Runs the update command.
///
/// The annotation is matched by the id it carries; the stored version gets a
/// new one.
pub async fn run(
    options: &StoreOptions,
    canvas: &str,
    document: Value,
    format: OutputFormat,
) -> Result<(), CliError> {
    let adapter = options.adapter(canvas)?;
    let annotation = adapter
        .config()
        .format
        .decode_annotation(document)
        .map_err(|e| AdapterError::InvalidDocument(e.to_string()))?;
    let outcome = adapter.update(annotation).await;
    finish(&adapter, outcome, format)
}
