//! Create command implementation.

use super::{finish, CliError, OutputFormat, StoreOptions};
use serde_json::Value;
use tracing::info;

/// Runs the create command.
pub async fn run(
    options: &StoreOptions,
    canvas: &str,
    document: Value,
    format: OutputFormat,
) -> Result<(), CliError> {
    let adapter = options.adapter(canvas)?;
    let outcome = adapter.create_json(document).await;
    if outcome.is_applied() {
        info!(canvas, page_id = ?adapter.annotation_page_id(), "annotation created");
    }
    finish(&adapter, outcome, format)
}
