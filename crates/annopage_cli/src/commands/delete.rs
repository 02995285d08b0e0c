//! Delete command implementation.

use super::{finish, CliError, OutputFormat, StoreOptions};
use annopage_adapter::DocumentId;

/// Runs the delete command.
pub async fn run(
    options: &StoreOptions,
    canvas: &str,
    id: &str,
    format: OutputFormat,
) -> Result<(), CliError> {
    let adapter = options.adapter(canvas)?;
    let outcome = adapter.delete(&DocumentId::new(id)).await;
    finish(&adapter, outcome, format)
}
