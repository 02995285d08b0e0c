//! List command implementation.

use super::{print_page, CliError, OutputFormat, StoreOptions};

/// Runs the list command.
pub async fn run(options: &StoreOptions, canvas: &str, format: OutputFormat) -> Result<(), CliError> {
    let adapter = options.adapter(canvas)?;
    let page = adapter.all().await.into_result()?;
    print_page(&adapter, &page, format)
}
