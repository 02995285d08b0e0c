//! Get command implementation.

use super::{CliError, OutputFormat, StoreOptions};
use annopage_adapter::DocumentId;

/// Runs the get command.
pub async fn run(
    options: &StoreOptions,
    canvas: &str,
    id: &str,
    format: OutputFormat,
) -> Result<(), CliError> {
    let adapter = options.adapter(canvas)?;
    let id = DocumentId::new(id);

    let Some(annotation) = adapter.get(&id).await.into_result()? else {
        println!("No annotation {} on {}", id, canvas);
        return Ok(());
    };

    let document = adapter.config().format.encode_annotation(&annotation);
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&document)?),
        OutputFormat::Text => {
            println!("Annotation: {}", id);
            println!("Canvas:     {}", canvas);
            println!("{}", document);
        }
    }
    Ok(())
}
