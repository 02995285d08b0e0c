//! CLI command implementations.

pub mod create;
pub mod delete;
pub mod get;
pub mod list;
pub mod update;

use annopage_adapter::{
    AdapterConfig, AdapterError, AnnotationAdapter, AnnotationPage, CreatorPolicy, DocumentFormat,
    HttpStore, IdConvention, Outcome, ReqwestClient,
};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The adapter every command runs against.
pub type CliAdapter = AnnotationAdapter<HttpStore<ReqwestClient>>;

/// Errors reported by the CLI.
#[derive(Error, Debug)]
pub enum CliError {
    /// Unknown `--format` value.
    #[error("unknown output format {0:?} (expected text or json)")]
    InvalidFormat(String),

    /// Unknown `--id-field` value.
    #[error("unknown id field {0:?} (expected id or @id)")]
    InvalidIdField(String),

    /// Neither `--data` nor `--file` was given.
    #[error("an annotation is required (--data or --file)")]
    MissingDocument,

    /// The annotation is not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The annotation file could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The store did not apply the operation.
    #[error("{0}")]
    Adapter(#[from] AdapterError),

    /// The annotation was written but the page was not.
    #[error("annotation stored but page not updated: {0}")]
    Partial(AdapterError),
}

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses `text` or `json`.
    pub fn parse(name: &str) -> Result<Self, CliError> {
        match name {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(CliError::InvalidFormat(other.to_string())),
        }
    }
}

/// Store connection flags shared by every command.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Store base URL; the RERUM sandbox when absent.
    pub endpoint: Option<String>,
    /// Use the RERUM preset. Implied when no endpoint is given.
    pub rerum: bool,
    /// Identifier key override.
    pub id_field: Option<String>,
    /// Per-request bound in seconds.
    pub timeout_secs: u64,
    /// Creator tag.
    pub creator: Option<String>,
}

impl StoreOptions {
    /// Builds the adapter configuration these flags describe.
    pub fn config(&self) -> Result<AdapterConfig, CliError> {
        let mut config = match self.endpoint {
            None => AdapterConfig::rerum(AdapterConfig::RERUM_SANDBOX_URL),
            Some(ref endpoint) if self.rerum => AdapterConfig::rerum(endpoint.as_str()),
            Some(ref endpoint) => AdapterConfig::new(endpoint.as_str()),
        };

        if let Some(ref field) = self.id_field {
            let convention = IdConvention::from_field(field)
                .ok_or_else(|| CliError::InvalidIdField(field.clone()))?;
            config = config.with_id_convention(convention);
        }
        if let Some(ref creator) = self.creator {
            config = config.with_creator(CreatorPolicy::Tag(creator.clone()));
        }
        Ok(config.with_timeout(Duration::from_secs(self.timeout_secs)))
    }

    /// Connects an adapter for one canvas.
    pub fn adapter(&self, canvas_id: &str) -> Result<CliAdapter, CliError> {
        let config = self.config()?;
        let client = ReqwestClient::with_timeout(config.timeout)?;
        let store = HttpStore::from_config(&config, client);
        Ok(AnnotationAdapter::new(canvas_id, store, config))
    }
}

/// Reads an annotation from `--data` or `--file`.
pub fn read_document(data: Option<String>, file: Option<PathBuf>) -> Result<Value, CliError> {
    let text = match (data, file) {
        (Some(data), _) => data,
        (None, Some(path)) => std::fs::read_to_string(path)?,
        (None, None) => return Err(CliError::MissingDocument),
    };
    Ok(serde_json::from_str(&text)?)
}

/// A page as printed by the CLI.
#[derive(Debug, Serialize)]
pub struct PageReport {
    /// Canvas id.
    pub canvas: String,
    /// Page id, if stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_id: Option<String>,
    /// Number of annotations.
    pub count: usize,
    /// Annotations as stored.
    pub items: Vec<Value>,
}

impl PageReport {
    /// Builds the report of a page.
    pub fn new(page: &AnnotationPage, format: &DocumentFormat) -> Self {
        Self {
            canvas: page.target().to_string(),
            page_id: page.id().map(|id| id.to_string()),
            count: page.len(),
            items: page
                .items()
                .iter()
                .map(|item| format.encode_annotation(item))
                .collect(),
        }
    }
}

/// Prints a page.
pub fn print_page(adapter: &CliAdapter, page: &AnnotationPage, format: OutputFormat) -> Result<(), CliError> {
    let id_key = adapter.config().format.id_convention.field();
    let report = PageReport::new(page, &adapter.config().format);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            println!("Canvas:      {}", report.canvas);
            println!(
                "Page:        {}",
                report.page_id.as_deref().unwrap_or("(not stored yet)")
            );
            println!("Annotations: {}", report.count);
            for item in &report.items {
                let id = item.get(id_key).and_then(Value::as_str).unwrap_or("?");
                println!("  {}  {}", id, item);
            }
        }
    }
    Ok(())
}

/// Prints the page a mutation left behind and turns a failure into an error.
pub fn finish(adapter: &CliAdapter, outcome: Outcome<AnnotationPage>, format: OutputFormat) -> Result<(), CliError> {
    print_page(adapter, outcome.value(), format)?;
    match outcome {
        Outcome::Applied(_) => Ok(()),
        Outcome::Unchanged(_, err) => Err(CliError::Adapter(err)),
        Outcome::Partial(_, err) => Err(CliError::Partial(err)),
    }
}
