//! Annopage CLI
//!
//! Command-line client for the annotation page of a canvas.
//!
//! # Commands
//!
//! - `list` - Show the current page of a canvas
//! - `get` - Show one annotation
//! - `create` - Add an annotation
//! - `update` - Replace an annotation with a new version
//! - `delete` - Remove an annotation

mod commands;

use clap::{Parser, Subcommand};
use commands::{OutputFormat, StoreOptions};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Annotation page client for versioned document stores.
#[derive(Parser)]
#[command(name = "annopage")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Store base URL (defaults to the RERUM sandbox, with RERUM conventions)
    #[arg(global = true, short, long, env = "ANNOPAGE_ENDPOINT")]
    endpoint: Option<String>,

    /// Use RERUM conventions (@id, trailing-slash paths, __rerum history query)
    #[arg(global = true, long)]
    rerum: bool,

    /// Identifier key (id or @id)
    #[arg(global = true, long)]
    id_field: Option<String>,

    /// Bound on each store request, in seconds
    #[arg(global = true, long, default_value = "30")]
    timeout_secs: u64,

    /// Creator tag stamped on new annotations and pages
    #[arg(global = true, long)]
    creator: Option<String>,

    /// Output format (text, json)
    #[arg(global = true, short, long, default_value = "text")]
    format: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current page of a canvas
    List {
        /// Canvas id
        canvas: String,
    },

    /// Show one annotation, fetched fresh from the store
    Get {
        /// Canvas id
        canvas: String,

        /// Annotation id
        id: String,
    },

    /// Add an annotation to a canvas
    Create {
        /// Canvas id
        canvas: String,

        /// Annotation JSON
        #[arg(short, long, conflicts_with = "file")]
        data: Option<String>,

        /// Read the annotation JSON from a file
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Replace an annotation (the JSON must carry its id)
    Update {
        /// Canvas id
        canvas: String,

        /// Annotation JSON
        #[arg(short, long, conflicts_with = "file")]
        data: Option<String>,

        /// Read the annotation JSON from a file
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Remove an annotation
    Delete {
        /// Canvas id
        canvas: String,

        /// Annotation id
        id: String,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let format = OutputFormat::parse(&cli.format)?;
    let options = StoreOptions {
        endpoint: cli.endpoint,
        rerum: cli.rerum,
        id_field: cli.id_field,
        timeout_secs: cli.timeout_secs,
        creator: cli.creator,
    };

    match cli.command {
        Commands::List { canvas } => {
            commands::list::run(&options, &canvas, format).await?;
        }
        Commands::Get { canvas, id } => {
            commands::get::run(&options, &canvas, &id, format).await?;
        }
        Commands::Create { canvas, data, file } => {
            let document = commands::read_document(data, file)?;
            commands::create::run(&options, &canvas, document, format).await?;
        }
        Commands::Update { canvas, data, file } => {
            let document = commands::read_document(data, file)?;
            commands::update::run(&options, &canvas, document, format).await?;
        }
        Commands::Delete { canvas, id } => {
            commands::delete::run(&options, &canvas, &id, format).await?;
        }
        Commands::Version => {
            println!("Annopage CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
