//! Command-line interface for the document chat pipeline.

pub mod commands;

use clap::{Parser, Subcommand};

/// Chat with your documents: ingest files, ask grounded questions.
#[derive(Debug, Parser)]
#[command(name = "docchat")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        default_value = "local",
        help = "Owner id scoping ingestion, retrieval, and purge"
    )]
    pub owner: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Extract, chunk, embed, and index documents (pdf, txt, md)
    Ingest(commands::IngestArgs),

    /// Ask a question answered from the indexed documents
    Ask(commands::AskArgs),

    /// Delete every indexed chunk belonging to the owner
    Purge,

    /// Check infrastructure status (Qdrant, configuration)
    Status,
}
