use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::cli::commands::build_pipeline;
use crate::models::Config;
use crate::services::IngestFile;

#[derive(Debug, clap::Args)]
pub struct IngestArgs {
    /// Files to ingest (pdf, txt, md)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

pub async fn handle_ingest(args: IngestArgs, owner: &str) -> Result<()> {
    let config = Config::load()?;
    let pipeline = build_pipeline(&config)?;

    let mut files = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        files.push(IngestFile { bytes, filename });
    }

    let report = pipeline.ingest(files, owner).await?;

    println!(
        "Ingested {} chunk(s) from {} file(s):",
        report.chunk_count,
        report.files.len()
    );
    for file in &report.files {
        println!("  {file}");
    }

    Ok(())
}
