use anyhow::Result;

use crate::cli::commands::build_pipeline;
use crate::models::Config;
use crate::utils::retry::{RetryConfig, with_retry};

/// Deletion is idempotent, so re-attempting a transient failure is safe and
/// the retry wrapper lives here rather than in the pipeline.
pub async fn handle_purge(owner: &str) -> Result<()> {
    let config = Config::load()?;
    let pipeline = build_pipeline(&config)?;

    let response = with_retry(&RetryConfig::default(), || pipeline.purge(owner)).await?;

    if response.success {
        println!("Purged all documents for owner '{owner}'.");
    }

    Ok(())
}
