use anyhow::Result;
use std::io::Write;

use crate::cli::commands::build_pipeline;
use crate::models::{ChatEvent, Config};

#[derive(Debug, clap::Args)]
pub struct AskArgs {
    /// The question to answer
    pub question: String,

    /// Stream the answer as newline-delimited JSON events
    #[arg(long)]
    pub stream: bool,

    /// Number of chunks to retrieve
    #[arg(long, short = 'k')]
    pub top_k: Option<usize>,
}

pub async fn handle_ask(args: AskArgs, owner: &str) -> Result<()> {
    let config = Config::load()?;
    let pipeline = build_pipeline(&config)?;

    if args.stream {
        let mut stream = pipeline
            .ask_stream(&args.question, Some(owner), args.top_k)
            .await?;

        let mut stdout = std::io::stdout().lock();
        while let Some(event) = stream.next().await {
            serde_json::to_writer(&mut stdout, &event)?;
            writeln!(stdout)?;
            stdout.flush()?;

            if matches!(event, ChatEvent::Error { .. }) {
                anyhow::bail!("answer generation failed");
            }
        }
        return Ok(());
    }

    let response = pipeline.ask(&args.question, Some(owner), args.top_k).await?;

    println!("{}", response.answer);
    if !response.sources.is_empty() {
        println!("\nSources:");
        for source in &response.sources {
            println!("  [{}] {}", source.source, source.excerpt);
        }
    }

    Ok(())
}
