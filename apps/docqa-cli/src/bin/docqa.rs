use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use docqa_core::config::{Config, Settings};
use docqa_core::QueryResult;
use docqa_embed::embedder_from_settings;
use docqa_rag::{ingest, shared_pipeline};

const SNIPPET_CHARS: usize = 200;

#[derive(Parser)]
#[command(name = "docqa", about = "Ask questions about a folder of PDFs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the vector index from the source documents
    Ingest {
        #[arg(long)]
        source: Option<PathBuf>,
        #[arg(long)]
        index: Option<PathBuf>,
        #[arg(long)]
        chunk_size: Option<usize>,
        #[arg(long)]
        chunk_overlap: Option<usize>,
    },
    /// Answer a question from the indexed documents
    Ask {
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long)]
        index: Option<PathBuf>,
        question: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = Config::load()?.settings()?;

    match cli.command {
        Command::Ingest { source, index, chunk_size, chunk_overlap } => {
            if let Some(dir) = source { settings.data.source_dir = dir; }
            if let Some(dir) = index { settings.data.index_dir = dir; }
            if let Some(n) = chunk_size { settings.chunking.chunk_size = n; }
            if let Some(n) = chunk_overlap { settings.chunking.chunk_overlap = n; }
            settings.validate()?;
            run_ingest(&settings).await?;
        }
        Command::Ask { top_k, index, question } => {
            if let Some(k) = top_k { settings.retrieval.top_k = k; }
            if let Some(dir) = index { settings.data.index_dir = dir; }
            settings.validate()?;
            let pipeline = shared_pipeline(&settings).await?;
            let result = pipeline.answer(&question).await?;
            print_result(&result);
        }
    }
    Ok(())
}

async fn run_ingest(settings: &Settings) -> anyhow::Result<()> {
    let embedder = embedder_from_settings(&settings.embedding)?;
    let report = ingest(
        &settings.data.source_dir,
        &settings.data.index_dir,
        settings.chunking.chunk_size,
        settings.chunking.chunk_overlap,
        embedder,
    )
    .await?;
    for skipped in &report.skipped {
        match skipped.page {
            Some(page) => println!("Skipped {} page {}: {}", skipped.path.display(), page, skipped.reason),
            None => println!("Skipped {}: {}", skipped.path.display(), skipped.reason),
        }
    }
    println!(
        "Indexed {} chunks from {} documents into {}",
        report.chunks,
        report.documents,
        report.index_path.display()
    );
    Ok(())
}

fn print_result(result: &QueryResult) {
    println!("{}\n", result.answer);
    for (i, chunk) in result.sources.iter().enumerate() {
        println!("Source {}: {}", i + 1, chunk.provenance);
        let snippet: String = chunk.text.chars().take(SNIPPET_CHARS).collect();
        println!("{}\n", snippet.trim());
    }
}
