use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use researchmind_core::config::{Config, Settings};
use researchmind_core::segment::Segmenter;
use researchmind_core::Error;
use researchmind_embed::embedder_from_settings;
use researchmind_hybrid::{FusionConfig, StoreRegistry};
use researchmind_pipeline::clients::{OpenAiCompatibleGenerator, TavilySearch};
use researchmind_pipeline::{Pipeline, ResearchRequest};

#[derive(Parser)]
#[command(name = "researchmind", version, about = "Hybrid document retrieval and a multi-stage research pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Segment a .txt file or directory and add it to a user's store
    Ingest {
        path: PathBuf,
        #[arg(long)]
        user: String,
    },
    /// Run the research pipeline for a question
    Query {
        query: String,
        #[arg(long)]
        user: Option<String>,
        /// Search the web only
        #[arg(long)]
        no_documents: bool,
        /// Print progress events as JSON lines
        #[arg(long)]
        stream: bool,
    },
    /// Hybrid search over a user's documents
    Search {
        query: String,
        #[arg(long)]
        user: String,
        #[arg(short, long, default_value_t = 5)]
        k: usize,
    },
    /// Remove a user's documents, or the whole user with --account
    Clear {
        #[arg(long)]
        user: String,
        #[arg(long)]
        account: bool,
    },
    /// Show a user's store
    Status {
        #[arg(long)]
        user: String,
    },
}

fn open_registry(settings: &Settings) -> anyhow::Result<Arc<StoreRegistry>> {
    let embedder = embedder_from_settings(&settings.embedding)?;
    let registry = StoreRegistry::new(
        settings.storage.data_dir_path(),
        embedder,
        FusionConfig::from(&settings.retrieval),
        settings.registry.capacity,
    )?;
    Ok(Arc::new(registry))
}

fn ingest(registry: &StoreRegistry, path: &Path, user: &str) -> anyhow::Result<()> {
    let first_id = {
        let store = registry.open(user)?;
        let retriever = store.read().map_err(|e| Error::poisoned("retriever", e))?;
        retriever.next_chunk_id()
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));

    spinner.set_message(format!("Segmenting {}", path.display()));
    let segmenter = Segmenter::default();
    let chunks = if path.is_dir() {
        segmenter.segment_directory(path, first_id)?
    } else {
        segmenter.segment_file(path, first_id)?
    };
    if chunks.is_empty() {
        spinner.finish_with_message("No text found; nothing indexed");
        return Ok(());
    }

    spinner.set_message(format!("Embedding and indexing {} chunks", chunks.len()));
    let total = registry.index_documents(user, &chunks)?;
    spinner.finish_with_message(format!("✅ Indexed {} chunks ({} total for {user})", chunks.len(), total));
    Ok(())
}

fn build_pipeline(settings: &Settings, registry: Arc<StoreRegistry>) -> anyhow::Result<Pipeline> {
    let generator = Arc::new(OpenAiCompatibleGenerator::from_settings(&settings.generation)?);
    let synthesis = Arc::new(OpenAiCompatibleGenerator::synthesis_from_settings(&settings.generation)?);
    let web = Arc::new(TavilySearch::from_settings(&settings.web)?);
    let pipeline = Pipeline::builder()
        .generator(generator)
        .synthesis_generator(synthesis)
        .web_search(web)
        .registry(registry)
        .with_settings(settings)
        .build()?;
    Ok(pipeline)
}

async fn query(pipeline: Pipeline, request: ResearchRequest, stream: bool) -> anyhow::Result<()> {
    if stream {
        let mut events = pipeline.stream(request);
        while let Some(event) = events.recv().await {
            println!("{}", serde_json::to_string(&event)?);
        }
        return Ok(());
    }

    let report = pipeline.run(request).await?;
    println!("{}\n", report.answer);
    println!("Sources:");
    for source in &report.sources {
        let location = if source.url.is_empty() { String::new() } else { format!(" <{}>", source.url) };
        println!("  [{}] {}{} ({}, confidence {})", source.index, source.source, location, source.source_type, source.confidence);
    }
    println!("\nClaims: {} verified, {} disputed", report.verified_claims, report.disputed_claims);
    for note in &report.degradations {
        println!("⚠️  {note}");
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "researchmind=info,warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("loading configuration")?;
    let settings = config.settings()?;
    let registry = open_registry(&settings)?;

    match cli.command {
        Command::Ingest { path, user } => ingest(&registry, &path, &user)?,
        Command::Query { query: text, user, no_documents, stream } => {
            let request = match user {
                Some(user) if !no_documents => ResearchRequest::new(text).with_documents(user),
                _ => ResearchRequest::new(text),
            };
            info!(documents = request.use_documents, stream, "starting research");
            let pipeline = build_pipeline(&settings, registry)?;
            tokio::runtime::Runtime::new()?.block_on(query(pipeline, request, stream))?;
        }
        Command::Search { query, user, k } => {
            let store = registry.open(&user)?;
            let retriever = store.read().map_err(|e| Error::poisoned("retriever", e))?;
            if !retriever.is_ready() {
                println!("No documents indexed for {user}");
                return Ok(());
            }
            for (rank, hit) in retriever.search(&query, k)?.iter().enumerate() {
                let snippet: String = hit.chunk.text.chars().take(160).collect();
                println!(
                    "{:>2}. chunk {} combined {:.3} (dense {:.3}, lexical {:.3})\n    {}",
                    rank + 1,
                    hit.chunk.chunk_id,
                    hit.combined_score,
                    hit.dense_score,
                    hit.lexical_score,
                    snippet
                );
            }
        }
        Command::Clear { user, account } => {
            if account {
                registry.remove_user(&user)?;
                println!("Removed {user} and all stored documents");
            } else {
                registry.clear_documents(&user)?;
                println!("Cleared documents for {user}");
            }
        }
        Command::Status { user } => {
            let store = registry.open(&user)?;
            let retriever = store.read().map_err(|e| Error::poisoned("retriever", e))?;
            println!("User:   {user}");
            println!("Store:  {}", retriever.dir().display());
            println!("Chunks: {}", retriever.total_chunks());
            println!("Ready:  {}", retriever.is_ready());
        }
    }
    Ok(())
}
