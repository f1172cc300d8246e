use chrono::Utc;
use clap::{Parser, Subcommand};
use doc_qa_core::{
    ChatCompletionsClient, ChunkingConfig, HashedNgramEmbedder, IndexManager, QueryEngine,
    DEFAULT_COMPLETIONS_ENDPOINT, DEFAULT_COMPLETIONS_MODEL, DEFAULT_TOP_K,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "doc-qa", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding the raw document corpus.
    #[arg(long, default_value = "raw_docs")]
    raw_dir: String,

    /// Directory for extracted plain-text mirrors of each document.
    #[arg(long, default_value = "processed")]
    processed_dir: String,

    /// Directory for the persisted index artifacts.
    #[arg(long, default_value = "cache")]
    cache_dir: String,

    /// Maximum chunk size in characters.
    #[arg(long, default_value = "1024")]
    max_chunk_chars: usize,

    /// Characters shared between consecutive chunks.
    #[arg(long, default_value = "100")]
    chunk_overlap_chars: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Build the index from the raw corpus, reusing the cache when unchanged.
    Build {
        /// Rebuild even when the cached artifacts match the corpus.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Ask a question grounded on the indexed corpus.
    Ask {
        /// The question to answer.
        #[arg(long)]
        question: String,

        /// Number of chunks to retrieve as grounding context.
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,

        /// API key for the generation service.
        #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
        api_key: String,

        /// Chat-completions endpoint.
        #[arg(long, default_value = DEFAULT_COMPLETIONS_ENDPOINT)]
        endpoint: String,

        /// Generation model identifier.
        #[arg(long, default_value = DEFAULT_COMPLETIONS_MODEL)]
        model: String,

        /// Print the retrieved context block after the answer.
        #[arg(long, default_value_t = false)]
        show_context: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let chunking = ChunkingConfig {
        max_chars: cli.max_chunk_chars,
        overlap_chars: cli.chunk_overlap_chars,
    };
    let mut manager = IndexManager::new(
        &cli.raw_dir,
        &cli.processed_dir,
        &cli.cache_dir,
        chunking,
        HashedNgramEmbedder::default(),
    )?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        raw_dir = %cli.raw_dir,
        "doc-qa boot"
    );

    match cli.command {
        Command::Build { force } => {
            let report = manager.build_or_load(force)?;

            for failure in &report.failures {
                warn!(path = %failure.path.display(), reason = %failure.reason, "extraction failed");
            }
            info!(
                cache_hit = report.cache_hit,
                documents = report.document_count,
                chunks = report.chunk_count,
                fingerprint = %report.fingerprint,
                "build finished"
            );

            if report.cache_hit {
                println!(
                    "index reused from cache: {} chunks over {} documents",
                    report.chunk_count, report.document_count
                );
            } else {
                println!(
                    "index built at {}: {} chunks over {} documents ({} failed)",
                    report.finished_at.to_rfc3339(),
                    report.chunk_count,
                    report.document_count,
                    report.failures.len()
                );
            }
        }
        Command::Ask {
            question,
            top_k,
            api_key,
            endpoint,
            model,
            show_context,
        } => {
            // Load (or build) the index before answering; a cold start on an
            // unchanged corpus is a cache hit and costs one hash pass.
            match manager.build_or_load(false) {
                Ok(report) => {
                    info!(
                        cache_hit = report.cache_hit,
                        chunks = report.chunk_count,
                        "index ready"
                    );
                }
                Err(error) => warn!(%error, "index unavailable, answering with sentinel"),
            }

            let client = ChatCompletionsClient::with_endpoint(&endpoint, &model, api_key)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let engine = QueryEngine::new(client);
            let answer = engine.answer(&manager, &question, top_k);

            println!("{}", answer.text);
            if show_context && !answer.context.is_empty() {
                println!("\n--- context ---\n{}", answer.context);
            }
        }
    }

    Ok(())
}
