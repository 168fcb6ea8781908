//! medrag CLI - index and query the diagnosis knowledge base
//!
//! # Commands
//!
//! ```bash
//! # Chunk a document and show results
//! medrag chunk --granularity sentence --size 3 --overlap 1 input.txt
//!
//! # Rebuild the Qdrant collection from exported diagnosis standards
//! medrag --config medrag.json rebuild standards.json
//!
//! # Retrieve, rerank and fuse against Qdrant
//! medrag search "sudden chest pain radiating to the arm"
//!
//! # Demo: index and search in memory, no services needed
//! medrag demo --hash-embeddings standards.json "facial droop"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use medrag_lib::{
    chunk::{Chunker, Granularity, WindowChunker},
    embed::{Embedder, HashEmbedder, OpenAiEmbedder},
    index::{select_for_index, DiagnosisStandard, Indexer, SourceRow},
    rerank::HttpReranker,
    search::SearchEngine,
    store::{MemoryStore, MetadataFilter, QdrantStore, RetrievalHit, SearchMode, VectorStore},
    Config,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "medrag")]
#[command(about = "Retrieval pipeline for a medical diagnosis knowledge base")]
#[command(version)]
struct Cli {
    /// JSON configuration file (defaults are used when omitted)
    #[arg(short, long, global = true, env = "MEDRAG_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk a text file and print the windows
    Chunk {
        /// Input file to chunk
        input: PathBuf,

        /// Unit granularity: word, sentence or paragraph
        #[arg(short, long)]
        granularity: Option<Granularity>,

        /// Units per chunk
        #[arg(long)]
        size: Option<usize>,

        /// Units shared by consecutive chunks
        #[arg(long)]
        overlap: Option<usize>,

        /// Locale for sentence splitting (en, ch)
        #[arg(long)]
        locale: Option<String>,
    },

    /// Rebuild the vector collection from a JSON export of diagnosis standards
    Rebuild {
        /// JSON array of diagnosis standard rows
        rows: PathBuf,
    },

    /// Search the vector collection
    Search {
        /// Query text
        query: String,

        #[command(flatten)]
        opts: QueryOpts,
    },

    /// Demo: index a JSON export in memory and search it (all in one command)
    Demo {
        /// JSON array of diagnosis standard rows
        rows: PathBuf,

        /// Query text
        query: String,

        #[command(flatten)]
        opts: QueryOpts,

        /// Use the offline hash embedder instead of the embedding gateway
        #[arg(long)]
        hash_embeddings: bool,
    },
}

#[derive(clap::Args)]
struct QueryOpts {
    /// Candidates to retrieve
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Passages to keep after reranking
    #[arg(short = 'n', long)]
    top_n: Option<usize>,

    /// Retrieval mode: dense or hybrid
    #[arg(short, long)]
    mode: Option<SearchMode>,

    /// Skip the rerank gateway
    #[arg(long)]
    no_rerank: bool,

    /// Only consider emergency conditions
    #[arg(long)]
    emergency_only: bool,
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config '{}'", path.display())),
        None => Ok(Config::default()),
    }
}

fn load_rows(path: &Path) -> Result<Vec<SourceRow>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    let standards: Vec<DiagnosisStandard> = serde_json::from_str(&raw).with_context(|| {
        format!("'{}' is not a JSON array of diagnosis standards", path.display())
    })?;
    let rows = select_for_index(&standards);
    info!(standards = standards.len(), selected = rows.len(), "loaded diagnosis standards");
    Ok(rows)
}

fn print_hits(hits: &[RetrievalHit]) {
    if hits.is_empty() {
        println!("No passages matched.");
        return;
    }
    println!("\n=== Results ===\n");
    for (i, hit) in hits.iter().enumerate() {
        let name = hit
            .metadata
            .get("disease_name")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        println!("#{} {name} (score: {:.4})", i + 1, hit.score);
        println!("---");
        let preview: String = hit.text.chars().take(300).collect();
        let ellipsis = if hit.text.chars().count() > 300 { "..." } else { "" };
        println!("{preview}{ellipsis}\n");
    }
}

fn run_query<E, S>(
    config: &Config,
    embedder: E,
    store: S,
    query: &str,
    opts: &QueryOpts,
) -> Result<()>
where
    E: Embedder,
    S: VectorStore,
{
    let top_k = opts.top_k.unwrap_or(config.retrieval.top_k);
    let top_n = opts.top_n.unwrap_or(config.retrieval.top_n);
    let mode = opts.mode.unwrap_or(config.retrieval.mode);
    let mut filter = MetadataFilter::new();
    if opts.emergency_only {
        filter = filter.must_equal("is_emergency", true);
    }

    println!("Searching: '{query}' (top_k={top_k}, top_n={top_n}, mode={mode})");
    let hits = if opts.no_rerank {
        let engine = SearchEngine::new(embedder, store).with_min_score(config.retrieval.min_score);
        engine.search_reranked_filtered(query, top_k, top_n, mode, &filter)?
    } else {
        let reranker = HttpReranker::new(&config.rerank)?;
        let engine = SearchEngine::with_rerank(embedder, store, reranker)
            .with_min_score(config.retrieval.min_score)
            .with_fallback(config.retrieval.on_rerank_failure);
        engine.search_reranked_filtered(query, top_k, top_n, mode, &filter)?
    };

    print_hits(&hits);
    Ok(())
}

fn run_demo<E: Embedder>(
    config: &Config,
    embedder: E,
    rows: &Path,
    query: &str,
    opts: &QueryOpts,
) -> Result<()> {
    let rows = load_rows(rows)?;
    if rows.is_empty() {
        bail!("no diagnosis standards are flagged for immediate attention");
    }

    let indexer = Indexer::new(WindowChunker::from_config(&config.chunking)?);
    let mut store = MemoryStore::named(config.qdrant.collection.as_str());
    println!("Indexing {} diagnosis standards with {}...", rows.len(), embedder.model_name());
    let written = indexer.rebuild(&embedder, &mut store, &rows)?;
    println!("Done! Index contains {written} records");

    run_query(config, embedder, store, query, opts)
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Chunk {
            input,
            granularity,
            size,
            overlap,
            locale,
        } => {
            let chunking = &mut config.chunking;
            if let Some(granularity) = granularity {
                chunking.granularity = granularity;
            }
            if let Some(size) = size {
                chunking.chunk_size = size;
            }
            if let Some(overlap) = overlap {
                chunking.overlap = overlap;
            }
            if let Some(locale) = locale {
                chunking.locale = locale;
            }

            let chunker = WindowChunker::from_config(chunking)?;
            let text = fs::read_to_string(&input)
                .with_context(|| format!("failed to read '{}'", input.display()))?;
            let chunks = chunker.chunk(&text);

            println!(
                "Chunked '{}' into {} chunks ({} {}s, overlap {}):\n",
                input.display(),
                chunks.len(),
                chunker.chunk_size(),
                chunker.name(),
                chunker.overlap()
            );
            for (i, chunk) in chunks.iter().enumerate() {
                println!(
                    "--- Chunk {} (units {}..{}) ---",
                    i + 1,
                    chunk.unit_start,
                    chunk.unit_end
                );
                let preview: String = chunk.content.chars().take(200).collect();
                let ellipsis = if chunk.content.chars().count() > 200 { "..." } else { "" };
                println!("{preview}{ellipsis}\n");
            }
        }

        Commands::Rebuild { rows } => {
            let rows = load_rows(&rows)?;
            let embedder = OpenAiEmbedder::new(&config.embedding)?;
            let mut store = QdrantStore::new(&config.qdrant)?;
            let indexer = Indexer::new(WindowChunker::from_config(&config.chunking)?);

            let written = indexer.rebuild(&embedder, &mut store, &rows)?;
            println!(
                "Rebuilt '{}' with {written} records from {} diagnosis standards",
                store.collection(),
                rows.len()
            );
        }

        Commands::Search { query, opts } => {
            let embedder = OpenAiEmbedder::new(&config.embedding)?;
            let store = QdrantStore::new(&config.qdrant)?;
            run_query(&config, embedder, store, &query, &opts)?;
        }

        Commands::Demo {
            rows,
            query,
            opts,
            hash_embeddings,
        } => {
            if hash_embeddings {
                let embedder = HashEmbedder::new(config.embedding.dimension)?;
                run_demo(&config, embedder, &rows, &query, &opts)?;
            } else {
                let embedder = OpenAiEmbedder::new(&config.embedding)?;
                run_demo(&config, embedder, &rows, &query, &opts)?;
            }
        }
    }

    Ok(())
}
