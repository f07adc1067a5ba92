//! `observo`: vectorize the opportunity corpus and match summaries against it.

mod telemetry;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use observo_match::gemini::GeminiEmbeddingProvider;
use observo_match::pgvector::PgVectorIndex;
use observo_match::postgres::PgOpportunityStore;
use observo_match::{
    EmbeddingProvider, Indexer, Match, MatchConfig, MatchOrchestrator, OpportunityStore,
    RecursiveChunker,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "observo",
    version,
    about = "Match prospect summaries against grant opportunities"
)]
struct Cli {
    #[command(flatten)]
    backend: BackendArgs,

    /// Default log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct BackendArgs {
    /// PostgreSQL connection string (needs the pgvector extension)
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Gemini API key used for embeddings
    #[arg(long, env = "GEMINI_API_KEY", global = true, hide_env_values = true)]
    gemini_api_key: Option<String>,

    /// Embedding model name
    #[arg(long, env = "OBSERVO_EMBEDDING_MODEL", global = true)]
    embedding_model: Option<String>,

    /// Embedding width; must match the `vector(n)` column of an existing index
    #[arg(long, env = "OBSERVO_EMBEDDING_DIMENSIONS", global = true)]
    embedding_dimensions: Option<usize>,

    /// Chunk size in characters
    #[arg(long, global = true, default_value_t = 1200)]
    chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, global = true, default_value_t = 150)]
    chunk_overlap: usize,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chunk, embed and index every pending opportunity
    Vectorize {
        /// Opportunities per index batch
        #[arg(long, default_value_t = 100)]
        batch_size: usize,
    },
    /// Match a free-text summary against the indexed corpus
    Match {
        /// Summary of the prospect's activities
        summary: String,

        /// Number of distinct opportunities to return
        #[arg(long, short = 'n', default_value_t = 3)]
        count: usize,

        /// Include opportunities without a funding figure
        #[arg(long, default_value_t = false)]
        any_funding: bool,

        /// Print the match as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Show corpus counts and the average chunks per opportunity
    Stats,
}

struct Backends {
    config: MatchConfig,
    store: Arc<PgOpportunityStore>,
    index: Arc<PgVectorIndex>,
    chunker: Arc<RecursiveChunker>,
}

impl BackendArgs {
    async fn connect(&self, batch_size: Option<usize>) -> Result<Backends> {
        let mut builder =
            MatchConfig::builder().chunk_size(self.chunk_size).chunk_overlap(self.chunk_overlap);
        if let Some(batch_size) = batch_size {
            builder = builder.index_batch_size(batch_size);
        }
        let config = builder.build().context("invalid matching configuration")?;

        let database_url =
            self.database_url.as_deref().context("DATABASE_URL or --database-url is required")?;
        let api_key =
            self.gemini_api_key.as_deref().context("GEMINI_API_KEY or --gemini-api-key is required")?;

        let mut embedder = GeminiEmbeddingProvider::new(api_key)?;
        // width first so an explicit value survives the model switch
        if let Some(dimensions) = self.embedding_dimensions {
            embedder = embedder.with_output_dimensionality(dimensions);
        }
        if let Some(model) = &self.embedding_model {
            embedder = embedder.with_model(model)?;
        }
        info!(
            model = embedder.model(),
            dimensions = embedder.dimensions(),
            "embedding provider ready"
        );
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(embedder);

        let store = Arc::new(
            PgOpportunityStore::connect(database_url)
                .await
                .context("failed to connect to the opportunity store")?,
        );
        let index = Arc::new(
            PgVectorIndex::from_pool(store.pool().clone(), embedder)
                .await
                .context("failed to prepare the vector index")?,
        );
        let chunker = Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap));

        Ok(Backends { config, store, index, chunker })
    }
}

impl Backends {
    fn orchestrator(&self) -> Result<MatchOrchestrator> {
        Ok(MatchOrchestrator::builder()
            .config(self.config.clone())
            .store(self.store.clone())
            .index(self.index.clone())
            .chunker(self.chunker.clone())
            .build()?)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_logging(&cli.log_level, cli.log_json);

    match cli.command {
        Command::Vectorize { batch_size } => {
            let backends = cli.backend.connect(Some(batch_size)).await?;
            let indexer = Indexer::new(
                backends.store.clone(),
                backends.index.clone(),
                backends.chunker.clone(),
                &backends.config,
            )?;
            let report = indexer.run().await.context("vectorization failed")?;
            println!(
                "vectorized {} opportunities ({} chunks), skipped {}",
                report.opportunities, report.chunks, report.skipped
            );
        }
        Command::Match { summary, count, any_funding, json } => {
            let backends = cli.backend.connect(None).await?;
            let found = backends
                .orchestrator()?
                .match_summary(&summary, !any_funding, count)
                .await
                .context("matching failed")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&found)?);
            } else {
                print_match(&found);
            }
        }
        Command::Stats => {
            let backends = cli.backend.connect(None).await?;
            let pending = backends.store.pending().await?.len();
            let vectorized = backends.store.vectorized().await?.len();
            let avg = backends.orchestrator()?.avg_chunks().await?;
            info!(pending, vectorized, avg_chunks = avg, "corpus stats");
            println!("pending: {pending}\nvectorized: {vectorized}\naverage chunks: {avg:.2}");
        }
    }

    Ok(())
}

fn print_match(found: &Match) {
    if found.proposals.is_empty() {
        println!("no matching opportunities");
    }
    for (rank, proposal) in found.proposals.iter().enumerate() {
        println!("{}. {} (distance {:.3})", rank + 1, proposal.title, proposal.distance);
        if let Some(ceiling) = proposal.funding_ceiling {
            println!("   funding ceiling: {ceiling}");
        }
        if let Some(deadline) = proposal.deadline {
            println!("   deadline: {deadline}");
        }
        if !proposal.categories.is_empty() {
            println!("   categories: {}", proposal.categories.join(", "));
        }
        if let Some(rate) = proposal.success_rate {
            println!("   success rate: {:.0}%", rate * 100.0);
        }
    }
    for notice in &found.notices {
        eprintln!("note: {notice:?}");
    }
}
