use std::collections::HashSet;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

use tidings_core::{
    ArticleStore, CacheStore, CycleReport, HarvestConfig, HarvestScheduler, MemoryArticleStore,
    Source, SourceOutcome, TracingHarvestReporter,
};
use tidings_db::{ArticleRepository, Database, DatabaseConfig};

#[derive(Parser)]
#[command(name = "tidings", version, about = "Headline harvester for major news outlets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one harvest cycle and print the headlines as JSON
    Harvest {
        /// Outlet to harvest (repeatable; defaults to all)
        #[arg(short, long = "source")]
        sources: Vec<Source>,

        /// Persist articles to the database (requires DATABASE_URL)
        #[arg(long, default_value_t = false)]
        save: bool,
    },

    /// Show the newest persisted headlines of an outlet
    Latest {
        /// Outlet slug, e.g. "cnbc" or "foxbusiness"
        #[arg(short, long)]
        source: Source,

        /// Number of results to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr so stdout stays valid JSON.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("tidings=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Harvest { sources, save } => {
            let sources = selected_sources(sources);
            let config = HarvestConfig::from_env()?;
            if save {
                cmd_harvest(&sources, &config, connect_db().await?).await?;
            } else {
                cmd_harvest(&sources, &config, MemoryArticleStore::new()).await?;
            }
        }
        Commands::Latest { source, limit } => {
            let repo = connect_db().await?;
            cmd_latest(source, limit, &repo).await?;
        }
    }

    Ok(())
}

/// Outlets to harvest in request order, each once. Empty means all.
fn selected_sources(requested: Vec<Source>) -> Vec<Source> {
    if requested.is_empty() {
        return Source::ALL.to_vec();
    }
    let mut seen = HashSet::new();
    requested.into_iter().filter(|s| seen.insert(*s)).collect()
}

/// Connect to PostgreSQL using DATABASE_URL and apply migrations.
async fn connect_db() -> Result<ArticleRepository> {
    let config = DatabaseConfig::from_env()
        .context("DATABASE_URL not set. Required for --save or the latest command.")?;
    let db = Database::connect(&config)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await?;

    Ok(db.article_repo())
}

async fn cmd_harvest<S: ArticleStore>(
    sources: &[Source],
    config: &HarvestConfig,
    store: S,
) -> Result<()> {
    let adapters = tidings_client::live_adapters(sources, config)
        .context("Failed to create HTTP client")?;
    let scheduler = HarvestScheduler::new(adapters, CacheStore::new(store), config.poll_interval);
    tracing::info!(outlets = sources.len(), "Running one harvest cycle");

    let report = scheduler.run_cycle(&TracingHarvestReporter).await;
    let output = render_report(&report, scheduler.cache()).await;
    println!("{}", serde_json::to_string_pretty(&output)?);

    if report.updated() == 0 {
        anyhow::bail!("No outlet produced headlines");
    }
    Ok(())
}

/// One JSON entry per outlet: its snapshot, or why it has none.
async fn render_report<S: ArticleStore>(report: &CycleReport, cache: &CacheStore<S>) -> Value {
    let mut entries = Map::new();
    for (source, outcome) in &report.outcomes {
        let entry = match outcome {
            SourceOutcome::Updated { articles, .. } => {
                serde_json::to_value(cache.latest(*source, *articles).await)
                    .unwrap_or(Value::Null)
            }
            SourceOutcome::Failed { kind, error } => {
                json!({ "error": kind.as_str(), "message": error })
            }
        };
        entries.insert(source.as_str().to_string(), entry);
    }
    Value::Object(entries)
}

async fn cmd_latest(source: Source, limit: usize, repo: &ArticleRepository) -> Result<()> {
    let articles = repo.latest(source, limit).await?;

    if articles.is_empty() {
        println!("No stored headlines for {}", source.display_name());
        return Ok(());
    }

    println!("Latest {} headlines:\n", source.display_name());
    for article in &articles {
        println!(
            "  [{}] {}\n      {}",
            article.published_at.format("%Y-%m-%d %H:%M:%S UTC"),
            article.title,
            article.link,
        );
    }

    let total = repo.count(source).await?;
    println!("\nShowing {} of {} stored", articles.len(), total);

    Ok(())
}
