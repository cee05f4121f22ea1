//! Recommendation binary entry point.
//!
//! Command-line access to the recommendation service: keyword extraction,
//! personalized recommendations, interaction recording and interest
//! inspection, with table or JSON output.
//!
//! # Examples
//!
//! Keywords for a paper:
//! ```bash
//! paper-recommend extract --title "Attention Is All You Need" --summary "..."
//! ```
//!
//! Record that a user collected a paper, then ask for recommendations:
//! ```bash
//! paper-recommend record --user alice --id 1706.03762v7 --title "..." \
//!     --summary "..." --category cs.CL --interaction collect
//! paper-recommend recommend --user alice --format json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use paper_recommend::{
    embedding::{fastembed::FastEmbedProvider, LazyEmbedding},
    interest::InterestGroups,
    models::{InteractionType, Paper},
    provider::arxiv::ArxivClient,
    service::{KeywordsResponse, RecommendationService, RecommendationsResponse, ServiceConfig},
    storage::sqlite::SqliteStore,
};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type Service = RecommendationService<LazyEmbedding<FastEmbedProvider>, SqliteStore, ArxivClient>;

/// Output format for command results
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-friendly table
    Table,
    /// Machine-readable JSON
    Json,
}

/// Paper recommendations from reading behaviour
#[derive(Parser, Debug)]
#[command(
    name = "paper-recommend",
    version,
    about = "Recommend arXiv papers from a user's reading behaviour",
    long_about = "Extract keywords from papers, record user interactions as interest scores \
                  and recommend new arXiv papers from the accumulated interests."
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Interest database file (default: <data dir>/paper-recommend/interests.db)
    #[arg(long, global = true, value_name = "PATH")]
    db_path: Option<PathBuf>,

    /// FastEmbed model cache directory
    #[arg(long, global = true, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// arXiv API endpoint
    #[arg(long, global = true, value_name = "URL")]
    arxiv_endpoint: Option<String>,

    /// Timeout for a single arXiv request, in seconds
    #[arg(long, global = true, default_value = "20", value_name = "SECS")]
    http_timeout: u64,

    /// JSON file overriding service defaults
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Logging verbosity level
    #[arg(long, global = true, default_value = "warn", value_name = "LEVEL")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract keywords from a paper's title and summary
    Extract {
        #[arg(long)]
        title: String,

        #[arg(long)]
        summary: String,

        /// Maximum number of keywords (default from configuration)
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },

    /// Recommend papers for a user
    Recommend {
        #[arg(long, value_name = "USER_ID")]
        user: String,

        /// Maximum number of papers (default from configuration)
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },

    /// Record a user interaction with a paper
    Record {
        #[arg(long, value_name = "USER_ID")]
        user: String,

        /// arXiv identifier, with or without version suffix
        #[arg(long)]
        id: String,

        #[arg(long)]
        title: String,

        #[arg(long, default_value = "")]
        summary: String,

        /// Primary arXiv category, e.g. cs.LG
        #[arg(long)]
        category: String,

        /// One of: view, pdf_open, collect
        #[arg(long, default_value = "view")]
        interaction: InteractionType,
    },

    /// Show a user's aggregated interests
    Interests {
        #[arg(long, value_name = "USER_ID")]
        user: String,
    },
}

/// Setup logging with the specified level
fn setup_logging(log_level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();
}

fn default_db_path() -> Result<PathBuf> {
    let dir = dirs::data_dir()
        .context("Could not determine a data directory; pass --db-path")?
        .join("paper-recommend");
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create data directory: {}", dir.display()))?;
    Ok(dir.join("interests.db"))
}

fn default_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("paper-recommend").join("fastembed"))
}

fn build_service(args: &Args) -> Result<Service> {
    let config = match &args.config {
        Some(path) => ServiceConfig::load(path)
            .with_context(|| format!("Failed to load configuration: {}", path.display()))?,
        None => ServiceConfig::default(),
    };
    debug!(?config, "Loaded service configuration");

    let db_path = match &args.db_path {
        Some(path) => path.clone(),
        None => default_db_path()?,
    };
    info!("Opening interest database: {}", db_path.display());
    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;

    let source = ArxivClient::new(
        args.arxiv_endpoint.clone(),
        Duration::from_secs(args.http_timeout),
    )
    .context("Failed to create arXiv client")?;

    let cache_dir = args.cache_dir.clone().or_else(default_cache_dir);
    let embedding = FastEmbedProvider::lazy(None, cache_dir);

    Ok(RecommendationService::new(embedding, store, source, config))
}

/// Truncate to `max` characters, marking the cut with an ellipsis
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

fn new_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            header
                .iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
                .collect::<Vec<_>>(),
        );
    table
}

fn format_keywords_table(keywords: &[String]) -> String {
    if keywords.is_empty() {
        return "No keywords found.".to_string();
    }

    let mut table = new_table(&["Rank", "Keyword"]);
    for (idx, keyword) in keywords.iter().enumerate() {
        table.add_row(vec![Cell::new(idx + 1), Cell::new(keyword)]);
    }
    table.to_string()
}

fn format_papers_table(papers: &[Paper]) -> String {
    if papers.is_empty() {
        return "No recommendations.".to_string();
    }

    let mut table = new_table(&["Rank", "ID", "Title", "Authors", "Category", "Published"]);
    for (idx, paper) in papers.iter().enumerate() {
        let authors = paper
            .authors
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let published = paper
            .published_at
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_default();

        table.add_row(vec![
            Cell::new(idx + 1),
            Cell::new(&paper.id).fg(Color::Cyan),
            Cell::new(truncate(&paper.title, 60)),
            Cell::new(truncate(&authors, 40)),
            Cell::new(&paper.category),
            Cell::new(published),
        ]);
    }
    table.to_string()
}

fn format_interests_table(groups: &InterestGroups) -> String {
    if groups.is_empty() {
        return "No interests recorded.".to_string();
    }

    let mut ordered: Vec<_> = groups.values().collect();
    ordered.sort_by(|a, b| {
        b.total_score
            .partial_cmp(&a.total_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut table = new_table(&["Category", "Score", "Top keywords"]);
    for group in ordered {
        let keywords = group
            .keywords
            .iter()
            .take(5)
            .map(|k| format!("{} ({:.1})", k.keyword, k.score))
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(vec![
            Cell::new(&group.category).fg(Color::Green),
            Cell::new(format!("{:.2}", group.total_score)),
            Cell::new(keywords),
        ]);
    }
    table.to_string()
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize output to JSON")
}

async fn run(args: Args) -> Result<()> {
    let service = build_service(&args)?;
    let format = args.format;

    match args.command {
        Command::Extract { title, summary, limit } => {
            let limit = limit.unwrap_or(service.config().keyword_limit);
            let start = Instant::now();
            let keywords = service.extract_keywords(&title, &summary, limit).await;
            info!("Extracted {} keywords in {:?}", keywords.len(), start.elapsed());

            match format {
                OutputFormat::Table => println!("{}", format_keywords_table(&keywords)),
                OutputFormat::Json => println!("{}", to_json(&KeywordsResponse { keywords })?),
            }
        }
        Command::Recommend { user, limit } => {
            let limit = limit.unwrap_or(service.config().default_limit);
            let start = Instant::now();
            let papers = service
                .get_recommendations(&user, limit)
                .await
                .with_context(|| format!("Failed to recommend papers for '{}'", user))?;
            info!("Ranked {} papers in {:?}", papers.len(), start.elapsed());

            match format {
                OutputFormat::Table => println!("{}", format_papers_table(&papers)),
                OutputFormat::Json => {
                    println!("{}", to_json(&RecommendationsResponse::new(user, papers))?)
                }
            }
        }
        Command::Record {
            user,
            id,
            title,
            summary,
            category,
            interaction,
        } => {
            let paper = Paper {
                id,
                title,
                authors: Vec::new(),
                summary,
                category,
                published_at: None,
                pdf_url: None,
            };
            let paper_id = paper.id.clone();

            // the process would exit before a detached update lands
            service
                .record_interaction(&user, paper, interaction)
                .await
                .context("Interest update task panicked")?;

            let groups = service
                .interests(&user)
                .await
                .with_context(|| format!("Failed to read interests for '{}'", user))?;
            match format {
                OutputFormat::Table => {
                    println!("Recorded {} on {} for {}", interaction.as_str(), paper_id, user);
                    println!("{}", format_interests_table(&groups));
                }
                OutputFormat::Json => println!("{}", to_json(&groups)?),
            }
        }
        Command::Interests { user } => {
            let groups = service
                .interests(&user)
                .await
                .with_context(|| format!("Failed to read interests for '{}'", user))?;

            match format {
                OutputFormat::Table => println!("{}", format_interests_table(&groups)),
                OutputFormat::Json => println!("{}", to_json(&groups)?),
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(&args.log_level);
    run(args).await
}
