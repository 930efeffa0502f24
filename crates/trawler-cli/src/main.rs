mod page;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use trawler_client::{DefaultHeaders, ReqwestTransport};
use trawler_core::throttle::ThrottledTransport;
use trawler_core::{CancellationToken, Crawler, CrawlerConfig};
use trawler_db::{CrawlItemRepository, Database, DatabaseConfig};

use crate::page::{FollowRules, JsonLinesStage, page_task};

#[derive(Parser)]
#[command(name = "trawler", version, about = "Bounded-concurrency web crawler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl from one or more seed URLs
    Crawl {
        /// Seed URL (repeatable)
        #[arg(short, long = "url", required = true)]
        urls: Vec<String>,

        /// Number of concurrent workers [env: TRAWLER_CONCURRENCY, default 4]
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Pause each worker takes between tasks [env: TRAWLER_INTERVAL_MS, default 0]
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Extra attempts per failed request [env: TRAWLER_MAX_RETRIES, default 2]
        #[arg(long)]
        max_retries: Option<u32>,

        /// Per-attempt request timeout [env: TRAWLER_TIMEOUT_MS, default 15000]
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Follow links this many hops away from the seeds
        #[arg(short = 'd', long, env = "TRAWLER_MAX_DEPTH", default_value_t = 1)]
        max_depth: usize,

        /// Only follow links on the seed's host
        #[arg(long, default_value_t = false)]
        same_host: bool,

        /// Minimum gap between requests to one domain, across all workers
        #[arg(long, env = "TRAWLER_DOMAIN_DELAY_MS", default_value_t = 0)]
        domain_delay_ms: u64,

        /// User-Agent header sent with every request
        #[arg(
            long,
            env = "TRAWLER_USER_AGENT",
            default_value = concat!("trawler/", env!("CARGO_PKG_VERSION"))
        )]
        user_agent: String,

        /// Refuse requests to private/reserved IP ranges
        #[arg(long, default_value_t = false)]
        block_private: bool,

        /// Save items to the database instead of stdout (requires DATABASE_URL)
        #[arg(long, default_value_t = false)]
        save: bool,
    },

    /// Show persisted crawl items
    Items {
        /// Number of items to show
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("trawler=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl {
            urls,
            concurrency,
            interval_ms,
            max_retries,
            timeout_ms,
            max_depth,
            same_host,
            domain_delay_ms,
            user_agent,
            block_private,
            save,
        } => {
            let mut config = CrawlerConfig::from_env()?;
            if let Some(concurrency) = concurrency {
                config = config.with_concurrency(concurrency);
            }
            if let Some(ms) = interval_ms {
                config = config.with_interval(Duration::from_millis(ms));
            }
            if let Some(max_retries) = max_retries {
                config = config.with_max_retries(max_retries);
            }
            if let Some(ms) = timeout_ms {
                config = config.with_timeout(Duration::from_millis(ms));
            }

            let repo = if save {
                Some(connect_db().await?)
            } else {
                None
            };

            let options = CrawlOptions {
                rules: FollowRules {
                    max_depth,
                    same_host,
                },
                domain_delay: Duration::from_millis(domain_delay_ms),
                user_agent,
                block_private,
            };
            cmd_crawl(urls, config, options, repo).await?;
        }
        Commands::Items { limit } => {
            let repo = connect_db().await?;
            cmd_items(&repo, limit).await?;
        }
    }

    Ok(())
}

struct CrawlOptions {
    rules: FollowRules,
    domain_delay: Duration,
    user_agent: String,
    block_private: bool,
}

/// Connect to PostgreSQL using DATABASE_URL and apply migrations.
async fn connect_db() -> Result<CrawlItemRepository> {
    let config = DatabaseConfig::from_env()?;
    let db = Database::connect(&config)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await?;
    Ok(db.crawl_items())
}

async fn cmd_crawl(
    urls: Vec<String>,
    config: CrawlerConfig,
    options: CrawlOptions,
    repo: Option<CrawlItemRepository>,
) -> Result<()> {
    let mut transport = ReqwestTransport::new().context("Failed to create HTTP client")?;
    if !options.block_private {
        transport = transport.allow_private_urls();
    }
    let transport = ThrottledTransport::new(transport, options.domain_delay);

    let crawler = Crawler::new(transport, config)?
        .with_request_middleware(DefaultHeaders::new().user_agent(options.user_agent));
    let crawler = match repo {
        Some(repo) => crawler.with_stage(repo),
        None => crawler.with_stage(JsonLinesStage),
    };

    let rules = Arc::new(options.rules);
    for url in urls {
        let origin: Arc<str> = Arc::from(url.as_str());
        crawler.add(page_task(url, origin, 0, Arc::clone(&rules)));
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight tasks");
            on_signal.cancel();
        }
    });

    let stats = crawler.run(cancel).await;

    tracing::info!(
        succeeded = stats.tasks_succeeded,
        failed = stats.tasks_failed,
        retries = stats.retries,
        duplicates = stats.duplicates_skipped,
        items = stats.items_processed,
        rejected = stats.items_rejected,
        pending = crawler.pending(),
        elapsed_ms = stats.elapsed.as_millis() as u64,
        "Crawl finished"
    );

    Ok(())
}

async fn cmd_items(repo: &CrawlItemRepository, limit: usize) -> Result<()> {
    let total = repo.count().await?;
    let latest = repo.latest(limit).await?;

    println!("{total} crawl item(s) stored");
    for item in latest {
        println!("\n--- {} ({}) ---", item.url, item.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
        println!("Status: {}", item.status);
        println!("{}", serde_json::to_string_pretty(&item.data)?);
    }

    Ok(())
}
