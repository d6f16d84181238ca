//! Event harvester CLI
//!
//! Runs the search service, one-shot harvests, and offline searches.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use clap::{Args, Parser, Subcommand};
use event_harvester::{
    error::{AppError, Result},
    models::{Config, Snapshot, SnapshotDocument},
    pipeline::{self, HarvestMode, HarvestOptions},
    services::{SearchEngine, SearchRequest, build_extractor},
    storage::{LocalStorage, OverwriteGuard, SnapshotStorage},
    utils::http::{self, HttpFetcher},
};

/// Campus event harvester and search service
#[derive(Parser, Debug)]
#[command(
    name = "harvester",
    version,
    about = "Harvests campus events and serves keyword + date search"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "harvester.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API and refresh periodically
    #[cfg(feature = "server")]
    Serve,

    /// Harvest once and write the snapshot file
    Scrape(ScrapeArgs),

    /// Search a snapshot file
    Search {
        /// Natural-language query
        #[arg(required = true)]
        query: Vec<String>,

        /// Maximum number of results
        #[arg(long)]
        top: Option<usize>,

        /// Skip keyword expansion, use raw terms only
        #[arg(long)]
        no_llm: bool,

        /// Extraction model override
        #[arg(long)]
        model: Option<String>,

        /// Print the full response as JSON
        #[arg(long)]
        json: bool,

        /// Snapshot file (default: refresh.snapshot_path)
        #[arg(long)]
        events: Option<PathBuf>,
    },

    /// Validate configuration
    Validate,

    /// Show snapshot file info
    Info,
}

#[derive(Args, Debug)]
struct ScrapeArgs {
    /// Scrape the monthly archive for this many months instead of the feed
    #[arg(long, conflicts_with = "url")]
    months: Option<u32>,

    /// Scrape a single listing page instead of the feed
    #[arg(long)]
    url: Option<String>,

    /// Skip detail-page enrichment
    #[arg(long)]
    no_enrich: bool,

    /// Skip the discovery API
    #[arg(long)]
    no_discovery: bool,

    /// Concurrent detail-page fetches
    #[arg(long)]
    workers: Option<usize>,

    /// Output file (default: refresh.snapshot_path)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Indent the written JSON
    #[arg(long)]
    pretty: bool,

    /// Overwrite the output even if it holds far more events
    #[arg(long)]
    force: bool,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn load_config(path: &Path) -> Config {
    let mut config = if path.exists() {
        Config::load_or_default(path)
    } else {
        log::info!("No config at {}, using defaults", path.display());
        Config::default()
    };
    config.apply_env();
    config
}

#[cfg(feature = "server")]
async fn serve(config: Config) -> Result<()> {
    use event_harvester::pipeline::{Refresher, SnapshotStore};
    use event_harvester::server::{self, AppState};
    use tokio_util::sync::CancellationToken;

    let client = http::create_async_client(&config.http)?;
    let storage = LocalStorage::new(&config.refresh.snapshot_path);
    let refresher = Arc::new(Refresher::new(
        Arc::new(SnapshotStore::default()),
        Arc::new(HttpFetcher::from_client(client.clone())),
        Arc::new(storage),
        config.clone(),
    ));
    let engine = SearchEngine::new(
        config.search.clone(),
        build_extractor(&config.extractor, client),
    );
    if !engine.has_extractor() {
        log::info!("Keyword extraction disabled, using rule-based resolution only");
    }

    let cancel = CancellationToken::new();
    let refresh_loop = tokio::spawn(Arc::clone(&refresher).run(cancel.clone()));

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Shutdown requested");
        }
        ctrl_c.cancel();
    });

    let state = Arc::new(AppState::new(refresher, engine));
    let result = server::serve(&config.server.bind, state, cancel.clone()).await;

    cancel.cancel();
    if let Err(e) = refresh_loop.await {
        log::warn!("Refresh loop ended abnormally: {}", e);
    }
    result
}

async fn scrape(config: Config, args: ScrapeArgs) -> Result<()> {
    let mode = match (args.months, args.url) {
        (Some(months), _) => HarvestMode::Months(months),
        (None, Some(url)) => HarvestMode::Url(url),
        (None, None) => HarvestMode::Feed,
    };
    let options = HarvestOptions {
        mode,
        enrich: config.enrichment.enabled && !args.no_enrich,
        discovery: config.sources.discovery_enabled && !args.no_discovery,
        workers: args.workers.unwrap_or(config.enrichment.workers).max(1),
    };

    let output = args
        .output
        .unwrap_or_else(|| config.refresh.snapshot_path.clone());
    let storage = LocalStorage::new(&output).pretty(args.pretty);

    let fetcher = HttpFetcher::new(&config.http)?;
    let today = Local::now().date_naive();
    let result = pipeline::harvest(&fetcher, &config, &options, today).await?;

    if args.force {
        log::warn!("Overwrite check bypassed (--force)");
    } else {
        let previous = match storage.load().await {
            Ok(doc) => doc.map_or(0, |d| d.events.len()),
            Err(e) => {
                log::warn!("Existing snapshot unreadable, treating as empty: {}", e);
                0
            }
        };
        OverwriteGuard::from(&config.refresh).check(result.events.len(), previous)?;
    }

    let snapshot = Snapshot::capture(result.events);
    let document = SnapshotDocument::from_snapshot(&snapshot, Some(result.source_url));
    storage.save(&document).await?;

    log::info!("Scraped {} events → {}", document.count, output.display());
    Ok(())
}

async fn search(
    config: Config,
    query: Vec<String>,
    top: Option<usize>,
    no_llm: bool,
    model: Option<String>,
    json: bool,
    events: Option<PathBuf>,
) -> Result<()> {
    let path = events.unwrap_or_else(|| config.refresh.snapshot_path.clone());
    let document = LocalStorage::new(&path)
        .load()
        .await?
        .ok_or_else(|| AppError::config(format!("No snapshot at {}", path.display())))?;

    let extractor = if no_llm {
        None
    } else {
        build_extractor(&config.extractor, http::create_async_client(&config.http)?)
    };
    let engine = SearchEngine::new(config.search.clone(), extractor);

    let request = SearchRequest {
        query: query.join(" "),
        top,
        use_extractor: !no_llm,
        model,
    };
    let now = Local::now().naive_local();
    let response = engine.execute(&document.events, &request, now).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    log::info!("Terms: {:?}", response.terms);
    if let Some(range) = &response.date_range {
        log::info!("Date filter: {} → {}", range.start, range.end);
    }
    if response.results.is_empty() {
        log::info!("No matching events found.");
        return Ok(());
    }

    println!("Top {} of {} events:", response.count, response.total_searched);
    for hit in &response.results {
        let start: String = hit
            .start
            .as_deref()
            .unwrap_or("")
            .chars()
            .take(16)
            .map(|c| if c == 'T' { ' ' } else { c })
            .collect();
        println!("  [{:3}]  {}", hit.score, hit.url);
        println!("         {}  ({})", hit.title, start);
    }
    Ok(())
}

async fn info(config: &Config) -> Result<()> {
    let path = &config.refresh.snapshot_path;
    log::info!("Snapshot file: {}", path.display());

    match LocalStorage::new(path).load().await? {
        Some(doc) => {
            log::info!(
                "Scraped at: {}",
                doc.scraped_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "unknown".into())
            );
            if let Some(source) = &doc.source_url {
                log::info!("Source: {}", source);
            }
            log::info!("Events: {}", doc.events.len());

            let mut starts: Vec<_> = doc.events.iter().filter_map(|e| e.start_date()).collect();
            starts.sort();
            if let (Some(first), Some(last)) = (starts.first(), starts.last()) {
                log::info!("Date span: {} → {}", first, last);
            }
            let undated = doc.events.len() - starts.len();
            if undated > 0 {
                log::info!("Undated events: {}", undated);
            }
        }
        None => log::info!("No snapshot found yet."),
    }
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli.config);

    match cli.command {
        #[cfg(feature = "server")]
        Command::Serve => {
            config.validate()?;
            serve(config).await?;
        }

        Command::Scrape(args) => {
            config.validate()?;
            scrape(config, args).await?;
        }

        Command::Search {
            query,
            top,
            no_llm,
            model,
            json,
            events,
        } => {
            search(config, query, top, no_llm, model, json, events).await?;
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
        }

        Command::Info => info(&config).await?,
    }

    Ok(())
}
