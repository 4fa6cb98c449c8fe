//! termsearch: interactive console metasearch
//!
//! This is the main entry point for the application.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use termsearch::{
    cache::ResultCache,
    commands::{
        BookmarkStore, Console, JsonBookmarkStore, MemoryBookmarkStore, PlainRenderer,
        SystemOpener,
    },
    config::{self, Settings},
    metrics::Metrics,
    providers::ProviderLoader,
    search::{DispatchOptions, Dispatcher},
    session::{History, SessionState},
};
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "termsearch",
    version,
    about = "Interactive console metasearch with query operators, caching and pagination"
)]
struct Cli {
    /// Settings file (defaults to ./settings.yml or ~/.config/termsearch/settings.yml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Results shown per page
    #[arg(short = 'n', long, value_name = "N")]
    results_per_page: Option<u32>,

    /// Per provider timeout in seconds
    #[arg(short, long, value_name = "SECS")]
    timeout: Option<f64>,

    /// Run a single query and exit
    #[arg(short, long, conflicts_with = "batch")]
    query: Option<String>,

    /// Run queries from a file, one per line; `#` starts a comment
    #[arg(short, long, value_name = "FILE")]
    batch: Option<PathBuf>,

    /// Use only the offline simulation provider
    #[arg(long)]
    simulate: bool,
}

impl Cli {
    /// Fold command line overrides into loaded settings
    fn apply(&self, settings: &mut Settings) -> Result<()> {
        if self.debug {
            settings.general.debug = true;
        }
        if let Some(n) = self.results_per_page {
            settings.search.results_per_page = n;
        }
        if let Some(secs) = self.timeout {
            settings.set_provider_timeout(secs);
        }
        if self.simulate {
            settings.enable_only("simulation");
        }
        settings.validate()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = config::load(cli.config.as_deref())?;
    cli.apply(&mut settings)?;

    init_logging(settings.general.debug);
    info!("Starting termsearch v{}", termsearch::VERSION);

    let registry = ProviderLoader::load(&settings)?;
    if registry.is_empty() {
        warn!("No providers enabled; every search will fail");
    }

    let dispatcher = Dispatcher::new(
        Arc::new(registry),
        Arc::new(ResultCache::new(settings.cache.max_entries)),
        Arc::new(Metrics::new()),
    )
    .with_options(DispatchOptions::from_settings(&settings));

    let history_path = settings.history_path();
    let history = match history_path {
        Some(ref path) => History::load_from(path, settings.history.max_entries).unwrap_or_else(|e| {
            warn!("Ignoring unreadable history: {:#}", e);
            History::new(settings.history.max_entries)
        }),
        None => History::new(settings.history.max_entries),
    };

    let session = SessionState::new(
        settings.search.results_per_page,
        settings.search.default_filters.clone(),
        history,
    );

    let mut console = Console::new(
        Arc::new(dispatcher),
        session,
        Box::new(PlainRenderer::stdout(settings.display.clone())),
        Box::new(SystemOpener),
        open_bookmarks(&settings),
    )
    .with_settings(Arc::new(settings.clone()));

    if let Some(ref query) = cli.query {
        console.run_query(query).await?;
    } else if let Some(ref path) = cli.batch {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read batch file {}", path.display()))?;
        console.run_batch(&content).await?;
    } else {
        println!("termsearch {} - type ? for help, q to quit", termsearch::VERSION);
        console.run(BufReader::new(tokio::io::stdin())).await?;
    }

    if let Some(ref path) = history_path {
        if let Err(e) = console.session().history().save_to(path) {
            warn!("Failed to save history: {:#}", e);
        }
    }

    Ok(())
}

fn init_logging(debug: bool) {
    let default = if debug { "termsearch=debug" } else { "termsearch=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn open_bookmarks(settings: &Settings) -> Box<dyn BookmarkStore> {
    match settings.bookmarks_path() {
        Some(path) => match JsonBookmarkStore::open(&path) {
            Ok(store) => Box::new(store),
            Err(e) => {
                warn!("Bookmarks unavailable, keeping them in memory: {:#}", e);
                Box::new(MemoryBookmarkStore::new())
            }
        },
        None => Box::new(MemoryBookmarkStore::new()),
    }
}
