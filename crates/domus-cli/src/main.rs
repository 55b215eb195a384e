use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use domus_client::{
    BrowserExtractor, FileWorkItemSource, HttpListingPublisher, HttpWorkItemSource,
    JsonLinesPublisher, OpenAiFormatter, ProxyConfig, SessionConfig,
};
use domus_core::models::{ValidationOutcome, WorkItem};
use domus_core::pipeline::{BatchHandle, BatchOrchestrator, PipelineConfig, TracingReporter};
use domus_core::registry::StrategyRegistry;
use domus_core::schema::{SchemaValidator, listing_schema};
use domus_core::sink::SinkAdapter;
use domus_core::traits::{ListingPublisher, StaticSource, WorkItemSource};

#[derive(Parser)]
#[command(name = "domus", version, about = "Rental listing ingestion: browse, format, validate, publish")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the work list, process every listing and publish the valid ones
    Run {
        /// Endpoint returning the JSON list of listing URLs
        #[arg(long, env = "DOMUS_SOURCE_URL", conflicts_with = "source_file")]
        source_url: Option<String>,

        /// Local JSON file with the list of listing URLs
        #[arg(long)]
        source_file: Option<PathBuf>,

        #[arg(long, env = "DOMUS_SOURCE_USER")]
        source_user: Option<String>,

        #[arg(long, env = "DOMUS_SOURCE_PASSWORD", hide_env_values = true)]
        source_password: Option<String>,

        /// Catalog create-listing endpoint
        #[arg(long, env = "DOMUS_PUBLISH_URL")]
        publish_url: Option<String>,

        #[arg(long, env = "DOMUS_PUBLISH_USER")]
        publish_user: Option<String>,

        #[arg(long, env = "DOMUS_PUBLISH_PASSWORD", hide_env_values = true)]
        publish_password: Option<String>,

        /// Print records as JSON lines instead of publishing them
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Seconds to wait after each successful publish
        #[arg(long, env = "DOMUS_PUBLISH_DELAY_SECS", default_value_t = 0)]
        publish_delay_secs: u64,

        #[command(flatten)]
        formatter: FormatterArgs,

        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Run the pipeline for a single listing URL and print the outcome
    Extract {
        /// Listing URL
        #[arg(short, long)]
        url: String,

        #[command(flatten)]
        formatter: FormatterArgs,

        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Validate a JSON listing file against the listing schema
    Validate {
        /// Path to the JSON file (code fences are tolerated)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print the listing schema
    Schema,
}

#[derive(Args)]
struct FormatterArgs {
    /// LLM model to use (e.g., "gpt-4o-mini", "gemini-2.5-flash")
    #[arg(short, long, env = "DOMUS_MODEL")]
    model: String,

    /// OpenAI-compatible API base URL
    #[arg(
        short,
        long,
        env = "DOMUS_BASE_URL",
        default_value = "https://api.openai.com/v1"
    )]
    base_url: String,

    /// API key (reads from DOMUS_API_KEY env var if not provided)
    #[arg(short, long, env = "DOMUS_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Formatting attempts per listing
    #[arg(long, env = "DOMUS_MAX_ATTEMPTS", default_value_t = 3)]
    max_attempts: u32,
}

#[derive(Args)]
struct BrowserArgs {
    /// Rendering proxy API key. Pages are visited directly when absent.
    #[arg(long, env = "DOMUS_SCRAPER_API_KEY", hide_env_values = true)]
    scraper_api_key: Option<String>,

    /// Country the rendering proxy should browse from
    #[arg(long, env = "DOMUS_PROXY_COUNTRY", default_value = "ro")]
    proxy_country: String,

    /// Chrome/Chromium binary (auto-detected when absent)
    #[arg(long, env = "CHROME_BIN")]
    chrome: Option<PathBuf>,

    /// Seconds to wait for the listing's main content
    #[arg(long, default_value_t = 15)]
    root_wait_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("domus=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            source_url,
            source_file,
            source_user,
            source_password,
            publish_url,
            publish_user,
            publish_password,
            dry_run,
            publish_delay_secs,
            formatter,
            browser,
        } => {
            let url = publish_destination(publish_url, dry_run)?;
            let orchestrator = build_orchestrator(&formatter, &browser)?;
            let publish = PublishTarget {
                url,
                credentials: credentials(publish_user, publish_password),
                delay: Duration::from_secs(publish_delay_secs),
            };

            match (source_url, source_file) {
                (Some(url), _) => {
                    let mut source = HttpWorkItemSource::new(url)?;
                    if let Some((user, password)) = credentials(source_user, source_password) {
                        source = source.with_basic_auth(user, password);
                    }
                    cmd_run(orchestrator, source, publish).await?;
                }
                (None, Some(path)) => {
                    cmd_run(orchestrator, FileWorkItemSource::new(path), publish).await?;
                }
                (None, None) => bail!("Either --source-url or --source-file is required"),
            }
        }
        Commands::Extract {
            url,
            formatter,
            browser,
        } => {
            let orchestrator = build_orchestrator(&formatter, &browser)?;
            cmd_extract(orchestrator, url).await?;
        }
        Commands::Validate { file } => {
            let outcome = validate_file(&file)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if !outcome.is_valid {
                bail!("{} is not a valid listing", file.display());
            }
        }
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&listing_schema())?);
        }
    }

    Ok(())
}

struct PublishTarget {
    /// `None` prints JSON lines to stdout.
    url: Option<String>,
    credentials: Option<(String, String)>,
    delay: Duration,
}

/// Catalog endpoint for a run, `None` for a dry run. A run must name one
/// of the two.
fn publish_destination(publish_url: Option<String>, dry_run: bool) -> Result<Option<String>> {
    match (publish_url, dry_run) {
        (_, true) => Ok(None),
        (Some(url), false) => Ok(Some(url)),
        (None, false) => bail!("Either --publish-url (DOMUS_PUBLISH_URL) or --dry-run is required"),
    }
}

fn credentials(user: Option<String>, password: Option<String>) -> Option<(String, String)> {
    match (user, password) {
        (Some(user), password) => Some((user, password.unwrap_or_default())),
        (None, _) => None,
    }
}

fn build_orchestrator(
    formatter: &FormatterArgs,
    browser: &BrowserArgs,
) -> Result<BatchOrchestrator<BrowserExtractor, OpenAiFormatter>> {
    let llm = OpenAiFormatter::with_base_url(&formatter.api_key, &formatter.model, &formatter.base_url)
        .context("Failed to create formatter client")?;

    let mut session = SessionConfig::new().with_root_wait(Duration::from_secs(browser.root_wait_secs));
    if let Some(chrome) = &browser.chrome {
        session = session.with_chrome_executable(chrome);
    }

    let proxy = match &browser.scraper_api_key {
        Some(key) => ProxyConfig::new(key).with_country_code(&browser.proxy_country),
        None => {
            tracing::warn!("No rendering proxy key set, visiting listing pages directly");
            ProxyConfig::direct()
        }
    };

    let validator = SchemaValidator::listing().context("Failed to compile listing schema")?;
    let config = PipelineConfig {
        max_attempts: formatter.max_attempts,
        ..PipelineConfig::default()
    };

    Ok(BatchOrchestrator::new(
        StrategyRegistry::default(),
        BrowserExtractor::new(session, proxy),
        llm,
        validator,
        config,
    ))
}

async fn cmd_run<S>(
    orchestrator: BatchOrchestrator<BrowserExtractor, OpenAiFormatter>,
    source: S,
    publish: PublishTarget,
) -> Result<()>
where
    S: WorkItemSource + 'static,
{
    match &publish.url {
        Some(url) => {
            let mut publisher =
                HttpListingPublisher::new(url).context("Failed to create publisher client")?;
            if let Some((user, password)) = &publish.credentials {
                publisher = publisher.with_basic_auth(user, password);
            }
            drive(orchestrator, source, publisher, publish.delay).await
        }
        None => drive(orchestrator, source, JsonLinesPublisher::stdout(), publish.delay).await,
    }
}

/// Run the batch on a task and drain its events into `publisher`.
/// Ctrl-C stops the batch after the item in progress.
async fn drive<S, P>(
    orchestrator: BatchOrchestrator<BrowserExtractor, OpenAiFormatter>,
    source: S,
    publisher: P,
    publish_delay: Duration,
) -> Result<()>
where
    S: WorkItemSource + 'static,
    P: ListingPublisher,
{
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, stopping after the current listing");
                cancel.cancel();
            }
        }
    });

    let BatchHandle { events, join } = orchestrator.spawn(source, cancel, TracingReporter);
    let sink = SinkAdapter::new(publisher).with_publish_delay(publish_delay);
    let sink_summary = sink.drain(events).await;

    let summary = join
        .await
        .context("Batch task panicked")?
        .context("Batch aborted")?;

    tracing::info!(
        run_id = %summary.run_id,
        processed = summary.processed(),
        total = summary.total,
        published = sink_summary.published,
        publish_failed = sink_summary.publish_failed,
        "Run complete"
    );
    Ok(())
}

async fn cmd_extract(
    orchestrator: BatchOrchestrator<BrowserExtractor, OpenAiFormatter>,
    url: String,
) -> Result<()> {
    let source = StaticSource::new(vec![WorkItem::Url(url)]);
    let BatchHandle { mut events, join } =
        orchestrator.spawn(source, CancellationToken::new(), TracingReporter);

    let event = events.recv().await.context("Pipeline produced no event")?;
    println!("{}", serde_json::to_string_pretty(&event)?);

    join.await
        .context("Batch task panicked")?
        .context("Batch aborted")?;
    Ok(())
}

/// Validate a listing file. Fences around the JSON are tolerated.
fn validate_file(path: &Path) -> Result<ValidationOutcome> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read listing file: {}", path.display()))?;
    let validator = SchemaValidator::listing().context("Failed to compile listing schema")?;
    let (outcome, _) = validator.check_output(&raw);
    Ok(outcome)
}
