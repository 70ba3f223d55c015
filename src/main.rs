//! Command line entry point: generate and store an image per post

use anyhow::Context;
use clap::Parser;
use gen_negotiator::{
    backend::HttpTransport,
    config::{LoggingConfig, Settings},
    pipeline::Pipeline,
    sink::{FileSink, PostDescriptor},
    ImageGenerator,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(name = "gen-negotiate", version, about = "Generate images against a schema-unstable backend")]
struct Args {
    /// Configuration file (TOML)
    #[arg(long, default_value = "config/default.toml")]
    config: PathBuf,

    /// JSON file holding a list of post descriptors
    #[arg(long)]
    posts: Option<PathBuf>,

    /// Subjects to generate, used when no posts file is given
    subjects: Vec<String>,

    /// Description attached to every subject given on the command line
    #[arg(long, default_value = "")]
    hint: String,

    /// Directory images are written to
    #[arg(long)]
    output: Option<PathBuf>,

    /// Store the server URL instead of the bytes for downloaded images
    #[arg(long)]
    prefer_url: bool,

    /// Maximum generations in flight
    #[arg(long)]
    concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut settings = Settings::load_from_path(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config.display()))?;
    if let Some(output) = &args.output {
        settings.storage.base_path = output.to_string_lossy().to_string();
    }
    if let Some(concurrency) = args.concurrency {
        settings.batch.max_concurrent = concurrency;
    }
    settings.validate()?;

    init_logging(&settings.logging);

    let posts = load_posts(&args)?;
    if posts.is_empty() {
        anyhow::bail!("nothing to generate: pass subjects or --posts <file>");
    }

    let server = settings.generation.server_address().to_string();
    info!(server = %server, posts = posts.len(), "Starting generation run");

    let health = HttpTransport::new()?;
    if !health.health_check(&server, HEALTH_CHECK_TIMEOUT).await {
        warn!(server = %server, "Backend did not answer the health check; continuing anyway");
    }

    let generator = ImageGenerator::connect(settings.generation.clone())?;
    let sink = FileSink::new(&settings.storage.base_path);
    let report = Pipeline::new(&generator, sink)
        .prefer_url(args.prefer_url)
        .max_concurrent(settings.batch.max_concurrent)
        .run(&posts)
        .await;

    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(location) => println!("ok    {}  {}", outcome.name, location),
            Err(e) => println!("FAIL  {}  {}", outcome.name, e),
        }
    }

    if !report.all_succeeded() {
        anyhow::bail!("{} of {} posts failed", report.failed(), report.outcomes.len());
    }
    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.format == "pretty" {
        registry.with(fmt::layer().pretty()).init();
    } else {
        registry.with(fmt::layer().json()).init();
    }
}

fn load_posts(args: &Args) -> anyhow::Result<Vec<PostDescriptor>> {
    match &args.posts {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading posts from {}", path.display()))?;
            let posts: Vec<PostDescriptor> = serde_json::from_str(&raw)
                .with_context(|| format!("parsing posts from {}", path.display()))?;
            Ok(posts)
        }
        None => Ok(args
            .subjects
            .iter()
            .map(|subject| PostDescriptor::new(subject.clone(), args.hint.clone()))
            .collect()),
    }
}
