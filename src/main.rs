use clap::Parser;
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use product_extractor::error::AppError;
use product_extractor::pipeline::services::acquisition::DirectoryFrameSource;
use product_extractor::pipeline::services::reasoning::ScriptedBackend;
use product_extractor::pipeline::services::PipelineFactory;
use product_extractor::{JobCoordinator, Settings};

/// Turn product videos into segmented and enhanced product images.
#[derive(Debug, Parser)]
#[command(name = "product-extractor", version)]
struct Cli {
    /// Video URLs (or directories of stills with --local-frames)
    #[arg(required = true)]
    sources: Vec<String>,

    /// Root directory for job workspaces
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Default log level; RUST_LOG takes precedence
    #[arg(long)]
    log_level: Option<String>,

    /// Treat each source as a directory of already-sampled stills
    #[arg(long)]
    local_frames: bool,

    /// Answer with a deterministic local backend instead of the remote service
    #[arg(long)]
    offline: bool,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut settings = Settings::load()?;
    if let Some(static_dir) = cli.static_dir {
        settings.static_dir = static_dir;
    }
    if let Some(log_level) = cli.log_level {
        settings.log_level = log_level;
    }
    init_logging(&settings.log_level);

    let mut builder = JobCoordinator::builder(settings.clone());
    if cli.local_frames {
        builder = builder.frame_source(Arc::new(DirectoryFrameSource));
    }
    if cli.offline {
        builder = builder.reasoner(PipelineFactory::create_reasoner(
            ScriptedBackend::new("offline product"),
            &settings.pipeline,
        ));
    }
    let coordinator = builder.build()?;
    coordinator.workspaces().ensure_root().await?;

    info!(
        "Submitting {} job(s) into {}",
        cli.sources.len(),
        settings.static_dir.display()
    );
    let handles = cli
        .sources
        .into_iter()
        .map(|source| coordinator.spawn(source));

    let mut failures = 0;
    for handle in join_all(handles).await {
        let response = handle?;
        if !response.is_success() {
            failures += 1;
        }
        println!("{}", serde_json::to_string(&response)?);
    }

    if failures > 0 {
        error!("{} job(s) failed", failures);
    }
    Ok(())
}
