mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pacyard_core::{
    epoch_day, load_config, Config, ConfigError, Downloader, HttpDownloader, MirrorRunner, Xfer,
};

use cli::{Cli, Commands};

/// Architecture assumed by `xfer` when neither flag nor config names one.
const DEFAULT_ARCH: &str = "x86_64";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.default_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(mut cli: Cli) -> Result<()> {
    match cli.command.take() {
        Some(Commands::Xfer {
            output,
            url,
            local_mirror,
            arch,
        }) => xfer(&cli.config, &output, &url, local_mirror, arch).await,
        None => mirror(&cli).await,
    }
}

async fn mirror(cli: &Cli) -> Result<()> {
    info!("Loading configuration from {:?}", cli.config);
    let mut config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
    if let Some(work_dir) = &cli.work_dir {
        config.paths = config.paths.with_work_dir(work_dir);
    }
    info!("Work directory: {:?}", config.paths.work_dir);

    let downloader: Arc<dyn Downloader> = Arc::new(
        HttpDownloader::new(&config.download).context("Failed to create HTTP client")?,
    );
    let runner = MirrorRunner::open(config, downloader).context("Failed to open mirror")?;

    if cli.import {
        runner
            .import()
            .context("Failed to import installed packages")?;
        return Ok(());
    }

    runner
        .run(epoch_day(Utc::now()))
        .await
        .context("Mirror run aborted")?;
    Ok(())
}

async fn xfer(
    config_path: &Path,
    output: &Path,
    url: &str,
    local_mirror: Option<String>,
    arch: Option<String>,
) -> Result<()> {
    let config = match load_config(config_path) {
        Ok(config) => Some(config),
        Err(ConfigError::FileNotFound(path)) => {
            if local_mirror.is_none() {
                warn!("No config at {}, fetching from upstream only", path);
            }
            None
        }
        Err(e) => return Err(e).context("Failed to load config"),
    };

    let local_mirror = local_mirror.or_else(|| {
        config
            .as_ref()
            .and_then(|c| c.xfer.as_ref())
            .map(|x| x.local_mirror.clone())
    });
    let arch = arch
        .or_else(|| config.as_ref().map(|c| c.options.arch.clone()))
        .unwrap_or_else(|| DEFAULT_ARCH.to_string());
    let download = config.map(|c: Config| c.download).unwrap_or_default();

    let downloader = Arc::new(
        HttpDownloader::new(&download).context("Failed to create HTTP client")?,
    );
    let source = Xfer::new(downloader, local_mirror, arch)
        .transfer(output, url)
        .await
        .with_context(|| format!("Failed to fetch {}", url))?;

    info!(source = ?source, output = %output.display(), "Transfer complete");
    Ok(())
}
