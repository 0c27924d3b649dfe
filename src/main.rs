use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::Parser;
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use frameguard::bridge::MessageBridge;
use frameguard::config::GuardConfig;
use frameguard::connection::{HttpTransport, WebSocketConnector};
use frameguard::core::{EncodedFrame, GuardError};
use frameguard::engine::{BackgroundRuntime, FrameSource, LogAlertSink, PageRuntime};
use frameguard::observability::{GuardMonitor, MetricsCollector};

/// Score a directory of JPEG frames as one live stream and log the alert level.
#[derive(Parser, Debug)]
#[command(name = "frameguard", version)]
struct Cli {
    /// Directory of .jpg/.jpeg frames, replayed in name order
    #[arg(long)]
    frames: PathBuf,

    /// JSON config file (defaults are used if it does not exist)
    #[arg(long, default_value = "frameguard.json")]
    config: PathBuf,
}

/// Replays JPEG files from a directory, one per tick, looping forever.
struct DirectoryFrameSource {
    files: Vec<PathBuf>,
    next: usize,
}

impl DirectoryFrameSource {
    async fn open(dir: &Path) -> Result<Self> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .with_context(|| format!("Failed to read frame directory {}", dir.display()))?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_jpeg = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
                .unwrap_or(false);
            if is_jpeg {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            bail!("no JPEG frames found in {}", dir.display());
        }
        Ok(Self { files, next: 0 })
    }
}

#[async_trait]
impl FrameSource for DirectoryFrameSource {
    async fn capture(&mut self) -> Result<Option<EncodedFrame>, GuardError> {
        let path = &self.files[self.next % self.files.len()];
        self.next += 1;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|err| GuardError::CaptureDegraded(format!("{}: {}", path.display(), err)))?;
        Ok(Some(EncodedFrame::from_jpeg(&bytes)))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG wins; info otherwise.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = GuardConfig::load(&cli.config).await?;
    config.apply_env();
    config.validate()?;
    info!(
        "channel {} / stateless {}",
        config.channel_url, config.stateless_url
    );

    let collector = MetricsCollector::new();
    let (bridge, inbox) = MessageBridge::new();

    let stateless = HttpTransport::new(config.stateless_url.clone(), config.request_timeout())
        .context("Failed to build HTTP client")?;
    let background = BackgroundRuntime::new(
        &config,
        Arc::new(WebSocketConnector::new(config.channel_url.clone())),
        Arc::new(stateless),
        bridge.clone(),
        inbox,
        collector.connection(),
    )
    .spawn();

    // The persisted on/off toggle; always on for the demo.
    let (_toggle_tx, toggle_rx) = tokio::sync::watch::channel(true);

    let port = bridge.open_page();
    let metrics = collector.register_page(port.page_id().to_string());
    let page = PageRuntime::new(
        port,
        Box::new(LogAlertSink),
        toggle_rx,
        config.sample_interval(),
        metrics,
    )
    .spawn(bridge.clone());

    let source = DirectoryFrameSource::open(&cli.frames).await?;
    let stream_id = page.start_stream(Box::new(source)).await?;
    info!("sampling {} as {}", cli.frames.display(), stream_id);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    page.close().await?;
    background.shutdown().await?;

    println!("{}", GuardMonitor::new(collector).generate_report());
    Ok(())
}
