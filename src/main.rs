use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use harvest_api::{AppState, build_router};
use harvest_artifact::{FsStore, S3Store, Store};
use harvest_config::{ExtractionRequest, HarvestConfig, StorageMode};
use harvest_fetch::HttpFetcher;
use harvest_navigator::{CommandNavigator, Navigator, PageNavigator};
use harvest_orchestrator::{ChannelNotifier, ExtractionNotifier, NoopNotifier, Orchestrator};
use harvest_watch::await_stable_file;

/// Harvest - pulls procurement documents off web pages into object storage
#[derive(Parser)]
#[command(name = "harvest")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.harvest)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Serve the HTTP API
  Serve {
    /// Address to listen on (default: 0.0.0.0:$PORT)
    #[arg(long)]
    bind: Option<SocketAddr>,
  },

  /// Run one extraction and print the stored references
  Extract {
    /// Page to extract documents from
    #[arg(long)]
    url: String,

    /// Destination bucket
    #[arg(long)]
    bucket: String,

    /// Destination key prefix
    #[arg(long, default_value = "")]
    prefix: String,
  },

  /// Wait for stable downloads in a directory and print them
  Watch {
    directory: PathBuf,

    /// Seconds to wait (default: HARVEST_WATCH_TIMEOUT_SECS)
    #[arg(long)]
    timeout: Option<u64>,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .with_target(false)
    .init();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".harvest"),
  };

  match cli.command {
    Some(Commands::Serve { bind }) => run(serve(data_dir, bind)),
    Some(Commands::Extract {
      url,
      bucket,
      prefix,
    }) => run(extract(data_dir, url, bucket, prefix)),
    Some(Commands::Watch { directory, timeout }) => run(watch(data_dir, directory, timeout)),
    None => {
      println!("harvest - use --help to see available commands");
      Ok(())
    }
  }
}

fn run<F: Future<Output = Result<()>>>(future: F) -> Result<()> {
  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(future)
}

fn load_config(data_dir: &std::path::Path) -> Result<HarvestConfig> {
  HarvestConfig::from_env(data_dir).context("failed to load configuration")
}

async fn build_orchestrator<N: ExtractionNotifier>(
  config: HarvestConfig,
  notifier: N,
) -> Result<Orchestrator<N>> {
  let navigator: Arc<dyn Navigator> = match &config.navigation.command {
    Some(command) => Arc::new(
      CommandNavigator::new(command.clone(), config.navigation.timeout)
        .context("failed to configure navigator command")?,
    ),
    None => {
      info!("no navigator command configured, reading pages directly");
      Arc::new(PageNavigator::new(config.fetch.timeout).context("failed to build page client")?)
    }
  };

  let fetcher = HttpFetcher::new(config.fetch.timeout, config.fetch.retry.clone())
    .context("failed to build http client")?;

  let store: Arc<dyn Store> = match config.storage.mode {
    StorageMode::S3 => Arc::new(
      S3Store::connect(
        Some(config.storage.region.clone()),
        config.storage.endpoint_url.clone(),
      )
      .await,
    ),
    StorageMode::Fs => {
      info!(root = %config.storage.root.display(), "using filesystem object store");
      Arc::new(FsStore::new(&config.storage.root))
    }
  };

  Ok(Orchestrator::with_notifier(
    config,
    navigator,
    Arc::new(fetcher),
    store,
    notifier,
  ))
}

async fn serve(data_dir: PathBuf, bind: Option<SocketAddr>) -> Result<()> {
  let config = load_config(&data_dir)?;
  config
    .require_credentials()
    .context("missing credentials")?;
  let addr = bind.unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], config.port)));

  let orchestrator = build_orchestrator(config, NoopNotifier).await?;
  let state = AppState::new(orchestrator);
  let shutdown = state.shutdown.clone();
  let router = build_router(state);

  let listener = tokio::net::TcpListener::bind(addr)
    .await
    .with_context(|| format!("failed to bind {}", addr))?;
  info!(%addr, "listening");

  axum::serve(listener, router)
    .with_graceful_shutdown(async move {
      let _ = tokio::signal::ctrl_c().await;
      info!("shutting down");
      shutdown.cancel();
    })
    .await
    .context("server error")?;
  Ok(())
}

async fn extract(data_dir: PathBuf, url: String, bucket: String, prefix: String) -> Result<()> {
  let config = load_config(&data_dir)?;
  config
    .require_credentials()
    .context("missing credentials")?;
  let request = ExtractionRequest::new(&url, bucket, prefix).context("invalid request")?;

  let (tx, mut rx) = mpsc::unbounded_channel();
  let orchestrator = build_orchestrator(config, ChannelNotifier::new(tx)).await?;

  // Print events as they happen
  let printer = tokio::spawn(async move {
    while let Some(event) = rx.recv().await {
      if let Ok(line) = serde_json::to_string(&event) {
        eprintln!("{}", line);
      }
    }
  });

  let cancel = CancellationToken::new();
  let ctrl_c = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      ctrl_c.cancel();
    }
  });

  let result = orchestrator.run(&request, cancel).await;
  drop(orchestrator);
  let _ = printer.await;
  let report = result.context("extraction failed")?;

  let output = serde_json::json!({
    "status": if report.is_success() { "success" } else { "failed" },
    "files": report.uris(),
    "message": report.message(),
  });
  println!("{}", serde_json::to_string_pretty(&output)?);
  Ok(())
}

async fn watch(data_dir: PathBuf, directory: PathBuf, timeout: Option<u64>) -> Result<()> {
  let config = load_config(&data_dir)?;
  let timeout = timeout
    .map(Duration::from_secs)
    .unwrap_or(config.watch.timeout);

  eprintln!("Watching {} for up to {:?}", directory.display(), timeout);
  let stable = await_stable_file(&directory, timeout, config.watch.settle_interval).await;

  let paths: Vec<String> = stable.iter().map(|p| p.display().to_string()).collect();
  println!("{}", serde_json::to_string_pretty(&paths)?);
  Ok(())
}
