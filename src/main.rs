mod api;
mod app;
mod cache;
mod config;
mod connectivity;
mod records;
mod silencer;
mod storage;
mod sync;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "plantreq")]
#[command(about = "Offline-first client for weekly plant-seedling requests")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/plantreq/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Submit a new request; syncs immediately when online
  Submit {
    #[arg(long)]
    week: String,
    #[arg(long)]
    region: String,
    #[arg(long)]
    company: String,
  },
  /// List local requests and their sync state
  List {
    /// Query the server instead of the local store
    #[arg(long)]
    remote: bool,
  },
  /// Show connectivity, counters, and last sync time
  Status,
  /// Run a sync pass now
  Sync,
  /// Stay running and sync on every reconnect
  Watch {
    /// Seconds between connectivity probes
    #[arg(long, default_value_t = 30)]
    interval: u64,
  },
  /// Remove every cached response
  ClearCache,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  let _log_guard = init_logging();

  let args = Args::parse();

  let config = config::Config::load(args.config.as_deref())?;
  let app = app::AppContext::new(config).await?;
  app.bootstrap().await;

  match args.command {
    Command::Submit {
      week,
      region,
      company,
    } => app.submit(&week, &region, &company).await?,
    Command::List { remote } => {
      if remote {
        app.list_remote().await?;
      } else {
        app.list();
      }
    }
    Command::Status => app.status(),
    Command::Sync => app.sync_now().await,
    Command::Watch { interval } => app.watch(Duration::from_secs(interval)).await,
    Command::ClearCache => app.clear_cache(),
  }

  Ok(())
}

/// Log to a daily file under the data directory; stdout stays for CLI
/// output. Filter via PLANTREQ_LOG (default info).
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
  let log_dir = dirs::data_dir()?.join("plantreq").join("logs");
  std::fs::create_dir_all(&log_dir).ok()?;

  let appender = tracing_appender::rolling::daily(log_dir, "plantreq.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter = EnvFilter::try_from_env("PLANTREQ_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Some(guard)
}
