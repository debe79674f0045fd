//! `ladder` — fetch a leaderboard snapshot and record it with full history.
//!
//! # Usage
//!
//! ```text
//! ladder                      # same as `ladder fetch`
//! ladder --config ladder.toml fetch
//! ladder status
//! ladder history 5e32fc85ab319c2ab1beb07c
//! ```
//!
//! Exit status is 0 on success, 1 when the previous snapshot is still cached
//! upstream, and 2 on any other failure.

use std::{path::PathBuf, process::ExitCode};

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use ladder::{Error, Fetcher, Pipeline, Settings};
use ladder_core::{
  gate::{Gate, ceil_secs, format_wait},
  store::LeaderboardStore,
  user::UpstreamId,
};
use ladder_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

const EXIT_RATE_LIMITED: u8 = 1;
const EXIT_FAILURE: u8 = 2;

#[derive(Parser)]
#[command(author, version, about = "Leaderboard snapshot ingester")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "ladder.toml")]
  config: PathBuf,

  /// SQLite database path; overrides the configuration file.
  #[arg(long)]
  database: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Fetch a snapshot if the previous one has expired (default).
  Fetch,
  /// Show recent fetch runs and whether a fetch is allowed now.
  Status {
    /// Number of fetch runs to list.
    #[arg(short = 'n', long, default_value_t = 5)]
    recent: usize,
  },
  /// Print the recorded history of one user.
  History {
    /// Upstream user id, hex encoded.
    id: String,
  },
}

#[tokio::main]
async fn main() -> ExitCode {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  match run(Cli::parse()).await {
    Ok(code) => code,
    Err(e) => {
      eprintln!("error: {e:#}");
      ExitCode::from(EXIT_FAILURE)
    }
  }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
  let mut settings = Settings::load(&cli.config)
    .with_context(|| format!("failed to read config {:?}", cli.config))?;
  if let Some(database) = cli.database {
    settings.database_path = database;
  }

  let store_path = settings.database_path();
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let fetcher = Fetcher::new(&settings).context("failed to build HTTP client")?;
  let pipeline = Pipeline::new(store, fetcher);

  match cli.command.unwrap_or(Command::Fetch) {
    Command::Fetch => fetch(&pipeline).await,
    Command::Status { recent } => status(&pipeline, recent).await,
    Command::History { id } => history(&pipeline, &id).await,
  }
}

async fn fetch(pipeline: &Pipeline<SqliteStore>) -> anyhow::Result<ExitCode> {
  match pipeline.run().await {
    Ok(summary) => {
      println!("fetch {}: {} users recorded", summary.fetch.id, summary.stats);
      Ok(ExitCode::SUCCESS)
    }
    Err(Error::RateLimited { wait }) => {
      eprintln!("The most recent fetch has not expired yet.");
      eprintln!("It will expire in: {}", format_wait(&wait));
      eprintln!("Or in seconds:");
      eprintln!("{}", ceil_secs(&wait));
      Ok(ExitCode::from(EXIT_RATE_LIMITED))
    }
    Err(e) => Err(e).context("ingestion failed"),
  }
}

async fn status(pipeline: &Pipeline<SqliteStore>, recent: usize) -> anyhow::Result<ExitCode> {
  let store = pipeline.store();
  let Some(last) = store.last_fetch().await? else {
    println!("no fetch recorded yet; a fetch is allowed");
    return Ok(ExitCode::SUCCESS);
  };

  println!("last fetch:   {}", last.id);
  println!("success:      {}", last.success);
  if let Some(error) = &last.error {
    println!("error:        {error}");
  }
  if let Some(status) = &last.cache.status {
    println!("cache status: {status}");
  }
  println!("cached at:    {}", millis(last.cache.cached_at));
  println!("cached until: {}", millis(last.cached_until()));

  match pipeline.gate(Utc::now()).await? {
    Gate::Proceed => println!("a fetch is allowed now"),
    Gate::Wait(wait) => println!("next fetch allowed in {}", format_wait(&wait)),
  }

  if recent > 1 {
    println!();
    for run in store.list_fetches(recent).await? {
      println!(
        "{:>6}  {:<5}  {}  {}",
        run.id,
        run.success,
        millis(run.cache.cached_at),
        run.error.as_deref().unwrap_or(""),
      );
    }
  }
  Ok(ExitCode::SUCCESS)
}

async fn history(pipeline: &Pipeline<SqliteStore>, id: &str) -> anyhow::Result<ExitCode> {
  let upstream_id = UpstreamId::from_hex(id)?;
  let store = pipeline.store();

  let Some(user) = store.get_user(upstream_id.clone()).await? else {
    anyhow::bail!("no user with id {upstream_id}");
  };
  let identity = &user.identity;
  println!(
    "{} role={} bestrank={} supporter={} verified={}",
    identity.upstream_id,
    identity.role.as_deref().unwrap_or("-"),
    identity.bestrank.as_deref().unwrap_or("-"),
    flag(identity.supporter),
    flag(identity.verified),
  );

  for entry in store.history(upstream_id).await? {
    let s = &entry.stat.snapshot;
    println!(
      "fetch {:>6}  {}  {:<16} rank={:<3} rating={:<10} glicko={:<8} gp={:<5} gw={}",
      entry.stat.fetch_id,
      millis(entry.cached_at),
      s.username.as_deref().unwrap_or("-"),
      s.rank.as_deref().unwrap_or("-"),
      num(s.rating),
      num(s.glicko),
      s.gamesplayed.map_or_else(|| "-".to_owned(), |n| n.to_string()),
      s.gameswon.map_or_else(|| "-".to_owned(), |n| n.to_string()),
    );
  }
  Ok(ExitCode::SUCCESS)
}

fn millis(ts: Option<i64>) -> String {
  ts.and_then(DateTime::<Utc>::from_timestamp_millis)
    .map_or_else(|| "-".to_owned(), |dt| dt.to_rfc3339())
}

fn flag(b: Option<bool>) -> &'static str {
  match b {
    Some(true) => "yes",
    Some(false) => "no",
    None => "-",
  }
}

fn num(x: Option<f64>) -> String {
  x.map_or_else(|| "-".to_owned(), |x| format!("{x:.2}"))
}
