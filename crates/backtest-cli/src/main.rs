//! Backtest CLI
//!
//! Commands:
//! - `run` — replay a strategy JSON file over a historical window
//! - `leaderboard` — print the Sharpe-ranked board from the database
//! - `fork` — clone a stored strategy and record its lineage

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use backtester::{BacktestConfig, EngineConfig, SimulationEvent, SimulationScheduler};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use market_data::{HistoricalDataCache, HttpSeriesProvider};
use rust_decimal::Decimal;
use strategy_core::config::Config;
use strategy_core::store::postgres::create_pool;
use strategy_core::store::{PgStore, StrategyStore};
use strategy_core::types::{AssetCatalog, SavedStrategy, SimulationWindow};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "backtest", about = "DeFi strategy backtesting engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a strategy JSON file over a historical window.
    Run {
        /// Path to a strategy definition (JSON).
        strategy: PathBuf,

        /// Window start (YYYY-MM-DD).
        #[arg(long)]
        start: String,

        /// Window end (YYYY-MM-DD).
        #[arg(long)]
        end: String,

        /// Initial capital in the reference currency.
        #[arg(long, default_value = "10000")]
        capital: Decimal,

        /// Hours between simulation ticks.
        #[arg(long, default_value_t = 24)]
        interval_hours: i64,

        /// Persist the result to the database (requires DATABASE_URL).
        #[arg(long, default_value_t = false)]
        save: bool,
    },
    /// Print the Sharpe-ranked leaderboard from the database.
    Leaderboard,
    /// Clone a stored strategy and record its lineage.
    Fork {
        /// Id of the strategy to fork.
        strategy_id: Uuid,

        /// Name for the new fork.
        #[arg(long)]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "backtest_cli=info,backtester=info,market_data=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Run {
            strategy,
            start,
            end,
            capital,
            interval_hours,
            save,
        } => run(config, strategy, &start, &end, capital, interval_hours, save).await,
        Commands::Leaderboard => print_leaderboard(config).await,
        Commands::Fork { strategy_id, name } => fork(config, strategy_id, name).await,
    }
}

fn parse_day(s: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{s}', expected YYYY-MM-DD"))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .context("date out of range")?;
    Ok(midnight.and_utc())
}

async fn open_store(config: &Config) -> Result<PgStore> {
    let Some(database) = &config.database else {
        bail!("DATABASE_URL must be set for this command");
    };
    let pool = create_pool(database).await?;
    Ok(PgStore::new(pool))
}

async fn run(
    config: Config,
    strategy_path: PathBuf,
    start: &str,
    end: &str,
    capital: Decimal,
    interval_hours: i64,
    save: bool,
) -> Result<()> {
    let text = std::fs::read_to_string(&strategy_path)
        .with_context(|| format!("reading {}", strategy_path.display()))?;
    let strategy: SavedStrategy = serde_json::from_str(&text)
        .with_context(|| format!("parsing {}", strategy_path.display()))?;

    let window = SimulationWindow::new(parse_day(start)?, parse_day(end)?);

    info!(
        strategy = %strategy.name,
        operations = strategy.operations.len(),
        "Loaded strategy"
    );

    let provider =
        HttpSeriesProvider::new(&config.provider.base_url, config.provider.timeout_secs);
    let cache = HistoricalDataCache::new(Arc::new(provider), AssetCatalog::default());
    let scheduler = SimulationScheduler::new(Arc::new(cache), EngineConfig::default());

    let mut handle = scheduler.start(BacktestConfig {
        strategy,
        window,
        initial_capital: capital,
        tick_interval: Duration::hours(interval_hours),
    })?;

    let cancel = handle.cancel_token();
    let mut completed = None;
    loop {
        tokio::select! {
            maybe = handle.next_event() => {
                let Some(event) = maybe else { break };
                match event {
                    SimulationEvent::Progress { message, percent, .. } => {
                        println!("[{percent:>3}%] {message}");
                    }
                    SimulationEvent::Complete(result) => {
                        completed = Some(result);
                    }
                    SimulationEvent::Cancelled => {
                        println!("Backtest cancelled");
                    }
                    SimulationEvent::Error { message } => {
                        bail!("backtest failed: {message}");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupt received, cancelling backtest");
                cancel.cancel();
            }
        }
    }
    handle.join().await;

    let Some(result) = completed else {
        return Ok(());
    };

    let m = &result.metrics;
    println!();
    println!("Final equity:      {:.2}", result.final_equity());
    println!(
        "Total return:      {:.2} ({:+.2}%)",
        m.total_return, m.total_return_pct
    );
    println!(
        "Max drawdown:      {:.2} ({:.2}%)",
        m.max_drawdown, m.max_drawdown_pct
    );
    println!("Sharpe ratio:      {:.3}", m.sharpe_ratio);
    println!("Win rate:          {:.1}%", m.win_rate * 100.0);
    println!("Gas paid:          {:.2}", m.total_gas_cost);
    println!("Protocol fees:     {:.2}", m.total_protocol_fees);
    println!("Impermanent loss:  {:.2}", m.impermanent_loss);
    println!("Trades executed:   {}", result.trades.len());

    if save {
        let store = open_store(&config).await?;
        store.put_result(&result).await?;
        info!(strategy_id = %result.strategy_id, "Saved backtest result");
    }

    Ok(())
}

async fn print_leaderboard(config: Config) -> Result<()> {
    let store = open_store(&config).await?;
    let board = leaderboard::build_leaderboard(&store).await?;

    if board.is_empty() {
        println!("No ranked strategies yet");
        return Ok(());
    }

    for entry in &board {
        let medal = match entry.medal {
            Some(leaderboard::Medal::Gold) => "🥇",
            Some(leaderboard::Medal::Silver) => "🥈",
            Some(leaderboard::Medal::Bronze) => "🥉",
            None => "  ",
        };
        println!(
            "{:>3}. {} {:<30} sharpe {:>7.3}  return {:>+7.2}%  forks {}",
            entry.rank,
            medal,
            entry.name,
            entry.sharpe_ratio,
            entry.total_return_pct,
            entry.fork_count,
        );
    }

    Ok(())
}

async fn fork(config: Config, strategy_id: Uuid, name: String) -> Result<()> {
    let store = open_store(&config).await?;
    let forked = leaderboard::fork_strategy(&store, strategy_id, name).await?;
    println!("Forked {} -> {} ({})", strategy_id, forked.id, forked.name);
    Ok(())
}
