//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use crate::adapters::csv_adapter::CsvPriceAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::sqlite_adapter::SqliteAdapter;
use crate::domain::construction::{self, BuildRequest, WeightingMethod};
use crate::domain::error::QuantError;
use crate::domain::performance::{self, MonthlyPerformance, PerformanceSummary};
use crate::domain::portfolio::{RebalanceAction, RebalanceInstruction, TargetPortfolio};
use crate::domain::price::PriceSeries;
use crate::domain::ranking::{self, StockFactorScores};
use crate::domain::rebalance;
use crate::domain::regime::{self, RegimeDecision, UniverseScore};
use crate::domain::settings::{self, Settings};
use crate::domain::universe::{self, REGISTRY, Universe};

#[derive(Parser, Debug)]
#[command(
    name = "regimefolio",
    about = "Regime-aware monthly equity/defensive portfolio builder"
)]
pub struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the database schema and seed the ticker registry
    InitDb {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Load `<SYMBOL>.csv` price files into the database
    Import {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Score every configured universe
    Scores {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        as_of: NaiveDate,
        #[arg(long)]
        json: bool,
    },
    /// Show the regime decision for a date
    Regime {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        as_of: NaiveDate,
        #[arg(long)]
        json: bool,
    },
    /// Rank the stocks of one universe
    Rank {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        universe: Universe,
        #[arg(long)]
        as_of: NaiveDate,
        #[arg(long)]
        top_n: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Build and store the target portfolio for a date
    Build {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        as_of: NaiveDate,
        #[arg(long)]
        top_n: Option<usize>,
        #[arg(long)]
        max_position: Option<f64>,
        #[arg(long)]
        weighting: Option<WeightingMethod>,
        #[arg(long)]
        json: bool,
    },
    /// Diff the latest stored portfolio against a new target
    Rebalance {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        as_of: NaiveDate,
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long)]
        json: bool,
    },
    /// Replay stored snapshots into monthly returns and a summary
    Performance {
        #[arg(short, long)]
        config: PathBuf,
        /// Write the monthly series to a CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Show latest price dates and stored snapshot dates
    Status {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match dispatch(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn dispatch(command: Command) -> Result<(), QuantError> {
    match command {
        Command::InitDb { config } => run_init_db(&config),
        Command::Import { config, dir } => run_import(&config, dir.as_deref()),
        Command::Scores {
            config,
            as_of,
            json,
        } => run_scores(&config, as_of, json),
        Command::Regime {
            config,
            as_of,
            json,
        } => run_regime(&config, as_of, json),
        Command::Rank {
            config,
            universe,
            as_of,
            top_n,
            json,
        } => run_rank(&config, universe, as_of, top_n, json),
        Command::Build {
            config,
            as_of,
            top_n,
            max_position,
            weighting,
            json,
        } => run_build(&config, as_of, top_n, max_position, weighting, json),
        Command::Rebalance {
            config,
            as_of,
            threshold,
            json,
        } => run_rebalance(&config, as_of, threshold, json),
        Command::Performance { config, csv, json } => {
            run_performance(&config, csv.as_deref(), json)
        }
        Command::Status { config } => run_status(&config),
    }
}

pub fn load_settings(path: &Path) -> Result<Settings, QuantError> {
    let adapter = FileConfigAdapter::from_file(path)?;
    Settings::from_config(&adapter)
}

fn open_store(settings: &Settings) -> Result<SqliteAdapter, QuantError> {
    let store = SqliteAdapter::from_settings(settings)?;
    store.initialize_schema()?;
    Ok(store)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), QuantError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| QuantError::Io(e.into()))?;
    println!("{text}");
    Ok(())
}

fn fmt_pct(value: f64) -> String {
    if value.is_nan() {
        "n/a".to_string()
    } else {
        format!("{:.2}%", value * 100.0)
    }
}

fn fmt_opt_pct(value: Option<f64>) -> String {
    value.map(fmt_pct).unwrap_or_else(|| "n/a".to_string())
}

fn run_init_db(config_path: &Path) -> Result<(), QuantError> {
    let settings = load_settings(config_path)?;
    let store = open_store(&settings)?;
    let seeded = store.upsert_tickers(REGISTRY)?;
    info!(path = %settings.database_path.display(), tickers = seeded, "initialized database");
    println!(
        "Initialized {} ({} tickers registered)",
        settings.database_path.display(),
        seeded
    );
    Ok(())
}

fn run_import(config_path: &Path, dir: Option<&Path>) -> Result<(), QuantError> {
    let settings = load_settings(config_path)?;
    let dir = match dir.map(Path::to_path_buf).or_else(|| settings.csv_dir.clone()) {
        Some(d) => d,
        None => {
            return Err(QuantError::ConfigMissing {
                section: "data".to_string(),
                key: "csv_dir".to_string(),
            });
        }
    };

    let store = open_store(&settings)?;
    store.upsert_tickers(REGISTRY)?;
    let source = CsvPriceAdapter::new(dir.clone());

    let mut total = 0;
    let symbols = source.list_symbols()?;
    for symbol in &symbols {
        if universe::registry_entry(symbol).is_none() {
            warn!(ticker = %symbol, "importing ticker outside the registry");
        }
        let series = source.read_series(symbol)?;
        let points = series
            .points()
            .iter()
            .filter(|p| p.date >= settings.default_start_date)
            .copied()
            .collect();
        let cleaned = PriceSeries::from_unsorted(symbol.as_str(), points)?;
        let written = store.upsert_prices(&cleaned)?;
        info!(ticker = %symbol, rows = written, "imported prices");
        total += written;
    }

    println!(
        "Imported {} price rows for {} symbols from {}",
        total,
        symbols.len(),
        dir.display()
    );
    Ok(())
}

fn print_scores(scores: &[UniverseScore]) {
    println!(
        "{:<10} {:>7} {:>9} {:>9} {:>9} {:>5} {:>9} {:>9} {:>11}",
        "universe", "score", "trend", "mom6m", "mom12m", "rank", "vol", "drawdown", "equity"
    );
    for s in scores {
        println!(
            "{:<10} {:>7.1} {:>9} {:>9} {:>9} {:>5} {:>9} {:>9} {:>5.0}-{:<5.0}",
            s.universe_name,
            s.composite_score,
            fmt_pct(s.trend),
            fmt_pct(s.momentum_6m),
            fmt_pct(s.momentum_12m),
            s.momentum_rank,
            fmt_pct(s.realized_vol),
            fmt_pct(s.drawdown),
            s.suggested_equity_min * 100.0,
            s.suggested_equity_max * 100.0
        );
    }
}

fn run_scores(config_path: &Path, as_of: NaiveDate, json: bool) -> Result<(), QuantError> {
    let settings = load_settings(config_path)?;
    let store = open_store(&settings)?;
    let scores = regime::get_universe_scores(&store, &settings, as_of)?;
    if json {
        return print_json(&scores);
    }
    println!("Universe scores as of {as_of}");
    print_scores(&scores);
    Ok(())
}

fn print_regime(decision: &RegimeDecision) {
    println!(
        "Best universe as of {}: {} (score {:.1})",
        decision.as_of_date, decision.best_universe, decision.best_universe_score
    );
    print_scores(&decision.all_universe_scores);
}

fn run_regime(config_path: &Path, as_of: NaiveDate, json: bool) -> Result<(), QuantError> {
    let settings = load_settings(config_path)?;
    let store = open_store(&settings)?;
    let decision = regime::get_current_regime(&store, &settings, as_of)?;
    if json {
        return print_json(&decision);
    }
    print_regime(&decision);
    Ok(())
}

fn print_ranked(ranked: &[StockFactorScores]) {
    println!(
        "{:<4} {:<8} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9}",
        "#", "ticker", "score", "mom6m", "mom12m", "vol", "stab", "value*", "yield*"
    );
    for (i, s) in ranked.iter().enumerate() {
        println!(
            "{:<4} {:<8} {:>9.3} {:>9} {:>9} {:>9} {:>9.3} {:>9} {:>9}",
            i + 1,
            s.ticker,
            s.composite_score,
            fmt_pct(s.momentum_6m),
            fmt_pct(s.momentum_12m),
            fmt_pct(s.volatility),
            s.stability,
            fmt_pct(s.value),
            fmt_pct(s.shareholder_yield)
        );
    }
    if let Some(first) = ranked.first() {
        println!("* value and yield factors from {} proxies", first.proxy_mode);
    }
}

fn run_rank(
    config_path: &Path,
    universe: Universe,
    as_of: NaiveDate,
    top_n: Option<usize>,
    json: bool,
) -> Result<(), QuantError> {
    let settings = load_settings(config_path)?;
    let top_n = top_n.unwrap_or(settings.top_n);
    settings::validate_top_n(top_n)?;
    let store = open_store(&settings)?;
    let ranked = ranking::rank_universe(&store, &settings, universe, as_of, top_n)?;
    if json {
        return print_json(&ranked);
    }
    println!("Top {} of {} as of {}", ranked.len(), universe, as_of);
    print_ranked(&ranked);
    Ok(())
}

fn print_portfolio(portfolio: &TargetPortfolio) {
    println!(
        "Target portfolio {} ({}): equity {}, defensive {}",
        portfolio.as_of_date,
        portfolio.universe_name,
        fmt_pct(portfolio.equity_exposure),
        fmt_pct(portfolio.defensive_exposure)
    );
    for p in &portfolio.positions {
        println!("  {:<8} {:<7} {:>8}", p.ticker, p.asset_class, fmt_pct(p.weight));
    }
}

fn run_build(
    config_path: &Path,
    as_of: NaiveDate,
    top_n: Option<usize>,
    max_position: Option<f64>,
    weighting: Option<WeightingMethod>,
    json: bool,
) -> Result<(), QuantError> {
    let settings = load_settings(config_path)?;
    let mut request = BuildRequest::from_settings(&settings, as_of);
    if let Some(n) = top_n {
        settings::validate_top_n(n)?;
        request.top_n = n;
    }
    if let Some(cap) = max_position {
        settings::validate_max_position(cap)?;
        request.max_position = cap;
    }
    if let Some(method) = weighting {
        request.weighting = method;
    }

    let store = open_store(&settings)?;
    let portfolio = construction::build_monthly_portfolio(&store, &store, &settings, &request)?;
    if json {
        return print_json(&portfolio);
    }
    print_portfolio(&portfolio);
    Ok(())
}

fn print_instructions(instructions: &[RebalanceInstruction]) {
    println!(
        "{:<8} {:<5} {:>9} {:>9} {:>9}",
        "ticker", "action", "current", "target", "delta"
    );
    for i in instructions {
        println!(
            "{:<8} {:<5} {:>9} {:>9} {:>9}",
            i.ticker,
            i.action,
            fmt_pct(i.current_weight),
            fmt_pct(i.target_weight),
            fmt_pct(i.delta)
        );
    }
    let trades = instructions
        .iter()
        .filter(|i| i.action != RebalanceAction::Hold)
        .count();
    println!("{trades} trades");
}

fn run_rebalance(
    config_path: &Path,
    as_of: NaiveDate,
    threshold: Option<f64>,
    json: bool,
) -> Result<(), QuantError> {
    let settings = load_settings(config_path)?;
    let threshold = threshold.unwrap_or(settings.rebalance_threshold);
    settings::validate_rebalance_threshold(threshold)?;

    let store = open_store(&settings)?;
    let instructions = rebalance::compute_rebalance(&store, &store, &settings, as_of, threshold)?;
    if json {
        return print_json(&instructions);
    }
    print_instructions(&instructions);
    Ok(())
}

pub fn write_performance_csv(path: &Path, series: &[MonthlyPerformance]) -> Result<(), QuantError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| QuantError::Io(e.into()))?;
    for period in series {
        writer
            .serialize(period)
            .map_err(|e| QuantError::Io(e.into()))?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct PerformanceReport<'a> {
    monthly: &'a [MonthlyPerformance],
    summary: &'a PerformanceSummary,
}

fn print_performance(series: &[MonthlyPerformance], summary: &PerformanceSummary) {
    println!(
        "{:<10} {:<10} {:>9} {:<6} {:>9} {:>9}",
        "start", "end", "return", "bench", "bench_ret", "alpha"
    );
    for p in series {
        println!(
            "{:<10} {:<10} {:>9} {:<6} {:>9} {:>9}",
            p.period_start,
            p.period_end,
            fmt_pct(p.portfolio_return),
            p.benchmark_name,
            fmt_pct(p.benchmark_return),
            fmt_pct(p.alpha)
        );
    }
    println!();
    println!(
        "Period:        {} to {} ({} months)",
        summary.start_date, summary.end_date, summary.months
    );
    println!("Total return:  {}", fmt_pct(summary.total_return));
    println!("CAGR:          {}", fmt_pct(summary.cagr));
    println!("Volatility:    {}", fmt_opt_pct(summary.volatility));
    println!("Max drawdown:  {}", fmt_pct(summary.max_drawdown));
    match summary.sharpe {
        Some(s) => println!("Sharpe:        {s:.2}"),
        None => println!("Sharpe:        n/a"),
    }
    println!("Total alpha:   {}", fmt_pct(summary.total_alpha));
    println!("Avg alpha/mo:  {}", fmt_pct(summary.avg_monthly_alpha));
}

fn run_performance(
    config_path: &Path,
    csv_path: Option<&Path>,
    json: bool,
) -> Result<(), QuantError> {
    let settings = load_settings(config_path)?;
    let store = open_store(&settings)?;
    let series = performance::get_monthly_performance(&store, &store, &settings)?;

    if let Some(path) = csv_path {
        write_performance_csv(path, &series)?;
        info!(path = %path.display(), periods = series.len(), "wrote performance csv");
    }

    let summary = performance::compute_performance_summary(&series)?;
    if json {
        return print_json(&PerformanceReport {
            monthly: &series,
            summary: &summary,
        });
    }
    print_performance(&series, &summary);
    Ok(())
}

fn run_status(config_path: &Path) -> Result<(), QuantError> {
    let settings = load_settings(config_path)?;
    let store = open_store(&settings)?;

    println!("Database: {}", settings.database_path.display());
    for ticker in &settings.benchmark_tickers {
        match store.latest_price_date(ticker)? {
            Some(date) => println!("  {ticker:<6} latest price {date}"),
            None => println!("  {ticker:<6} no prices"),
        }
    }

    let dates = store.snapshot_dates()?;
    match (dates.first(), dates.last()) {
        (Some(first), Some(last)) => {
            println!("Snapshots: {} ({} to {})", dates.len(), first, last)
        }
        _ => println!("Snapshots: none"),
    }
    Ok(())
}
