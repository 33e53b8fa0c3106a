//! Period returns, alpha and summary statistics from replayed portfolio snapshots.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::error::QuantError;
use crate::domain::portfolio::TargetPortfolio;
use crate::domain::regime::{self, RegimeDecision};
use crate::domain::settings::Settings;
use crate::domain::universe::Universe;
use crate::ports::price_port::PricePort;
use crate::ports::snapshot_port::SnapshotPort;

const MONTHS_PER_YEAR: f64 = 12.0;
const DAYS_PER_YEAR: f64 = 365.25;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPerformance {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub portfolio_return: f64,
    pub benchmark_name: String,
    pub benchmark_return: f64,
    pub alpha: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_return: f64,
    pub cagr: f64,
    pub volatility: Option<f64>,
    pub max_drawdown: f64,
    pub sharpe: Option<f64>,
    pub total_alpha: f64,
    pub avg_monthly_alpha: f64,
    pub months: usize,
}

fn required_price(
    prices: &dyn PricePort,
    symbol: &str,
    date: NaiveDate,
) -> Result<f64, QuantError> {
    prices
        .price_on_or_before(symbol, date)?
        .ok_or_else(|| QuantError::MissingPriceData {
            symbol: symbol.to_string(),
            date,
        })
}

fn point_return(
    prices: &dyn PricePort,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<f64, QuantError> {
    let start_price = required_price(prices, symbol, start)?;
    let end_price = required_price(prices, symbol, end)?;
    if start_price <= 0.0 {
        return Err(QuantError::InvalidPrice {
            symbol: symbol.to_string(),
            date: start,
        });
    }
    Ok(end_price / start_price - 1.0)
}

/// Weighted sum of each held position's point-to-point return.
pub fn portfolio_return_for_period(
    prices: &dyn PricePort,
    portfolio: &TargetPortfolio,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<f64, QuantError> {
    let mut total = 0.0;
    for position in &portfolio.positions {
        total += position.weight * point_return(prices, &position.ticker, start, end)?;
    }
    Ok(total)
}

/// Benchmark symbol and return of the universe the regime favoured at period end.
pub fn benchmark_return_for_period(
    prices: &dyn PricePort,
    decision: &RegimeDecision,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<(String, f64), QuantError> {
    let universe: Universe = decision.best_universe.parse()?;
    let symbol = universe
        .benchmark_symbol()
        .ok_or_else(|| QuantError::UnknownUniverse {
            name: format!("{universe} (no benchmark)"),
        })?;
    let benchmark_return = point_return(prices, symbol, start, end)?;
    Ok((symbol.to_string(), benchmark_return))
}

/// Replay adjacent snapshots. `regime_at` supplies the regime decision for a period end.
pub fn compute_monthly_performance_series<F>(
    prices: &dyn PricePort,
    snapshots: &[TargetPortfolio],
    mut regime_at: F,
) -> Result<Vec<MonthlyPerformance>, QuantError>
where
    F: FnMut(NaiveDate) -> Result<RegimeDecision, QuantError>,
{
    let mut series = Vec::with_capacity(snapshots.len().saturating_sub(1));
    for pair in snapshots.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        let portfolio_return =
            portfolio_return_for_period(prices, prev, prev.as_of_date, curr.as_of_date)?;
        let decision = regime_at(curr.as_of_date)?;
        let (benchmark_name, benchmark_return) =
            benchmark_return_for_period(prices, &decision, prev.as_of_date, curr.as_of_date)?;
        debug!(
            start = %prev.as_of_date,
            end = %curr.as_of_date,
            portfolio_return,
            benchmark = %benchmark_name,
            benchmark_return,
            "replayed period"
        );
        series.push(MonthlyPerformance {
            period_start: prev.as_of_date,
            period_end: curr.as_of_date,
            portfolio_return,
            benchmark_name,
            benchmark_return,
            alpha: portfolio_return - benchmark_return,
        });
    }
    Ok(series)
}

pub fn get_monthly_performance(
    prices: &dyn PricePort,
    snapshots: &dyn SnapshotPort,
    settings: &Settings,
) -> Result<Vec<MonthlyPerformance>, QuantError> {
    let ordered = snapshots.load_all_snapshots_ordered()?;
    compute_monthly_performance_series(prices, &ordered, |date| {
        regime::get_current_regime(prices, settings, date)
    })
}

pub fn get_performance_summary(
    prices: &dyn PricePort,
    snapshots: &dyn SnapshotPort,
    settings: &Settings,
) -> Result<PerformanceSummary, QuantError> {
    let series = get_monthly_performance(prices, snapshots, settings)?;
    compute_performance_summary(&series)
}

/// Annualize over calendar days. Non-positive elapsed time yields 0.0.
fn annualized_return(total_return: f64, start: NaiveDate, end: NaiveDate) -> f64 {
    let days = (end - start).num_days();
    if days <= 0 {
        return 0.0;
    }
    let years = days as f64 / DAYS_PER_YEAR;
    (1.0 + total_return).powf(1.0 / years) - 1.0
}

/// Most negative peak-to-trough move of the compounded equity curve (starting at 1.0).
fn max_drawdown(returns: &[f64]) -> f64 {
    let mut cumulative = 1.0_f64;
    let mut peak = 1.0_f64;
    let mut max_dd = 0.0_f64;
    for r in returns {
        cumulative *= 1.0 + r;
        peak = peak.max(cumulative);
        max_dd = max_dd.min((cumulative - peak) / peak);
    }
    max_dd
}

pub fn compute_performance_summary(
    series: &[MonthlyPerformance],
) -> Result<PerformanceSummary, QuantError> {
    let (Some(first), Some(last)) = (series.first(), series.last()) else {
        return Err(QuantError::EmptyPerformance);
    };
    let returns: Vec<f64> = series.iter().map(|p| p.portfolio_return).collect();
    let months = returns.len();

    let total_return = returns.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0;
    let cagr = annualized_return(total_return, first.period_start, last.period_end);

    let volatility = if months < 2 {
        None
    } else {
        let mean = returns.iter().sum::<f64>() / months as f64;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / months as f64;
        Some(variance.sqrt() * MONTHS_PER_YEAR.sqrt())
    };

    let sharpe = match volatility {
        Some(vol) if vol > 0.0 => {
            let annual_return = (1.0 + total_return).powf(MONTHS_PER_YEAR / months as f64) - 1.0;
            Some(annual_return / vol)
        }
        _ => None,
    };

    let total_alpha: f64 = series.iter().map(|p| p.alpha).sum();

    Ok(PerformanceSummary {
        start_date: first.period_start,
        end_date: last.period_end,
        total_return,
        cagr,
        volatility,
        max_drawdown: max_drawdown(&returns),
        sharpe,
        total_alpha,
        avg_monthly_alpha: total_alpha / months as f64,
        months,
    })
}
