//! Diff a current portfolio against a target into buy/sell/hold instructions.

use chrono::NaiveDate;
use std::collections::BTreeSet;
use tracing::info;

use crate::domain::construction::{self, BuildRequest};
use crate::domain::error::QuantError;
use crate::domain::portfolio::{RebalanceAction, RebalanceInstruction, TargetPortfolio};
use crate::domain::settings::Settings;
use crate::ports::price_port::PricePort;
use crate::ports::snapshot_port::SnapshotPort;

pub const DEFAULT_REBALANCE_THRESHOLD: f64 = 0.005;

/// One instruction per ticker in either portfolio, in ticker order.
///
/// Moves smaller than `threshold` are held.
pub fn diff_portfolios(
    current: &TargetPortfolio,
    target: &TargetPortfolio,
    threshold: f64,
) -> Vec<RebalanceInstruction> {
    let tickers: BTreeSet<&str> = current
        .positions
        .iter()
        .chain(&target.positions)
        .map(|p| p.ticker.as_str())
        .collect();

    tickers
        .into_iter()
        .map(|ticker| {
            let current_weight = current.weight_of(ticker);
            let target_weight = target.weight_of(ticker);
            let delta = target_weight - current_weight;
            let action = if delta.abs() < threshold {
                RebalanceAction::Hold
            } else if delta > 0.0 {
                RebalanceAction::Buy
            } else {
                RebalanceAction::Sell
            };
            RebalanceInstruction {
                ticker: ticker.to_string(),
                action,
                current_weight,
                target_weight,
                delta,
            }
        })
        .collect()
}

/// Build the target for `as_of_date` and diff it against the latest stored snapshot.
///
/// The latest snapshot is read before the target replaces it.
pub fn compute_rebalance(
    prices: &dyn PricePort,
    snapshots: &dyn SnapshotPort,
    settings: &Settings,
    as_of_date: NaiveDate,
    threshold: f64,
) -> Result<Vec<RebalanceInstruction>, QuantError> {
    let current = snapshots
        .load_latest_snapshot()?
        .ok_or(QuantError::NoPriorSnapshot)?;
    let request = BuildRequest::from_settings(settings, as_of_date);
    let target = construction::build_monthly_portfolio(prices, snapshots, settings, &request)?;
    let instructions = diff_portfolios(&current, &target, threshold);
    info!(
        from = %current.as_of_date,
        to = %target.as_of_date,
        trades = instructions
            .iter()
            .filter(|i| i.action != RebalanceAction::Hold)
            .count(),
        "computed rebalance"
    );
    Ok(instructions)
}
