//! Portfolio construction: exposure split, equity weighting with a per-name cap,
//! defensive sleeve, and snapshot persistence.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use crate::domain::error::QuantError;
use crate::domain::portfolio::{AssetClass, TargetPortfolio, TargetPosition};
use crate::domain::ranking::{self, StockFactorScores};
use crate::domain::regime;
use crate::domain::settings::Settings;
use crate::domain::universe::Universe;
use crate::ports::price_port::PricePort;
use crate::ports::snapshot_port::SnapshotPort;

pub const DEFAULT_MAX_POSITION: f64 = 0.15;
pub const GOLD_SHARE: f64 = 0.4;
pub const CASH_SHARE: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightingMethod {
    #[default]
    Softmax,
    Linear,
}

impl fmt::Display for WeightingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightingMethod::Softmax => f.write_str("softmax"),
            WeightingMethod::Linear => f.write_str("linear"),
        }
    }
}

impl FromStr for WeightingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "softmax" => Ok(WeightingMethod::Softmax),
            "linear" => Ok(WeightingMethod::Linear),
            other => Err(format!("unknown weighting method '{other}'")),
        }
    }
}

fn equal_weights(n: usize) -> Vec<f64> {
    vec![1.0 / n as f64; n]
}

pub fn softmax(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = values.iter().map(|v| (v - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    if total == 0.0 || !total.is_finite() {
        return equal_weights(values.len());
    }
    exps.iter().map(|v| v / total).collect()
}

/// Shift so the minimum maps to a small positive weight, then normalize.
pub fn normalized_linear(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let shifted: Vec<f64> = values.iter().map(|v| v - min + 1e-6).collect();
    let total: f64 = shifted.iter().sum();
    if total == 0.0 || !total.is_finite() {
        return equal_weights(values.len());
    }
    shifted.iter().map(|v| v / total).collect()
}

/// Cap each weight at `max_position` and redistribute the excess over uncapped names
/// in proportion to their weight, until no name exceeds the cap.
///
/// When the cap cannot be met (`n × max_position < 1`) every name is clipped and the
/// result renormalized, which is equal weighting. A zero total also falls back to equal
/// weighting.
pub fn apply_max_position(weights: &[f64], max_position: f64) -> Vec<f64> {
    let n = weights.len();
    if n == 0 {
        return Vec::new();
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return equal_weights(n);
    }
    if max_position * (n as f64) < 1.0 {
        let clipped: Vec<f64> = weights.iter().map(|w| w.min(max_position)).collect();
        let clipped_total: f64 = clipped.iter().sum();
        if clipped_total <= 0.0 {
            return equal_weights(n);
        }
        return clipped.iter().map(|w| w / clipped_total).collect();
    }

    let mut capped = vec![false; n];
    loop {
        let capped_count = capped.iter().filter(|c| **c).count();
        let free_budget = 1.0 - max_position * capped_count as f64;
        let free_total: f64 = weights
            .iter()
            .zip(&capped)
            .filter(|(_, c)| !**c)
            .map(|(w, _)| *w)
            .sum();
        let free_count = n - capped_count;

        let result: Vec<f64> = weights
            .iter()
            .zip(&capped)
            .map(|(w, c)| {
                if *c {
                    max_position
                } else if free_total > 0.0 {
                    w / free_total * free_budget
                } else {
                    free_budget / free_count as f64
                }
            })
            .collect();

        let mut newly_capped = false;
        for (i, w) in result.iter().enumerate() {
            if !capped[i] && *w > max_position + f64::EPSILON {
                capped[i] = true;
                newly_capped = true;
            }
        }
        if !newly_capped {
            return result;
        }
    }
}

/// Equity/defensive split from the best universe's score and exposure band.
///
/// Scores above 80 cap defensive at 10%; scores below 40 floor it at 60%.
pub fn suggest_exposures(regime_score: f64, equity_min: f64, equity_max: f64) -> (f64, f64) {
    let base_equity = (equity_min + equity_max) / 2.0;
    let mut defensive = (1.0 - base_equity).max(0.0);
    if regime_score > 80.0 {
        defensive = defensive.min(0.1);
    } else if regime_score < 40.0 {
        defensive = defensive.max(0.6);
    }
    (1.0 - defensive, defensive)
}

pub fn build_equity_positions(
    ranked: &[StockFactorScores],
    equity_exposure: f64,
    weighting: WeightingMethod,
    max_position: f64,
) -> Vec<TargetPosition> {
    if ranked.is_empty() || equity_exposure <= 0.0 {
        return Vec::new();
    }
    let scores: Vec<f64> = ranked.iter().map(|s| s.composite_score).collect();
    let base = match weighting {
        WeightingMethod::Softmax => softmax(&scores),
        WeightingMethod::Linear => normalized_linear(&scores),
    };
    apply_max_position(&base, max_position)
        .into_iter()
        .zip(ranked)
        .map(|(weight, stock)| TargetPosition {
            ticker: stock.ticker.clone(),
            weight: weight * equity_exposure,
            asset_class: AssetClass::Equity,
        })
        .collect()
}

pub fn build_defensive_positions(
    defensive_exposure: f64,
    gold_ticker: &str,
    cash_ticker: &str,
) -> Vec<TargetPosition> {
    if defensive_exposure <= 0.0 {
        return Vec::new();
    }
    vec![
        TargetPosition {
            ticker: gold_ticker.to_string(),
            weight: defensive_exposure * GOLD_SHARE,
            asset_class: AssetClass::Gold,
        },
        TargetPosition {
            ticker: cash_ticker.to_string(),
            weight: defensive_exposure * CASH_SHARE,
            asset_class: AssetClass::Cash,
        },
    ]
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildRequest {
    pub as_of_date: NaiveDate,
    pub top_n: usize,
    pub max_position: f64,
    pub weighting: WeightingMethod,
}

impl BuildRequest {
    pub fn from_settings(settings: &Settings, as_of_date: NaiveDate) -> Self {
        Self {
            as_of_date,
            top_n: settings.top_n,
            max_position: settings.max_position,
            weighting: settings.weighting,
        }
    }
}

/// Build the target portfolio for a date and persist it as that date's snapshot.
///
/// With no rankable stocks the whole portfolio moves to the defensive sleeve.
pub fn build_monthly_portfolio(
    prices: &dyn PricePort,
    snapshots: &dyn SnapshotPort,
    settings: &Settings,
    request: &BuildRequest,
) -> Result<TargetPortfolio, QuantError> {
    let decision = regime::get_current_regime(prices, settings, request.as_of_date)?;
    let best = decision.best().ok_or_else(|| QuantError::NoUniverseScores {
        reason: format!("best universe {} missing from scores", decision.best_universe),
    })?;

    let (mut equity_exposure, mut defensive_exposure) = suggest_exposures(
        decision.best_universe_score,
        best.suggested_equity_min,
        best.suggested_equity_max,
    );

    let universe: Universe = decision.best_universe.parse()?;
    let ranked = ranking::rank_universe(
        prices,
        settings,
        universe,
        request.as_of_date,
        request.top_n,
    )?;
    if ranked.is_empty() {
        warn!(
            universe = %universe,
            as_of = %request.as_of_date,
            "no ranked stocks; moving fully to defensive assets"
        );
        equity_exposure = 0.0;
        defensive_exposure = 1.0;
    }

    let mut positions = build_equity_positions(
        &ranked,
        equity_exposure,
        request.weighting,
        request.max_position,
    );
    positions.extend(build_defensive_positions(
        defensive_exposure,
        &settings.gold_ticker,
        &settings.cash_ticker,
    ));

    let portfolio = TargetPortfolio {
        as_of_date: request.as_of_date,
        positions,
        universe_name: decision.best_universe.clone(),
        equity_exposure,
        defensive_exposure,
    };
    portfolio.validate()?;
    snapshots.save_snapshot(&portfolio)?;

    info!(
        as_of = %portfolio.as_of_date,
        universe = %portfolio.universe_name,
        equity = portfolio.equity_exposure,
        defensive = portfolio.defensive_exposure,
        positions = portfolio.positions.len(),
        "built target portfolio"
    );
    Ok(portfolio)
}
