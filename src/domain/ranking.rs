//! Cross-sectional factor standardization and composite ranking within a universe.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::error::QuantError;
use crate::domain::factors::{self, FactorRow, ProxyMode};
use crate::domain::settings::Settings;
use crate::domain::universe::Universe;
use crate::ports::price_port::PricePort;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockFactorScores {
    pub ticker: String,
    pub momentum_6m: f64,
    pub momentum_12m: f64,
    pub stability: f64,
    pub volatility: f64,
    pub value: f64,
    pub shareholder_yield: f64,
    pub composite_score: f64,
    pub proxy_mode: ProxyMode,
}

/// Ordered factor-name → weight pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorWeights(Vec<(String, f64)>);

impl FactorWeights {
    pub fn new(weights: Vec<(String, f64)>) -> Self {
        Self(weights)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(name, weight)| (name.as_str(), *weight))
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.iter().find(|(n, _)| *n == name).map(|(_, w)| w)
    }

    pub fn set(&mut self, name: &str, weight: f64) {
        match self.0.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = weight,
            None => self.0.push((name.to_string(), weight)),
        }
    }
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self(vec![
            ("momentum".to_string(), 0.40),
            ("stability".to_string(), 0.20),
            ("low_volatility".to_string(), 0.20),
            ("value".to_string(), 0.10),
            ("shareholder_yield".to_string(), 0.10),
        ])
    }
}

/// Z-score a column against its non-NaN mean and sample standard deviation.
///
/// A zero or undefined deviation yields an all-zero (neutral) column. NaN inputs stay NaN.
pub fn normalize_column(values: &[f64]) -> Vec<f64> {
    let valid: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if valid.len() < 2 {
        return vec![0.0; values.len()];
    }
    let mean = valid.iter().sum::<f64>() / valid.len() as f64;
    let variance =
        valid.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (valid.len() - 1) as f64;
    let std = variance.sqrt();
    if std == 0.0 || !std.is_finite() {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - mean) / std).collect()
}

/// Weighted sum of standardized factor columns. NaN entries contribute nothing.
pub fn composite_scores(
    rows: &[FactorRow],
    weights: &FactorWeights,
) -> Result<Vec<f64>, QuantError> {
    let mut composite = vec![0.0; rows.len()];
    for (name, weight) in weights.iter() {
        factors::require_column(name)?;
        let column: Vec<f64> = rows
            .iter()
            .map(|row| row.column(name).unwrap_or(f64::NAN))
            .collect();
        for (total, z) in composite.iter_mut().zip(normalize_column(&column)) {
            if !z.is_nan() {
                *total += z * weight;
            }
        }
    }
    Ok(composite)
}

/// Score rows and sort descending by composite. Equal composites keep input order.
pub fn rank_stocks(
    rows: Vec<FactorRow>,
    weights: &FactorWeights,
) -> Result<Vec<StockFactorScores>, QuantError> {
    let composite = composite_scores(&rows, weights)?;
    let mut ranked: Vec<StockFactorScores> = rows
        .into_iter()
        .zip(composite)
        .map(|(row, composite_score)| StockFactorScores {
            ticker: row.ticker,
            momentum_6m: row.momentum_6m,
            momentum_12m: row.momentum_12m,
            stability: row.stability,
            volatility: row.volatility,
            value: row.value,
            shareholder_yield: row.shareholder_yield,
            composite_score,
            proxy_mode: row.proxy_mode,
        })
        .collect();
    ranked.sort_by(|a, b| b.composite_score.total_cmp(&a.composite_score));
    Ok(ranked)
}

/// Rank the members of `universe` as of a date and keep the top `top_n`.
///
/// Members with no price history are skipped.
pub fn rank_universe(
    prices: &dyn PricePort,
    settings: &Settings,
    universe: Universe,
    as_of_date: NaiveDate,
    top_n: usize,
) -> Result<Vec<StockFactorScores>, QuantError> {
    let mut symbols = prices.load_universe_symbols(universe)?;
    symbols.sort();
    symbols.dedup();

    let proxy = factors::proxy_for(settings.proxy_mode);
    let mut rows = Vec::with_capacity(symbols.len());
    for symbol in &symbols {
        let series = prices.load_price_series(symbol, as_of_date)?;
        if series.is_empty() {
            warn!(ticker = %symbol, as_of = %as_of_date, "skipping ticker without price history");
            continue;
        }
        rows.push(factors::compute_factors(symbol, &series, proxy.as_ref()));
    }

    if rows.is_empty() {
        warn!(universe = %universe, as_of = %as_of_date, "no rankable tickers");
        return Ok(Vec::new());
    }

    let mut ranked = rank_stocks(rows, &settings.factor_weights)?;
    ranked.truncate(top_n);
    info!(
        universe = %universe,
        as_of = %as_of_date,
        selected = ranked.len(),
        proxy_mode = %proxy.mode(),
        "ranked universe"
    );
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn row(ticker: &str, momentum: f64, volatility: f64, value: f64) -> FactorRow {
        FactorRow {
            ticker: ticker.to_string(),
            momentum_6m: momentum,
            momentum_12m: momentum,
            momentum,
            volatility,
            stability: factors::stability(volatility),
            value,
            shareholder_yield: 0.02,
            proxy_mode: ProxyMode::Synthetic,
        }
    }

    #[test]
    fn normalize_uses_sample_std() {
        let z = normalize_column(&[1.0, 2.0, 3.0]);
        assert_abs_diff_eq!(z[0], -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(z[1], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(z[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn normalize_constant_column_is_neutral() {
        assert_eq!(normalize_column(&[0.5, 0.5, 0.5]), vec![0.0, 0.0, 0.0]);
        assert_eq!(normalize_column(&[0.5]), vec![0.0]);
    }

    #[test]
    fn normalize_keeps_nan_in_place() {
        let z = normalize_column(&[1.0, f64::NAN, 3.0]);
        assert!(z[1].is_nan());
        assert_abs_diff_eq!(z[0], -std::f64::consts::FRAC_1_SQRT_2, epsilon = 1e-12);
    }

    #[test]
    fn missing_factor_fails() {
        let mut weights = FactorWeights::default();
        weights.set("earnings_quality", 0.1);
        let result = composite_scores(&[row("A", 0.1, 0.2, 0.03)], &weights);
        assert!(matches!(
            result,
            Err(QuantError::MissingFactor { factor }) if factor == "earnings_quality"
        ));
    }

    #[test]
    fn ranking_is_strictly_descending_with_leader_first() {
        let rows = vec![
            row("LAG", -0.05, 0.40, 0.02),
            row("LEAD", 0.30, 0.15, 0.04),
            row("MID", 0.10, 0.25, 0.03),
        ];
        let ranked = rank_stocks(rows, &FactorWeights::default()).unwrap();
        let tickers: Vec<&str> = ranked.iter().map(|s| s.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["LEAD", "MID", "LAG"]);
        assert!(ranked[0].composite_score > ranked[1].composite_score);
        assert!(ranked[1].composite_score > ranked[2].composite_score);
    }

    #[test]
    fn nan_factor_contributes_nothing() {
        let mut a = row("A", 0.1, 0.2, 0.03);
        a.value = f64::NAN;
        let b = row("B", 0.1, 0.2, 0.03);
        let composite = composite_scores(&[a, b], &FactorWeights::default()).unwrap();
        assert_abs_diff_eq!(composite[0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(composite[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn weights_override_and_lookup() {
        let mut weights = FactorWeights::default();
        assert_eq!(weights.get("momentum"), Some(0.40));
        weights.set("momentum", 0.5);
        assert_eq!(weights.get("momentum"), Some(0.5));
        assert_eq!(weights.iter().count(), 5);
    }
}
