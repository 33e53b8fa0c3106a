//! Trend, momentum, realized volatility and drawdown signals over one price series.
//!
//! Momentum, volatility and drawdown are best-effort: they return `f64::NAN` when the
//! lookback is unavailable. Trend is the primary bullish/bearish gate and fails hard.

use crate::domain::error::QuantError;
use crate::domain::price::PriceSeries;
use serde::{Deserialize, Serialize};

pub const TRADING_DAYS_PER_MONTH: usize = 21;
pub const TRADING_DAYS_PER_YEAR: usize = 252;
pub const DEFAULT_VOL_WINDOW_DAYS: usize = 63;

/// 10-month simple moving average window.
const TREND_SMA_WINDOW: usize = TRADING_DAYS_PER_MONTH * 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendSignal {
    pub total_return_12m: f64,
    pub price_above_sma_10m: bool,
}

impl TrendSignal {
    pub fn is_bullish(&self) -> bool {
        self.total_return_12m > 0.0 && self.price_above_sma_10m
    }
}

/// 12-month total return and 10-month SMA position.
///
/// The return compares the last price with the price 252 points earlier, so the series
/// needs at least 253 points.
pub fn trend(series: &PriceSeries) -> Result<TrendSignal, QuantError> {
    let prices = series.prices();
    let need = TRADING_DAYS_PER_YEAR + 1;
    if prices.len() < need {
        return Err(QuantError::InsufficientHistory {
            symbol: series.symbol().to_string(),
            have: prices.len(),
            need,
        });
    }

    let current = prices[prices.len() - 1];
    let past = prices[prices.len() - 1 - TRADING_DAYS_PER_YEAR];
    let total_return_12m = current / past - 1.0;

    let window = TREND_SMA_WINDOW.min(prices.len());
    let sma = mean(&prices[prices.len() - window..]);

    Ok(TrendSignal {
        total_return_12m,
        price_above_sma_10m: current > sma,
    })
}

/// Point-to-point return over `months` × 21 trading days.
pub fn momentum(series: &PriceSeries, months: usize) -> f64 {
    period_return(&series.prices(), months * TRADING_DAYS_PER_MONTH)
}

pub(crate) fn period_return(prices: &[f64], window: usize) -> f64 {
    if prices.len() <= window {
        return f64::NAN;
    }
    let end = prices[prices.len() - 1];
    let start = prices[prices.len() - 1 - window];
    if start == 0.0 {
        return f64::NAN;
    }
    end / start - 1.0
}

/// Annualized population standard deviation of daily returns over the trailing window.
pub fn realized_vol(series: &PriceSeries, window_days: usize) -> f64 {
    let prices = series.prices();
    if prices.len() < 2 {
        return f64::NAN;
    }
    let returns = daily_returns(&prices);
    if returns.len() < 2 {
        return f64::NAN;
    }
    let window = window_days.min(returns.len());
    let tail = &returns[returns.len() - window..];
    population_std(tail) * (TRADING_DAYS_PER_YEAR as f64).sqrt()
}

/// Last price relative to the running maximum, minus one. Zero or negative.
pub fn drawdown(series: &PriceSeries) -> f64 {
    let prices = series.prices();
    let Some(&last) = prices.last() else {
        return f64::NAN;
    };
    let peak = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    last / peak - 1.0
}

/// Rank blended 6m/12m momentum descending, 1 = best.
///
/// Each entry averages its non-NaN momentum values; entries with none rank last.
/// Ties keep input order.
pub fn rank_momentum(momentum: &[(String, f64, f64)]) -> Vec<(String, usize)> {
    let mut scored: Vec<(usize, f64)> = momentum
        .iter()
        .enumerate()
        .map(|(idx, (_, m6, m12))| {
            let valid: Vec<f64> = [*m6, *m12].into_iter().filter(|v| !v.is_nan()).collect();
            let score = if valid.is_empty() {
                f64::NEG_INFINITY
            } else {
                mean(&valid)
            };
            (idx, score)
        })
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut ranks = vec![0usize; momentum.len()];
    for (rank, (idx, _)) in scored.iter().enumerate() {
        ranks[*idx] = rank + 1;
    }
    momentum
        .iter()
        .zip(ranks)
        .map(|((key, _, _), rank)| (key.clone(), rank))
        .collect()
}

fn daily_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn population_std(values: &[f64]) -> f64 {
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price::PricePoint;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    fn series(prices: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let points = prices
            .iter()
            .enumerate()
            .map(|(i, &price)| PricePoint {
                date: start + chrono::Duration::days(i as i64),
                price,
            })
            .collect();
        PriceSeries::new("TEST", points).unwrap()
    }

    fn linear(count: usize, start: f64, step: f64) -> Vec<f64> {
        (0..count).map(|i| start + step * i as f64).collect()
    }

    #[test]
    fn trend_requires_a_full_year() {
        let short = series(&linear(252, 100.0, 1.0));
        match trend(&short) {
            Err(QuantError::InsufficientHistory { have, need, .. }) => {
                assert_eq!(have, 252);
                assert_eq!(need, 253);
            }
            other => panic!("expected InsufficientHistory, got {other:?}"),
        }
    }

    #[test]
    fn trend_rising_series_is_bullish() {
        let prices = linear(300, 100.0, 1.0);
        let signal = trend(&series(&prices)).unwrap();
        let expected = 399.0 / 147.0 - 1.0;
        assert_abs_diff_eq!(signal.total_return_12m, expected, epsilon = 1e-12);
        assert!(signal.price_above_sma_10m);
        assert!(signal.is_bullish());
    }

    #[test]
    fn trend_falling_series_is_bearish() {
        let prices = linear(300, 400.0, -1.0);
        let signal = trend(&series(&prices)).unwrap();
        assert!(signal.total_return_12m < 0.0);
        assert!(!signal.price_above_sma_10m);
        assert!(!signal.is_bullish());
    }

    #[test]
    fn positive_return_below_average_is_not_bullish() {
        let signal = TrendSignal {
            total_return_12m: 0.05,
            price_above_sma_10m: false,
        };
        assert!(!signal.is_bullish());
    }

    #[test]
    fn momentum_nan_when_window_not_covered() {
        let s = series(&linear(126, 100.0, 1.0));
        assert!(momentum(&s, 6).is_nan());
    }

    #[test]
    fn momentum_six_months() {
        let s = series(&linear(127, 100.0, 1.0));
        assert_abs_diff_eq!(momentum(&s, 6), 226.0 / 100.0 - 1.0, epsilon = 1e-12);
    }

    #[test]
    fn realized_vol_nan_for_short_input() {
        assert!(realized_vol(&series(&[100.0]), 63).is_nan());
        assert!(realized_vol(&series(&[100.0, 101.0]), 63).is_nan());
    }

    #[test]
    fn realized_vol_constant_growth_is_zero() {
        let prices: Vec<f64> = (0..100).map(|i| 100.0 * 1.01_f64.powi(i)).collect();
        assert_abs_diff_eq!(realized_vol(&series(&prices), 63), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn realized_vol_uses_population_std() {
        // returns: +10%, -10%, +10% → mean 1/30, population std sqrt(2/225)
        let prices = [100.0, 110.0, 99.0, 108.9];
        let expected = (2.0_f64 / 225.0).sqrt() * 252.0_f64.sqrt();
        assert_abs_diff_eq!(realized_vol(&series(&prices), 63), expected, epsilon = 1e-9);
    }

    #[test]
    fn drawdown_from_running_peak() {
        let s = series(&[100.0, 120.0, 90.0]);
        assert_abs_diff_eq!(drawdown(&s), 90.0 / 120.0 - 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(drawdown(&series(&[100.0, 110.0])), 0.0);
        assert!(drawdown(&PriceSeries::empty("X")).is_nan());
    }

    #[test]
    fn rank_momentum_orders_and_puts_missing_last() {
        let input = vec![
            ("A".to_string(), 0.05, 0.10),
            ("B".to_string(), f64::NAN, f64::NAN),
            ("C".to_string(), 0.20, f64::NAN),
            ("D".to_string(), -0.10, -0.20),
        ];
        let ranks = rank_momentum(&input);
        assert_eq!(
            ranks,
            vec![
                ("A".to_string(), 2),
                ("B".to_string(), 4),
                ("C".to_string(), 1),
                ("D".to_string(), 3),
            ]
        );
    }

    #[test]
    fn rank_momentum_ties_keep_input_order() {
        let input = vec![("A".to_string(), 0.1, 0.1), ("B".to_string(), 0.1, 0.1)];
        let ranks = rank_momentum(&input);
        assert_eq!(ranks[0].1, 1);
        assert_eq!(ranks[1].1, 2);
    }
}
