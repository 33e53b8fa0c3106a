//! Per-stock factor computation.
//!
//! Value and shareholder-yield come from a [`FundamentalProxy`]. Without a fundamentals
//! feed the [`SyntheticProxy`] derives deterministic placeholder values from the ticker
//! characters; these are not valuation signals, and every score carries the
//! [`ProxyMode`] it was computed with.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::error::QuantError;
use crate::domain::price::PriceSeries;
use crate::domain::signals::{self, TRADING_DAYS_PER_MONTH};

/// 12-month window for the stock-level volatility factor.
pub const FACTOR_VOL_WINDOW_DAYS: usize = 12 * TRADING_DAYS_PER_MONTH;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyMode {
    #[default]
    Synthetic,
    Fundamental,
}

impl fmt::Display for ProxyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyMode::Synthetic => f.write_str("synthetic"),
            ProxyMode::Fundamental => f.write_str("fundamental"),
        }
    }
}

impl FromStr for ProxyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "synthetic" => Ok(ProxyMode::Synthetic),
            "fundamental" => Ok(ProxyMode::Fundamental),
            other => Err(format!("unknown proxy mode '{other}'")),
        }
    }
}

/// Source of the value, shareholder-yield and stability factors.
pub trait FundamentalProxy {
    fn mode(&self) -> ProxyMode;
    fn value(&self, ticker: &str) -> f64;
    fn shareholder_yield(&self, ticker: &str) -> f64;

    /// Price-derived by default. Override when the source has its own stability measure.
    fn stability(&self, _ticker: &str, volatility: f64) -> f64 {
        stability(volatility)
    }
}

/// Hash-of-ticker placeholder used when no fundamentals feed exists.
pub struct SyntheticProxy;

impl SyntheticProxy {
    fn hashed(ticker: &str, low: f64, high: f64) -> f64 {
        let numeric: u32 = ticker.chars().map(|c| c as u32).sum();
        let fraction = (numeric % 10_000) as f64 / 10_000.0;
        low + fraction * (high - low)
    }
}

impl FundamentalProxy for SyntheticProxy {
    fn mode(&self) -> ProxyMode {
        ProxyMode::Synthetic
    }

    /// In [1.5%, 6%).
    fn value(&self, ticker: &str) -> f64 {
        Self::hashed(ticker, 0.015, 0.06)
    }

    /// In [0%, 5%), hashed from the reversed ticker.
    fn shareholder_yield(&self, ticker: &str) -> f64 {
        let reversed: String = ticker.chars().rev().collect();
        Self::hashed(&reversed, 0.0, 0.05)
    }
}

/// Fundamentals mode with no feed attached: every fundamental factor is unavailable.
pub struct UnavailableFundamentals;

impl FundamentalProxy for UnavailableFundamentals {
    fn mode(&self) -> ProxyMode {
        ProxyMode::Fundamental
    }

    fn value(&self, _ticker: &str) -> f64 {
        f64::NAN
    }

    fn shareholder_yield(&self, _ticker: &str) -> f64 {
        f64::NAN
    }

    fn stability(&self, _ticker: &str, _volatility: f64) -> f64 {
        f64::NAN
    }
}

pub fn proxy_for(mode: ProxyMode) -> Box<dyn FundamentalProxy> {
    match mode {
        ProxyMode::Synthetic => Box::new(SyntheticProxy),
        ProxyMode::Fundamental => Box::new(UnavailableFundamentals),
    }
}

/// Raw (unstandardized) factor values for one ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorRow {
    pub ticker: String,
    pub momentum_6m: f64,
    pub momentum_12m: f64,
    pub momentum: f64,
    pub volatility: f64,
    pub stability: f64,
    pub value: f64,
    pub shareholder_yield: f64,
    pub proxy_mode: ProxyMode,
}

impl FactorRow {
    /// Value of a named factor column, `None` for unknown names.
    pub fn column(&self, name: &str) -> Option<f64> {
        let value = match name {
            "momentum" => self.momentum,
            "momentum_6m" => self.momentum_6m,
            "momentum_12m" => self.momentum_12m,
            "stability" => self.stability,
            "volatility" => self.volatility,
            "low_volatility" => -self.volatility,
            "value" => self.value,
            "shareholder_yield" => self.shareholder_yield,
            _ => return None,
        };
        Some(value)
    }
}

/// Mean of the non-NaN values, NaN when none are present.
fn nan_mean(values: &[f64]) -> f64 {
    let valid: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if valid.is_empty() {
        f64::NAN
    } else {
        signals::mean(&valid)
    }
}

/// 1 / (1 + volatility). A simplification, not a risk model.
pub fn stability(volatility: f64) -> f64 {
    if volatility.is_nan() {
        f64::NAN
    } else {
        1.0 / (1.0 + volatility)
    }
}

pub fn compute_factors(
    ticker: &str,
    series: &PriceSeries,
    proxy: &dyn FundamentalProxy,
) -> FactorRow {
    let momentum_6m = signals::momentum(series, 6);
    let momentum_12m = signals::momentum(series, 12);
    let volatility = signals::realized_vol(series, FACTOR_VOL_WINDOW_DAYS);
    let stability = proxy.stability(ticker, volatility);

    FactorRow {
        ticker: ticker.to_string(),
        momentum_6m,
        momentum_12m,
        momentum: nan_mean(&[momentum_6m, momentum_12m]),
        volatility,
        stability,
        value: proxy.value(ticker),
        shareholder_yield: proxy.shareholder_yield(ticker),
        proxy_mode: proxy.mode(),
    }
}

/// Factor column names accepted by [`FactorRow::column`].
pub const FACTOR_COLUMNS: [&str; 8] = [
    "momentum",
    "momentum_6m",
    "momentum_12m",
    "stability",
    "volatility",
    "low_volatility",
    "value",
    "shareholder_yield",
];

pub fn require_column(name: &str) -> Result<(), QuantError> {
    if FACTOR_COLUMNS.contains(&name) {
        Ok(())
    } else {
        Err(QuantError::MissingFactor {
            factor: name.to_string(),
        })
    }
}
