//! Runtime settings loaded once from the INI config and validated.
//!
//! Absent keys take their defaults; present but malformed keys fail with
//! [`QuantError::ConfigInvalid`].

use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::domain::construction::{DEFAULT_MAX_POSITION, WeightingMethod};
use crate::domain::error::QuantError;
use crate::domain::factors::ProxyMode;
use crate::domain::ranking::FactorWeights;
use crate::domain::rebalance::DEFAULT_REBALANCE_THRESHOLD;
use crate::domain::regime::DEFAULT_VOL_REFERENCE;
use crate::domain::universe::{self, SCORED_UNIVERSES, Universe};
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_DATABASE_PATH: &str = "./data/quant.db";
pub const DEFAULT_POOL_SIZE: u32 = 4;
pub const DEFAULT_TOP_N: usize = 15;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub database_path: PathBuf,
    pub pool_size: u32,
    pub default_start_date: NaiveDate,
    pub benchmark_tickers: Vec<String>,
    pub csv_dir: Option<PathBuf>,
    pub universes: Vec<Universe>,
    pub vol_reference: f64,
    pub top_n: usize,
    pub max_position: f64,
    pub weighting: WeightingMethod,
    pub rebalance_threshold: f64,
    pub gold_ticker: String,
    pub cash_ticker: String,
    pub proxy_mode: ProxyMode,
    pub factor_weights: FactorWeights,
}

fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default()
}

fn default_benchmark_tickers() -> Vec<String> {
    ["QQQ", "SPY", "VMID", "GLD", "IAU", "BIL"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            pool_size: DEFAULT_POOL_SIZE,
            default_start_date: default_start_date(),
            benchmark_tickers: default_benchmark_tickers(),
            csv_dir: None,
            universes: SCORED_UNIVERSES.to_vec(),
            vol_reference: DEFAULT_VOL_REFERENCE,
            top_n: DEFAULT_TOP_N,
            max_position: DEFAULT_MAX_POSITION,
            weighting: WeightingMethod::default(),
            rebalance_threshold: DEFAULT_REBALANCE_THRESHOLD,
            gold_ticker: "GLD".to_string(),
            cash_ticker: "BIL".to_string(),
            proxy_mode: ProxyMode::default(),
            factor_weights: FactorWeights::default(),
        }
    }
}

impl Settings {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, QuantError> {
        let defaults = Settings::default();

        let database_path = non_blank(config, "database", "path")
            .map(PathBuf::from)
            .unwrap_or(defaults.database_path);
        let pool_size = parse_value(config, "database", "pool_size", defaults.pool_size)?;
        if pool_size == 0 {
            return Err(invalid("database", "pool_size", "pool_size must be at least 1"));
        }

        let default_start_date = match non_blank(config, "data", "default_start_date") {
            Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|_| {
                invalid(
                    "data",
                    "default_start_date",
                    "invalid default_start_date format, expected YYYY-MM-DD",
                )
            })?,
            None => defaults.default_start_date,
        };
        let benchmark_tickers = match non_blank(config, "data", "benchmark_tickers") {
            Some(s) => universe::parse_list(&s)
                .map_err(|e| invalid("data", "benchmark_tickers", &e.to_string()))?,
            None => defaults.benchmark_tickers,
        };
        let csv_dir = non_blank(config, "data", "csv_dir").map(PathBuf::from);

        let universes = match non_blank(config, "regime", "universes") {
            Some(s) => parse_universes(&s)?,
            None => defaults.universes,
        };
        let vol_reference =
            parse_value(config, "regime", "vol_reference", defaults.vol_reference)?;
        if !(vol_reference > 0.0) {
            return Err(invalid("regime", "vol_reference", "vol_reference must be positive"));
        }

        let top_n = parse_value(config, "portfolio", "top_n", defaults.top_n)?;
        validate_top_n(top_n)?;
        let max_position = parse_value(config, "portfolio", "max_position", defaults.max_position)?;
        validate_max_position(max_position)?;
        let weighting = parse_value(config, "portfolio", "weighting", defaults.weighting)?;
        let rebalance_threshold = parse_value(
            config,
            "portfolio",
            "rebalance_threshold",
            defaults.rebalance_threshold,
        )?;
        validate_rebalance_threshold(rebalance_threshold)?;
        let gold_ticker = non_blank(config, "portfolio", "gold_ticker")
            .map(|s| s.to_uppercase())
            .unwrap_or(defaults.gold_ticker);
        let cash_ticker = non_blank(config, "portfolio", "cash_ticker")
            .map(|s| s.to_uppercase())
            .unwrap_or(defaults.cash_ticker);

        let proxy_mode = parse_value(config, "factors", "proxy_mode", defaults.proxy_mode)?;
        let mut factor_weights = defaults.factor_weights;
        let names: Vec<String> = factor_weights.iter().map(|(n, _)| n.to_string()).collect();
        for name in &names {
            let current = factor_weights.get(name).unwrap_or(0.0);
            let weight = parse_value(config, "factors", name, current)?;
            if !weight.is_finite() {
                return Err(invalid("factors", name, "factor weight must be finite"));
            }
            factor_weights.set(name, weight);
        }

        Ok(Self {
            database_path,
            pool_size,
            default_start_date,
            benchmark_tickers,
            csv_dir,
            universes,
            vol_reference,
            top_n,
            max_position,
            weighting,
            rebalance_threshold,
            gold_ticker,
            cash_ticker,
            proxy_mode,
            factor_weights,
        })
    }
}

pub fn validate_top_n(value: usize) -> Result<(), QuantError> {
    if value == 0 {
        return Err(invalid("portfolio", "top_n", "top_n must be at least 1"));
    }
    Ok(())
}

pub fn validate_max_position(value: f64) -> Result<(), QuantError> {
    if !(value > 0.0 && value <= 1.0) {
        return Err(invalid(
            "portfolio",
            "max_position",
            "max_position must be in (0, 1]",
        ));
    }
    Ok(())
}

pub fn validate_rebalance_threshold(value: f64) -> Result<(), QuantError> {
    if !(value >= 0.0) {
        return Err(invalid(
            "portfolio",
            "rebalance_threshold",
            "rebalance_threshold must be non-negative",
        ));
    }
    Ok(())
}

fn invalid(section: &str, key: &str, reason: &str) -> QuantError {
    QuantError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn non_blank(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_value<T>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, QuantError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_blank(config, section, key) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| invalid(section, key, &format!("cannot parse '{raw}': {e}"))),
    }
}

fn parse_universes(input: &str) -> Result<Vec<Universe>, QuantError> {
    let names = universe::parse_list(input)
        .map_err(|e| invalid("regime", "universes", &e.to_string()))?;
    names
        .iter()
        .map(|name| match name.parse::<Universe>() {
            Ok(Universe::Benchmark) => Err(invalid(
                "regime",
                "universes",
                "BENCHMARK is not a scoreable universe",
            )),
            Ok(u) => Ok(u),
            Err(e) => Err(invalid("regime", "universes", &e.to_string())),
        })
        .collect()
}
