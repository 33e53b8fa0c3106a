//! Target portfolio snapshots and rebalance instructions.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::error::QuantError;

pub const WEIGHT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Equity,
    Gold,
    Cash,
}

impl AssetClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Equity => "equity",
            AssetClass::Gold => "gold",
            AssetClass::Cash => "cash",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "equity" => Ok(AssetClass::Equity),
            "gold" => Ok(AssetClass::Gold),
            "cash" => Ok(AssetClass::Cash),
            other => Err(format!("unknown asset class '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetPosition {
    pub ticker: String,
    pub weight: f64,
    pub asset_class: AssetClass,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetPortfolio {
    pub as_of_date: NaiveDate,
    pub positions: Vec<TargetPosition>,
    pub universe_name: String,
    pub equity_exposure: f64,
    pub defensive_exposure: f64,
}

impl TargetPortfolio {
    pub fn total_weight(&self) -> f64 {
        self.positions.iter().map(|p| p.weight).sum()
    }

    /// Weights must sum to 1.0 within [`WEIGHT_TOLERANCE`].
    pub fn validate(&self) -> Result<(), QuantError> {
        let total = self.total_weight();
        if (total - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(QuantError::InvalidPortfolio {
                as_of: self.as_of_date,
                total,
            });
        }
        Ok(())
    }

    pub fn weight_of(&self, ticker: &str) -> f64 {
        self.positions
            .iter()
            .filter(|p| p.ticker == ticker)
            .map(|p| p.weight)
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RebalanceAction {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for RebalanceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebalanceAction::Buy => f.write_str("buy"),
            RebalanceAction::Sell => f.write_str("sell"),
            RebalanceAction::Hold => f.write_str("hold"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalanceInstruction {
    pub ticker: String,
    pub action: RebalanceAction,
    pub current_weight: f64,
    pub target_weight: f64,
    pub delta: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(ticker: &str, weight: f64, asset_class: AssetClass) -> TargetPosition {
        TargetPosition {
            ticker: ticker.to_string(),
            weight,
            asset_class,
        }
    }

    fn portfolio(positions: Vec<TargetPosition>) -> TargetPortfolio {
        TargetPortfolio {
            as_of_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            positions,
            universe_name: "SP500".to_string(),
            equity_exposure: 0.8,
            defensive_exposure: 0.2,
        }
    }

    #[test]
    fn validate_accepts_full_weight() {
        let p = portfolio(vec![
            position("AMZN", 0.8, AssetClass::Equity),
            position("GLD", 0.08, AssetClass::Gold),
            position("BIL", 0.12, AssetClass::Cash),
        ]);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn validate_rejects_underweight() {
        let p = portfolio(vec![position("AMZN", 0.7, AssetClass::Equity)]);
        match p.validate() {
            Err(QuantError::InvalidPortfolio { total, .. }) => {
                assert!((total - 0.7).abs() < 1e-12)
            }
            other => panic!("expected InvalidPortfolio, got {other:?}"),
        }
    }

    #[test]
    fn weight_of_missing_ticker_is_zero() {
        let p = portfolio(vec![position("AMZN", 1.0, AssetClass::Equity)]);
        assert_eq!(p.weight_of("AMZN"), 1.0);
        assert_eq!(p.weight_of("GLD"), 0.0);
    }

    #[test]
    fn asset_class_round_trips_through_str() {
        for class in [AssetClass::Equity, AssetClass::Gold, AssetClass::Cash] {
            assert_eq!(class.as_str().parse::<AssetClass>().unwrap(), class);
        }
        assert!("bond".parse::<AssetClass>().is_err());
    }
}
