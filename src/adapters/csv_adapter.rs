//! CSV price history adapter.
//!
//! Reads `<SYMBOL>.csv` files with a `date,adj_close` header from one directory.

use crate::domain::error::QuantError;
use crate::domain::price::{PricePoint, PriceSeries};
use crate::domain::universe::{self, Universe};
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct PriceRow {
    date: String,
    adj_close: f64,
}

pub struct CsvPriceAdapter {
    base_path: PathBuf,
}

impl CsvPriceAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }

    /// Symbols with a CSV file in the directory, sorted.
    pub fn list_symbols(&self) -> Result<Vec<String>, QuantError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| QuantError::Database {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| QuantError::Database {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(symbol) = name_str.strip_suffix(".csv") {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    /// Full history for `symbol`. A missing file yields an empty series.
    pub fn read_series(&self, symbol: &str) -> Result<PriceSeries, QuantError> {
        let path = self.csv_path(symbol);
        if !path.exists() {
            return Ok(PriceSeries::empty(symbol));
        }

        let mut rdr = csv::Reader::from_path(&path).map_err(|e| QuantError::Database {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut points = Vec::new();
        for result in rdr.deserialize::<PriceRow>() {
            let row = result.map_err(|e| QuantError::Database {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;
            let date = NaiveDate::parse_from_str(row.date.trim(), "%Y-%m-%d").map_err(|e| {
                QuantError::Database {
                    reason: format!("invalid date format '{}': {}", row.date, e),
                }
            })?;
            points.push(PricePoint {
                date,
                price: row.adj_close,
            });
        }

        PriceSeries::from_unsorted(symbol, points)
    }
}

impl PricePort for CsvPriceAdapter {
    fn load_price_series(&self, symbol: &str, as_of: NaiveDate) -> Result<PriceSeries, QuantError> {
        Ok(self.read_series(symbol)?.truncated(as_of))
    }

    fn load_universe_symbols(&self, universe: Universe) -> Result<Vec<String>, QuantError> {
        Ok(universe::registry_members(universe))
    }
}
