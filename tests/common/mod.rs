#![allow(dead_code)]

use chrono::NaiveDate;
use regimefolio::domain::error::QuantError;
use regimefolio::domain::portfolio::TargetPortfolio;
pub use regimefolio::domain::price::{PricePoint, PriceSeries};
use regimefolio::domain::universe::Universe;
use regimefolio::ports::price_port::PricePort;
use regimefolio::ports::snapshot_port::SnapshotPort;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

pub struct MockPricePort {
    pub series: HashMap<String, PriceSeries>,
    pub universes: HashMap<Universe, Vec<String>>,
    pub errors: HashMap<String, String>,
    pub quotes: HashMap<(String, NaiveDate), f64>,
}

impl MockPricePort {
    pub fn new() -> Self {
        Self {
            series: HashMap::new(),
            universes: HashMap::new(),
            errors: HashMap::new(),
            quotes: HashMap::new(),
        }
    }

    pub fn with_series(mut self, series: PriceSeries) -> Self {
        self.series.insert(series.symbol().to_string(), series);
        self
    }

    pub fn with_universe(mut self, universe: Universe, symbols: &[&str]) -> Self {
        self.universes
            .insert(universe, symbols.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Raw quote served by `price_on_or_before`, bypassing series validation.
    pub fn with_quote(mut self, symbol: &str, date: NaiveDate, price: f64) -> Self {
        self.quotes.insert((symbol.to_string(), date), price);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl PricePort for MockPricePort {
    fn load_price_series(&self, symbol: &str, as_of: NaiveDate) -> Result<PriceSeries, QuantError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(QuantError::Database {
                reason: reason.clone(),
            });
        }
        Ok(self
            .series
            .get(symbol)
            .map(|s| s.truncated(as_of))
            .unwrap_or_else(|| PriceSeries::empty(symbol)))
    }

    fn load_universe_symbols(&self, universe: Universe) -> Result<Vec<String>, QuantError> {
        Ok(self.universes.get(&universe).cloned().unwrap_or_default())
    }

    fn price_on_or_before(&self, symbol: &str, date: NaiveDate) -> Result<Option<f64>, QuantError> {
        if let Some(price) = self.quotes.get(&(symbol.to_string(), date)) {
            return Ok(Some(*price));
        }
        Ok(self.load_price_series(symbol, date)?.last().map(|p| p.price))
    }
}

/// Snapshot store keyed by date, replacing on save.
#[derive(Default)]
pub struct MemorySnapshotStore {
    pub snapshots: RefCell<BTreeMap<NaiveDate, TargetPortfolio>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(self, portfolio: TargetPortfolio) -> Self {
        self.snapshots
            .borrow_mut()
            .insert(portfolio.as_of_date, portfolio);
        self
    }

    pub fn len(&self) -> usize {
        self.snapshots.borrow().len()
    }
}

impl SnapshotPort for MemorySnapshotStore {
    fn load_latest_snapshot(&self) -> Result<Option<TargetPortfolio>, QuantError> {
        Ok(self.snapshots.borrow().values().next_back().cloned())
    }

    fn load_all_snapshots_ordered(&self) -> Result<Vec<TargetPortfolio>, QuantError> {
        Ok(self.snapshots.borrow().values().cloned().collect())
    }

    fn save_snapshot(&self, portfolio: &TargetPortfolio) -> Result<(), QuantError> {
        self.snapshots
            .borrow_mut()
            .insert(portfolio.as_of_date, portfolio.clone());
        Ok(())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Daily series compounding at `daily_return` with a small alternating wiggle.
pub fn generate_series(
    symbol: &str,
    start: NaiveDate,
    count: usize,
    start_price: f64,
    daily_return: f64,
) -> PriceSeries {
    let mut price = start_price;
    let points = (0..count)
        .map(|i| {
            if i > 0 {
                let wiggle = if i % 2 == 0 { 0.003 } else { -0.003 };
                price *= 1.0 + daily_return + wiggle;
            }
            PricePoint {
                date: start + chrono::Duration::days(i as i64),
                price,
            }
        })
        .collect();
    PriceSeries::new(symbol, points).unwrap()
}

/// Series from explicit `(date, price)` pairs.
pub fn series_from(symbol: &str, points: &[(NaiveDate, f64)]) -> PriceSeries {
    PriceSeries::new(
        symbol,
        points
            .iter()
            .map(|&(date, price)| PricePoint { date, price })
            .collect(),
    )
    .unwrap()
}

pub const HISTORY_START: (i32, u32, u32) = (2022, 1, 1);
pub const HISTORY_DAYS: usize = 800;

pub fn history_start() -> NaiveDate {
    date(HISTORY_START.0, HISTORY_START.1, HISTORY_START.2)
}

/// Three benchmarks (QQQ rising fastest, VMID falling), six constituents, gold and cash.
pub fn market() -> MockPricePort {
    let start = history_start();
    MockPricePort::new()
        .with_series(generate_series("QQQ", start, HISTORY_DAYS, 300.0, 0.0012))
        .with_series(generate_series("SPY", start, HISTORY_DAYS, 400.0, 0.0004))
        .with_series(generate_series("VMID", start, HISTORY_DAYS, 30.0, -0.0006))
        .with_series(generate_series("AAPL", start, HISTORY_DAYS, 150.0, 0.0015))
        .with_series(generate_series("MSFT", start, HISTORY_DAYS, 250.0, 0.0008))
        .with_series(generate_series("AMZN", start, HISTORY_DAYS, 100.0, 0.0005))
        .with_series(generate_series("GOOGL", start, HISTORY_DAYS, 90.0, 0.0003))
        .with_series(generate_series("TSCO.L", start, HISTORY_DAYS, 3.0, -0.0002))
        .with_series(generate_series("BVIC.L", start, HISTORY_DAYS, 8.0, -0.0004))
        .with_series(generate_series("GLD", start, HISTORY_DAYS, 170.0, 0.0002))
        .with_series(generate_series("BIL", start, HISTORY_DAYS, 91.0, 0.0001))
        .with_universe(Universe::Nasdaq100, &["AAPL", "MSFT"])
        .with_universe(Universe::Sp500, &["AMZN", "GOOGL"])
        .with_universe(Universe::Ftse250, &["TSCO.L", "BVIC.L"])
}
