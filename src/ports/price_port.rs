//! Price history access port trait.

use crate::domain::error::QuantError;
use crate::domain::price::PriceSeries;
use crate::domain::universe::Universe;
use chrono::NaiveDate;

pub trait PricePort {
    /// Adjusted closes for `symbol` dated on or before `as_of`, ascending by date.
    ///
    /// An unknown symbol yields an empty series, not an error.
    fn load_price_series(&self, symbol: &str, as_of: NaiveDate) -> Result<PriceSeries, QuantError>;

    /// Constituent tickers of `universe`.
    fn load_universe_symbols(&self, universe: Universe) -> Result<Vec<String>, QuantError>;

    /// Last adjusted close dated on or before `date`.
    fn price_on_or_before(&self, symbol: &str, date: NaiveDate) -> Result<Option<f64>, QuantError> {
        Ok(self.load_price_series(symbol, date)?.last().map(|p| p.price))
    }
}
